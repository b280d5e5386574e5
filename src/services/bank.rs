//! 题库注册表
//! 从题库目录加载题库（meta.json + 若干分部文件），提供随机抽题与顺序抽题

use crate::models::{count_units, BankSummary, Question, QuestionBank};
use crate::services::passage::{check_blanks, BlankMismatch};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 题库分部文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPart {
    pub part_id: String,
    pub part_name: String,
    pub questions: Vec<Question>,
}

/// 题库目录下的 meta.json
#[derive(Debug, Clone, Deserialize)]
struct BankMeta {
    id: String,
    name: String,
    description: String,
    parts: Vec<String>,
    #[serde(default)]
    order: Option<i32>,
}

/// 校验发现的问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankProblem {
    pub bank_id: String,
    pub question_id: u32,
    pub mismatch: BlankMismatch,
}

/// 合并多个分部为一个题库，描述末尾附上条目数与小题总数
///
/// 分部之间不检查 id 重复。
pub fn merge_parts(id: &str, name: &str, description: &str, parts: Vec<QuestionPart>) -> QuestionBank {
    let questions: Vec<Question> = parts.into_iter().flat_map(|p| p.questions).collect();
    let units = count_units(&questions);

    QuestionBank {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{} ({} 项, {} 题)", description, questions.len(), units),
        questions,
    }
}

/// 题库注册表
#[derive(Debug, Clone, Default)]
pub struct BankRegistry {
    banks: Vec<QuestionBank>,
}

impl BankRegistry {
    pub fn new(banks: Vec<QuestionBank>) -> Self {
        Self { banks }
    }

    /// 加载题库目录：每个含 meta.json 的子目录是一个题库
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("读取题库目录失败: {}", dir.display()))? {
            let path = entry?.path();
            if path.join("meta.json").is_file() {
                entries.push(path);
            }
        }
        entries.sort();

        let mut loaded = Vec::new();
        for path in entries {
            let (meta, bank) = Self::load_bank(&path)?;
            loaded.push((meta.order.unwrap_or(i32::MAX), bank));
        }
        // sort_by_key 是稳定排序，未指定 order 的题库保持目录名顺序
        loaded.sort_by_key(|(order, _)| *order);

        let registry = Self::new(loaded.into_iter().map(|(_, b)| b).collect());
        for problem in registry.validate() {
            warn!(
                "题库 {} 第 {} 题空位与小题不一致: {:?}",
                problem.bank_id, problem.question_id, problem.mismatch
            );
        }
        info!("已加载 {} 个题库: {}", registry.banks.len(), dir.display());
        Ok(registry)
    }

    fn load_bank(dir: &Path) -> Result<(BankMeta, QuestionBank)> {
        let meta_path = dir.join("meta.json");
        let meta: BankMeta = serde_json::from_str(
            &fs::read_to_string(&meta_path).with_context(|| format!("读取失败: {}", meta_path.display()))?,
        )
        .with_context(|| format!("解析失败: {}", meta_path.display()))?;

        let mut parts = Vec::with_capacity(meta.parts.len());
        for file in &meta.parts {
            let part_path = dir.join(file);
            let content = fs::read_to_string(&part_path)
                .with_context(|| format!("读取失败: {}", part_path.display()))?;
            let part: QuestionPart = serde_json::from_str(&content)
                .with_context(|| format!("解析失败: {}", part_path.display()))?;
            debug!("题库 {} 分部 {} 共 {} 项", meta.id, part.part_id, part.questions.len());
            parts.push(part);
        }

        let bank = merge_parts(&meta.id, &meta.name, &meta.description, parts);
        Ok((meta, bank))
    }

    pub fn banks(&self) -> &[QuestionBank] {
        &self.banks
    }

    pub fn get_bank(&self, bank_id: &str) -> Option<&QuestionBank> {
        self.banks.iter().find(|b| b.id == bank_id)
    }

    pub fn summaries(&self) -> Vec<BankSummary> {
        self.banks
            .iter()
            .map(|b| BankSummary {
                id: b.id.clone(),
                name: b.name.clone(),
                description: b.description.clone(),
                item_count: b.questions.len(),
                unit_count: b.unit_count(),
            })
            .collect()
    }

    /// 随机抽题：Fisher-Yates 洗牌后取前 min(count, 总数) 道；题库不存在时返回空
    pub fn sample_random<R: Rng + ?Sized>(&self, bank_id: &str, count: usize, rng: &mut R) -> Vec<Question> {
        let Some(bank) = self.get_bank(bank_id) else {
            return Vec::new();
        };
        let mut questions = bank.questions.clone();
        questions.shuffle(rng);
        questions.truncate(count.min(bank.questions.len()));
        questions
    }

    /// 顺序抽题：按题库原顺序取前 min(count, 总数) 道；题库不存在时返回空
    pub fn sample_ordered(&self, bank_id: &str, count: usize) -> Vec<Question> {
        match self.get_bank(bank_id) {
            Some(bank) => bank.questions.iter().take(count).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// 检查所有材料题的空位与小题是否一一对应
    pub fn validate(&self) -> Vec<BankProblem> {
        let mut problems = Vec::new();
        for bank in &self.banks {
            for passage in bank.questions.iter().filter_map(Question::as_passage) {
                problems.extend(check_blanks(passage).into_iter().map(|mismatch| BankProblem {
                    bank_id: bank.id.clone(),
                    question_id: passage.id,
                    mismatch,
                }));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, Options, PassageQuestion, PassageType, SingleQuestion};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn single(id: u32) -> Question {
        Question::Single(SingleQuestion {
            id,
            question: format!("question {}", id),
            options: Options { a: "a".into(), b: "b".into(), c: "c".into(), d: "d".into() },
            correct_answer: Choice::A,
            explanation: None,
        })
    }

    fn passage(id: u32) -> Question {
        let sub = |sid: u32| SingleQuestion {
            id: sid,
            question: format!("____{}____", sid),
            options: Options { a: "a".into(), b: "b".into(), c: "c".into(), d: "d".into() },
            correct_answer: Choice::B,
            explanation: None,
        };
        Question::Passage(PassageQuestion {
            id,
            passage_type: PassageType::FillInTheBlank,
            passage_title: None,
            passage: "one ____1____ two ____2____ three ____3____".into(),
            sub_questions: vec![sub(1), sub(2), sub(3)],
        })
    }

    fn registry() -> BankRegistry {
        let parts = vec![
            QuestionPart { part_id: "p1".into(), part_name: "Part 1".into(), questions: (1..=4).map(single).collect() },
            QuestionPart { part_id: "p2".into(), part_name: "Part 2".into(), questions: vec![passage(5), single(6)] },
        ];
        BankRegistry::new(vec![merge_parts("english", "English", "Grammar", parts)])
    }

    #[test]
    fn merge_counts_items_and_sub_questions() {
        let reg = registry();
        let bank = reg.get_bank("english").unwrap();
        assert_eq!(bank.questions.len(), 6);
        assert_eq!(bank.description, "Grammar (6 项, 8 题)");
        let summary = &reg.summaries()[0];
        assert_eq!(summary.item_count, 6);
        assert_eq!(summary.unit_count, 8);
    }

    #[test]
    fn random_sample_is_distinct_subset_of_bank() {
        let reg = registry();
        let mut rng = StdRng::seed_from_u64(7);
        for count in [0, 1, 3, 6, 50] {
            let picked = reg.sample_random("english", count, &mut rng);
            assert_eq!(picked.len(), count.min(6));
            let ids: BTreeSet<u32> = picked.iter().map(Question::id).collect();
            assert_eq!(ids.len(), picked.len());
            assert!(ids.iter().all(|id| (1..=6).contains(id)));
        }
    }

    #[test]
    fn random_sample_reaches_more_than_one_order() {
        let reg = registry();
        let mut rng = StdRng::seed_from_u64(42);
        let orders: BTreeSet<Vec<u32>> = (0..20)
            .map(|_| reg.sample_random("english", 6, &mut rng).iter().map(Question::id).collect())
            .collect();
        assert!(orders.len() > 1);
    }

    #[test]
    fn ordered_sample_is_prefix() {
        let reg = registry();
        let ids: Vec<u32> = reg.sample_ordered("english", 3).iter().map(Question::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(reg.sample_ordered("english", 99).len(), 6);
    }

    #[test]
    fn unknown_bank_samples_empty() {
        let reg = registry();
        assert!(reg.get_bank("missing").is_none());
        assert!(reg.sample_ordered("missing", 5).is_empty());
        assert!(reg.sample_random("missing", 5, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn consistent_passages_validate_clean() {
        assert!(registry().validate().is_empty());
    }
}
