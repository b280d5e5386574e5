//! 材料题文本解析
//! 识别 `____<id>____` 形式的空位标记，供校验和界面高亮使用

use crate::models::PassageQuestion;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn blank_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_{4}(\d+)_{4}").expect("blank marker pattern is valid"))
}

/// 材料文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassageSegment<'a> {
    Text(&'a str),
    Blank(u32),
}

/// 把材料文本切分为普通文字和空位
pub fn passage_segments(text: &str) -> Vec<PassageSegment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in blank_pattern().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        let Ok(id) = caps[1].parse::<u32>() else {
            continue;
        };
        if whole.start() > last {
            segments.push(PassageSegment::Text(&text[last..whole.start()]));
        }
        segments.push(PassageSegment::Blank(id));
        last = whole.end();
    }

    if last < text.len() {
        segments.push(PassageSegment::Text(&text[last..]));
    }
    segments
}

/// 按出现顺序列出空位编号
pub fn blank_ids(text: &str) -> Vec<u32> {
    passage_segments(text)
        .into_iter()
        .filter_map(|s| match s {
            PassageSegment::Blank(id) => Some(id),
            PassageSegment::Text(_) => None,
        })
        .collect()
}

/// 空位与小题不一致的地方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlankMismatch {
    /// 文本中有空位但没有对应小题
    MissingSubQuestion(u32),
    /// 小题在文本中没有空位
    MissingBlank(u32),
    /// 同一编号的空位出现多次
    DuplicateBlank(u32),
    /// 同一编号的小题出现多次
    DuplicateSubQuestion(u32),
}

/// 检查空位标记与小题 id 是否一一对应
pub fn check_blanks(passage: &PassageQuestion) -> Vec<BlankMismatch> {
    let blanks = blank_ids(&passage.passage);
    let mut problems = Vec::new();
    let mut seen_blanks = BTreeSet::new();
    for id in &blanks {
        if !seen_blanks.insert(*id) {
            problems.push(BlankMismatch::DuplicateBlank(*id));
        }
    }

    let mut seen_subs = BTreeSet::new();
    for sq in &passage.sub_questions {
        if !seen_subs.insert(sq.id) {
            problems.push(BlankMismatch::DuplicateSubQuestion(sq.id));
        }
    }

    problems.extend(
        seen_blanks
            .difference(&seen_subs)
            .map(|id| BlankMismatch::MissingSubQuestion(*id)),
    );
    problems.extend(
        seen_subs
            .difference(&seen_blanks)
            .map(|id| BlankMismatch::MissingBlank(*id)),
    );
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, Options, PassageType, SingleQuestion};

    fn sub(id: u32) -> SingleQuestion {
        SingleQuestion {
            id,
            question: format!("____{}____", id),
            options: Options { a: "a".into(), b: "b".into(), c: "c".into(), d: "d".into() },
            correct_answer: Choice::A,
            explanation: None,
        }
    }

    fn passage(text: &str, subs: &[u32]) -> PassageQuestion {
        PassageQuestion {
            id: 1,
            passage_type: PassageType::FillInTheBlank,
            passage_title: None,
            passage: text.into(),
            sub_questions: subs.iter().copied().map(sub).collect(),
        }
    }

    #[test]
    fn segments_split_around_blanks() {
        let segs = passage_segments("He was born ____9____ May ____10____.");
        assert_eq!(
            segs,
            vec![
                PassageSegment::Text("He was born "),
                PassageSegment::Blank(9),
                PassageSegment::Text(" May "),
                PassageSegment::Blank(10),
                PassageSegment::Text("."),
            ]
        );
    }

    #[test]
    fn short_underscores_are_plain_text() {
        assert!(blank_ids("a __1__ b").is_empty());
    }

    #[test]
    fn matching_blanks_have_no_problems() {
        assert!(check_blanks(&passage("x ____1____ y ____2____", &[1, 2])).is_empty());
    }

    #[test]
    fn mismatches_are_reported() {
        let problems = check_blanks(&passage("x ____1____ y ____1____ ____3____", &[1, 2]));
        assert!(problems.contains(&BlankMismatch::DuplicateBlank(1)));
        assert!(problems.contains(&BlankMismatch::MissingSubQuestion(3)));
        assert!(problems.contains(&BlankMismatch::MissingBlank(2)));
    }

    #[test]
    fn passage_without_markers_misses_every_blank() {
        let mut p = passage("A plain story.", &[1, 2]);
        p.passage_type = PassageType::ReadingComprehension;
        assert_eq!(
            check_blanks(&p),
            vec![BlankMismatch::MissingBlank(1), BlankMismatch::MissingBlank(2)]
        );
    }
}
