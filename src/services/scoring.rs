//! 计分与复盘
//! 根据题目与作答记录计算成绩，生成错题记录和逐题复盘信息

use crate::models::{AnswerRecord, Choice, Question, WrongQuestionRecord};
use serde::{Deserialize, Serialize};

/// 错题记录归属的题库
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub bank_id: String,
    pub bank_name: String,
}

/// 一次提交的成绩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub total_units: usize,
    pub correct_count: usize,
    pub wrong_records: Vec<WrongQuestionRecord>,
    pub percentage: u32,
    pub bank_name: String,
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerRecord>,
}

impl QuizResult {
    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_percentage(self.percentage)
    }

    pub fn review(&self) -> Vec<QuestionReview> {
        review(&self.questions, &self.answers)
    }
}

/// 成绩档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreGrade {
    Perfect,
    Great,
    Good,
    NeedsWork,
}

impl ScoreGrade {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            p if p >= 100 => ScoreGrade::Perfect,
            p if p >= 80 => ScoreGrade::Great,
            p if p >= 60 => ScoreGrade::Good,
            _ => ScoreGrade::NeedsWork,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScoreGrade::Perfect => "太棒了！全部答对！",
            ScoreGrade::Great => "很好！成绩优秀！",
            ScoreGrade::Good => "不错，继续加油！",
            ScoreGrade::NeedsWork => "多复习一下，再接再厉！",
        }
    }
}

/// round(100 * correct / total)，total 为 0 时返回 0
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// 计分。
///
/// 未作答的单位只计入总数。单选题答错生成一条错题记录；材料题无论错几个空
/// 只生成一条，`selected_answer` 取第一个答错的小题，`missed_sub_ids` 列出所有答错的小题。
pub fn score<F>(
    bank_name: &str,
    questions: &[Question],
    answers: &[AnswerRecord],
    timestamp: i64,
    mut origin_of: F,
) -> QuizResult
where
    F: FnMut(&Question) -> Origin,
{
    let mut total_units = 0;
    let mut correct_count = 0;
    let mut wrong_records = Vec::new();

    for (idx, question) in questions.iter().enumerate() {
        let answer = answers.get(idx);
        let (first_wrong, missed_sub_ids) = match question {
            Question::Single(single) => {
                total_units += 1;
                let selected = answer.and_then(|a| a.selected_answer);
                if single.is_correct(selected) {
                    correct_count += 1;
                }
                (selected.filter(|c| *c != single.correct_answer), Vec::new())
            }
            Question::Passage(passage) => {
                let mut first = None;
                let mut missed = Vec::new();
                for sub in &passage.sub_questions {
                    total_units += 1;
                    let selected = answer.and_then(|a| a.sub_answer(sub.id));
                    match selected {
                        Some(c) if c == sub.correct_answer => correct_count += 1,
                        Some(c) => {
                            first.get_or_insert(c);
                            missed.push(sub.id);
                        }
                        None => {}
                    }
                }
                (first, missed)
            }
        };

        if let Some(selected_answer) = first_wrong {
            let origin = origin_of(question);
            wrong_records.push(WrongQuestionRecord {
                bank_id: origin.bank_id,
                bank_name: origin.bank_name,
                question: question.clone(),
                selected_answer,
                timestamp,
                missed_sub_ids,
            });
        }
    }

    QuizResult {
        total_units,
        correct_count,
        wrong_records,
        percentage: percentage(correct_count, total_units),
        bank_name: bank_name.to_string(),
        questions: questions.to_vec(),
        answers: answers.to_vec(),
    }
}

/// 单个计分单位的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOutcome {
    Correct,
    Wrong(Choice),
    Unanswered,
}

impl UnitOutcome {
    fn of(correct: Choice, selected: Option<Choice>) -> Self {
        match selected {
            Some(c) if c == correct => UnitOutcome::Correct,
            Some(c) => UnitOutcome::Wrong(c),
            None => UnitOutcome::Unanswered,
        }
    }
}

/// 整题的复盘状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    /// 全部答对
    Correct,
    /// 有作答但没有全部答对
    Incorrect,
    /// 完全没有作答
    Unanswered,
}

/// 逐题复盘
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub index: usize,
    pub question_id: u32,
    pub status: ReviewStatus,
    /// 单选题为 [(题目 id, 结果)]，材料题为每个小题
    pub units: Vec<(u32, UnitOutcome)>,
    pub correct_units: usize,
}

pub fn review(questions: &[Question], answers: &[AnswerRecord]) -> Vec<QuestionReview> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answer = answers.get(index);
            let units: Vec<(u32, UnitOutcome)> = match question {
                Question::Single(single) => vec![(
                    single.id,
                    UnitOutcome::of(single.correct_answer, answer.and_then(|a| a.selected_answer)),
                )],
                Question::Passage(passage) => passage
                    .sub_questions
                    .iter()
                    .map(|sub| {
                        (sub.id, UnitOutcome::of(sub.correct_answer, answer.and_then(|a| a.sub_answer(sub.id))))
                    })
                    .collect(),
            };

            let correct_units = units.iter().filter(|(_, o)| *o == UnitOutcome::Correct).count();
            let answered = units.iter().any(|(_, o)| *o != UnitOutcome::Unanswered);
            let status = if !units.is_empty() && correct_units == units.len() {
                ReviewStatus::Correct
            } else if answered {
                ReviewStatus::Incorrect
            } else {
                ReviewStatus::Unanswered
            };

            QuestionReview {
                index,
                question_id: question.id(),
                status,
                units,
                correct_units,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Options, PassageQuestion, PassageType, SingleQuestion};

    fn opts() -> Options {
        Options { a: "a".into(), b: "b".into(), c: "c".into(), d: "d".into() }
    }

    fn single(id: u32, correct: Choice) -> Question {
        Question::Single(SingleQuestion {
            id,
            question: format!("q{}", id),
            options: opts(),
            correct_answer: correct,
            explanation: None,
        })
    }

    fn passage(id: u32, correct: &[Choice]) -> Question {
        Question::Passage(PassageQuestion {
            id,
            passage_type: PassageType::FillInTheBlank,
            passage_title: None,
            passage: (1..=correct.len()).map(|i| format!("____{}____", i)).collect::<Vec<_>>().join(" "),
            sub_questions: correct
                .iter()
                .enumerate()
                .map(|(i, c)| SingleQuestion {
                    id: i as u32 + 1,
                    question: String::new(),
                    options: opts(),
                    correct_answer: *c,
                    explanation: None,
                })
                .collect(),
        })
    }

    fn answered(question: &Question, main: Option<Choice>, subs: &[Option<Choice>]) -> AnswerRecord {
        let mut record = AnswerRecord::blank_for(question);
        record.selected_answer = main;
        if let Some(map) = record.sub_answers.as_mut() {
            for (i, choice) in subs.iter().enumerate() {
                map.insert(i as u32 + 1, *choice);
            }
        }
        record
    }

    fn origin(_: &Question) -> Origin {
        Origin { bank_id: "english".into(), bank_name: "English".into() }
    }

    #[test]
    fn one_right_one_wrong() {
        let questions = vec![single(1, Choice::A), single(2, Choice::B)];
        let answers = vec![
            answered(&questions[0], Some(Choice::A), &[]),
            answered(&questions[1], Some(Choice::C), &[]),
        ];
        let result = score("English", &questions, &answers, 5, origin);

        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total_units, 2);
        assert_eq!(result.percentage, 50);
        assert_eq!(result.wrong_records.len(), 1);
        let wrong = &result.wrong_records[0];
        assert_eq!(wrong.question.id(), 2);
        assert_eq!(wrong.selected_answer, Choice::C);
        assert_eq!(wrong.bank_id, "english");
        assert_eq!(wrong.timestamp, 5);
    }

    #[test]
    fn unanswered_counts_only_in_total() {
        let questions = vec![single(1, Choice::A), single(2, Choice::B), single(3, Choice::C)];
        let answers = vec![
            answered(&questions[0], Some(Choice::A), &[]),
            answered(&questions[1], Some(Choice::D), &[]),
            answered(&questions[2], None, &[]),
        ];
        let result = score("English", &questions, &answers, 0, origin);
        assert_eq!((result.correct_count, result.total_units, result.percentage), (1, 3, 33));
        assert_eq!(result.wrong_records.len(), 1);
    }

    #[test]
    fn passage_with_two_missed_blanks_yields_one_record() {
        let questions = vec![passage(9, &[Choice::A, Choice::B, Choice::C])];
        let answers = vec![answered(&questions[0], None, &[Some(Choice::D), Some(Choice::B), Some(Choice::A)])];
        let result = score("English", &questions, &answers, 0, origin);

        assert_eq!(result.total_units, 3);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.wrong_records.len(), 1);
        assert_eq!(result.wrong_records[0].selected_answer, Choice::D);
        assert_eq!(result.wrong_records[0].missed_sub_ids, vec![1, 3]);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let result = score("Empty", &[], &[], 0, origin);
        assert_eq!(result.percentage, 0);
        assert_eq!(result.grade(), ScoreGrade::NeedsWork);
    }

    #[test]
    fn rounding_and_grades() {
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(ScoreGrade::from_percentage(100), ScoreGrade::Perfect);
        assert_eq!(ScoreGrade::from_percentage(80), ScoreGrade::Great);
        assert_eq!(ScoreGrade::from_percentage(60), ScoreGrade::Good);
        assert_eq!(ScoreGrade::from_percentage(59), ScoreGrade::NeedsWork);
    }

    #[test]
    fn review_marks_each_unit() {
        let questions = vec![single(1, Choice::A), passage(2, &[Choice::A, Choice::B]), single(3, Choice::C)];
        let answers = vec![
            answered(&questions[0], Some(Choice::A), &[]),
            answered(&questions[1], None, &[Some(Choice::A), None]),
            answered(&questions[2], None, &[]),
        ];
        let reviews = review(&questions, &answers);

        assert_eq!(reviews[0].status, ReviewStatus::Correct);
        assert_eq!(reviews[1].status, ReviewStatus::Incorrect);
        assert_eq!(reviews[1].correct_units, 1);
        assert_eq!(reviews[1].units, vec![(1, UnitOutcome::Correct), (2, UnitOutcome::Unanswered)]);
        assert_eq!(reviews[2].status, ReviewStatus::Unanswered);
    }
}
