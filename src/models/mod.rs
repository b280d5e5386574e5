// 数据模型
// 题目、题库、作答记录、续做会话与错题记录，字段名与本地存储中的 JSON 保持一致

use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 错题复习模式使用的保留题库 id，永远不会作为会话存储的键
pub const REVIEW_BANK_ID: &str = "wrong";

/// 选项字母
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    pub const ALL: [Choice; 4] = [Choice::A, Choice::B, Choice::C, Choice::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }

    /// 解析单个字母，忽略大小写和首尾空白
    pub fn from_letter(input: &str) -> Option<Choice> {
        match input.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            "C" => Some(Choice::C),
            "D" => Some(Choice::D),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 四个选项的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl Options {
    pub fn get(&self, choice: Choice) -> &str {
        match choice {
            Choice::A => &self.a,
            Choice::B => &self.b,
            Choice::C => &self.c,
            Choice::D => &self.d,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Choice, &str)> + '_ {
        Choice::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// 单选题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleQuestion {
    pub id: u32,
    pub question: String,
    pub options: Options,
    pub correct_answer: Choice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// 材料题下的小题，结构与单选题相同；id 只在所属材料的空位编号内唯一
pub type PassageSubQuestion = SingleQuestion;

impl SingleQuestion {
    pub fn is_correct(&self, selected: Option<Choice>) -> bool {
        selected == Some(self.correct_answer)
    }
}

/// 材料题类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassageType {
    ReadingComprehension,
    FillInTheBlank,
}

impl PassageType {
    pub fn label(&self) -> &'static str {
        match self {
            PassageType::ReadingComprehension => "阅读理解",
            PassageType::FillInTheBlank => "完形填空",
        }
    }
}

/// 材料题：一段带空位标记 `____<id>____` 的文字加若干小题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageQuestion {
    pub id: u32,
    pub passage_type: PassageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_title: Option<String>,
    pub passage: String,
    pub sub_questions: Vec<PassageSubQuestion>,
}

impl PassageQuestion {
    pub fn sub_question(&self, sub_id: u32) -> Option<&PassageSubQuestion> {
        self.sub_questions.iter().find(|sq| sq.id == sub_id)
    }
}

/// 题目。JSON 中 `type` 缺省或为 `"single"` 时按单选题处理
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Question {
    #[serde(rename = "single")]
    Single(SingleQuestion),
    #[serde(rename = "passage")]
    Passage(PassageQuestion),
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        let tag = match value.as_object_mut() {
            Some(obj) => obj.remove("type"),
            None => return Err(de::Error::custom("question must be a JSON object")),
        };

        match tag {
            None => serde_json::from_value(value).map(Question::Single),
            Some(serde_json::Value::String(t)) if t == "single" => {
                serde_json::from_value(value).map(Question::Single)
            }
            Some(serde_json::Value::String(t)) if t == "passage" => {
                serde_json::from_value(value).map(Question::Passage)
            }
            Some(other) => return Err(de::Error::custom(format!("unknown question type: {}", other))),
        }
        .map_err(de::Error::custom)
    }
}

impl Question {
    pub fn id(&self) -> u32 {
        match self {
            Question::Single(q) => q.id,
            Question::Passage(p) => p.id,
        }
    }

    pub fn is_passage(&self) -> bool {
        matches!(self, Question::Passage(_))
    }

    pub fn as_passage(&self) -> Option<&PassageQuestion> {
        match self {
            Question::Passage(p) => Some(p),
            Question::Single(_) => None,
        }
    }

    /// 计分单位数：单选题为 1，材料题为小题数
    pub fn unit_count(&self) -> usize {
        match self {
            Question::Single(_) => 1,
            Question::Passage(p) => p.sub_questions.len(),
        }
    }
}

/// 题库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    pub description: String,
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn unit_count(&self) -> usize {
        count_units(&self.questions)
    }
}

pub fn count_units(questions: &[Question]) -> usize {
    questions.iter().map(Question::unit_count).sum()
}

/// 题库列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub item_count: usize,
    pub unit_count: usize,
}

/// 答题模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    #[default]
    Quiz,
    Study,
}

/// 单道题的作答记录，顺序与题目列表一一对应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: u32,
    pub selected_answer: Option<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_answers: Option<BTreeMap<u32, Option<Choice>>>,
}

impl AnswerRecord {
    /// 全部未作答的记录；材料题的每个小题都预先占位
    pub fn blank_for(question: &Question) -> Self {
        let sub_answers = question.as_passage().map(|p| {
            p.sub_questions
                .iter()
                .map(|sq| (sq.id, None))
                .collect::<BTreeMap<_, _>>()
        });
        Self {
            question_id: question.id(),
            selected_answer: None,
            sub_answers,
        }
    }

    pub fn sub_answer(&self, sub_id: u32) -> Option<Choice> {
        self.sub_answers
            .as_ref()
            .and_then(|m| m.get(&sub_id).copied().flatten())
    }

    /// 已作答的计分单位数
    pub fn answered_units(&self, question: &Question) -> usize {
        match question {
            Question::Single(_) => usize::from(self.selected_answer.is_some()),
            Question::Passage(_) => self
                .sub_answers
                .as_ref()
                .map(|m| m.values().filter(|v| v.is_some()).count())
                .unwrap_or(0),
        }
    }

    pub fn is_complete(&self, question: &Question) -> bool {
        self.answered_units(question) == question.unit_count()
    }
}

/// 进行中的答题会话快照，每个题库一份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuizSession {
    pub bank_id: String,
    pub bank_name: String,
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerRecord>,
    pub current_index: usize,
    pub start_time: i64,
    pub last_updated: i64,
    /// 旧数据没有这个字段，按测验模式读取
    #[serde(default)]
    pub mode: QuizMode,
}

impl SavedQuizSession {
    pub fn answered_units(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| a.answered_units(q))
            .sum()
    }

    pub fn total_units(&self) -> usize {
        count_units(&self.questions)
    }
}

/// 错题记录，按 (bank_id, question.id) 去重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongQuestionRecord {
    pub bank_id: String,
    pub bank_name: String,
    pub question: Question,
    pub selected_answer: Choice,
    pub timestamp: i64,
    /// 材料题中答错的小题编号
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missed_sub_ids: Vec<u32>,
}

impl WrongQuestionRecord {
    pub fn matches(&self, bank_id: &str, question_id: u32) -> bool {
        self.bank_id == bank_id && self.question.id() == question_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            a: "at".into(),
            b: "in".into(),
            c: "on".into(),
            d: "by".into(),
        }
    }

    #[test]
    fn untagged_question_reads_as_single() {
        let json = r#"{"id":1,"question":"___ Monday","options":{"A":"at","B":"in","C":"on","D":"by"},"correctAnswer":"C"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert!(!q.is_passage());
        assert_eq!(q.id(), 1);
        assert_eq!(q.unit_count(), 1);
    }

    #[test]
    fn explicit_single_tag_reads_as_single() {
        let json = r#"{"id":2,"type":"single","question":"q","options":{"A":"1","B":"2","C":"3","D":"4"},"correctAnswer":"A","explanation":"because"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        match q {
            Question::Single(s) => assert_eq!(s.explanation.as_deref(), Some("because")),
            Question::Passage(_) => panic!("expected single"),
        }
    }

    #[test]
    fn passage_question_reads_sub_questions() {
        let json = r#"{
            "id": 10, "type": "passage", "passageType": "fill-in-the-blank",
            "passage": "I was born ____1____ 1999 and live ____2____ Hanoi.",
            "subQuestions": [
                {"id":1,"question":"____1____","options":{"A":"at","B":"in","C":"on","D":"by"},"correctAnswer":"B"},
                {"id":2,"question":"____2____","options":{"A":"at","B":"in","C":"on","D":"by"},"correctAnswer":"B"}
            ]
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        let p = q.as_passage().unwrap();
        assert_eq!(p.passage_type, PassageType::FillInTheBlank);
        assert_eq!(q.unit_count(), 2);
        assert!(p.passage_title.is_none());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let json = r#"{"id":3,"type":"essay","question":"q"}"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }

    #[test]
    fn question_serializes_with_type_tag() {
        let q = Question::Single(SingleQuestion {
            id: 4,
            question: "q".into(),
            options: options(),
            correct_answer: Choice::A,
            explanation: None,
        });
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "single");
        assert_eq!(value["correctAnswer"], "A");
        let back: Question = serde_json::from_value(value).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn blank_answer_prefills_every_sub_question() {
        let q = Question::Passage(PassageQuestion {
            id: 7,
            passage_type: PassageType::ReadingComprehension,
            passage_title: Some("Title".into()),
            passage: "text".into(),
            sub_questions: vec![
                SingleQuestion { id: 1, question: "a".into(), options: options(), correct_answer: Choice::A, explanation: None },
                SingleQuestion { id: 2, question: "b".into(), options: options(), correct_answer: Choice::B, explanation: None },
            ],
        });
        let record = AnswerRecord::blank_for(&q);
        let subs = record.sub_answers.as_ref().unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.values().all(Option::is_none));
        assert_eq!(record.answered_units(&q), 0);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""subAnswers":{"1":null,"2":null}"#));
        assert!(json.contains(r#""selectedAnswer":null"#));
    }

    #[test]
    fn saved_session_without_mode_reads_as_quiz() {
        let json = r#"{"bankId":"english","bankName":"English","questions":[],"answers":[],"currentIndex":0,"startTime":1,"lastUpdated":2}"#;
        let saved: SavedQuizSession = serde_json::from_str(json).unwrap();
        assert_eq!(saved.mode, QuizMode::Quiz);
    }

    #[test]
    fn choice_parses_letters() {
        assert_eq!(Choice::from_letter(" b "), Some(Choice::B));
        assert_eq!(Choice::from_letter("e"), None);
    }
}
