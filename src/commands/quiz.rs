// 答题命令模块
// 把会话控制器和成绩转换成界面直接使用的传输对象

use crate::models::{AnswerRecord, Choice, Question, QuizMode};
use crate::services::scoring::{QuestionReview, QuizResult, ReviewStatus, UnitOutcome};
use crate::services::session::{QuizController, RevealKey};
use crate::utils::format_elapsed;
use serde::Serialize;

/// 材料题空位的显示状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlankState {
    Active,
    Answered,
    Unanswered,
    /// 学习模式已揭晓或复盘时答对
    Correct,
    /// 学习模式已揭晓或复盘时答错
    Wrong,
}

/// 空位传输对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankView {
    pub sub_id: u32,
    pub selected: Option<Choice>,
    pub state: BlankState,
}

/// 答题界面传输对象
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub bank_id: String,
    pub bank_name: String,
    pub mode: QuizMode,
    pub is_review: bool,
    /// 从 1 开始
    pub position: usize,
    pub total_items: usize,
    pub answered: usize,
    pub total_units: usize,
    pub progress_percent: u32,
    pub question: Question,
    pub answer: AnswerRecord,
    pub active_sub_index: usize,
    /// 当前题（材料题为当前小题）是否已揭晓
    pub revealed: bool,
    pub revealed_correct: Option<bool>,
    pub blanks: Vec<BlankView>,
    /// 快速跳转格子：每道题是否已答完
    pub answered_grid: Vec<bool>,
    pub elapsed: String,
    pub can_submit: bool,
    pub finished: bool,
}

/// 当前题目的界面数据；没有题目时返回 None
pub fn quiz_view(controller: &QuizController<'_>) -> Option<QuizView> {
    let state = controller.state();
    let question = state.current_question()?.clone();
    let answer = state.current_answer()?.clone();
    let active_key = state.active_reveal_key();
    let revealed = active_key.map(|k| state.is_revealed(&k)).unwrap_or(false);

    let blanks = match &question {
        Question::Passage(p) => p
            .sub_questions
            .iter()
            .enumerate()
            .map(|(i, sub)| {
                let key = RevealKey::Sub { passage_id: p.id, sub_id: sub.id };
                let selected = answer.sub_answer(sub.id);
                let state_of = match state.revealed_correctness(&key) {
                    Some(true) => BlankState::Correct,
                    Some(false) => BlankState::Wrong,
                    None if i == state.active_sub_index => BlankState::Active,
                    None if selected.is_some() => BlankState::Answered,
                    None => BlankState::Unanswered,
                };
                BlankView { sub_id: sub.id, selected, state: state_of }
            })
            .collect(),
        Question::Single(_) => Vec::new(),
    };

    let answered = state.answered_count();
    let total_units = state.total_units();

    Some(QuizView {
        bank_id: controller.bank_id().to_string(),
        bank_name: controller.bank_name().to_string(),
        mode: state.mode,
        is_review: controller.is_review(),
        position: state.current_index + 1,
        total_items: state.questions.len(),
        answered,
        total_units,
        progress_percent: crate::services::scoring::percentage(answered, total_units),
        question,
        answer,
        active_sub_index: state.active_sub_index,
        revealed,
        revealed_correct: active_key.and_then(|k| state.revealed_correctness(&k)),
        blanks,
        answered_grid: (0..state.questions.len()).map(|i| state.is_question_answered(i)).collect(),
        elapsed: format_elapsed(controller.elapsed_millis()),
        can_submit: state.can_submit() && !controller.is_finished(),
        finished: controller.is_finished(),
    })
}

/// 成绩页中的单题复盘
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItemView {
    pub index: usize,
    pub question: Question,
    pub status: ReviewStatus,
    pub selected: Option<Choice>,
    pub blanks: Vec<BlankView>,
    /// 材料题 "答对 x / y"
    pub correct_units: usize,
    pub total_units: usize,
}

/// 成绩页传输对象
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub bank_name: String,
    pub percentage: u32,
    pub correct_count: usize,
    pub total_units: usize,
    pub wrong_count: usize,
    pub message: String,
    pub items: Vec<ReviewItemView>,
}

fn review_item(result: &QuizResult, review: QuestionReview) -> ReviewItemView {
    let question = result.questions[review.index].clone();
    let answer = result.answers.get(review.index);
    let blanks = match &question {
        Question::Passage(_) => review
            .units
            .iter()
            .map(|(sub_id, outcome)| {
                let (selected, state) = match outcome {
                    UnitOutcome::Correct => (answer.and_then(|a| a.sub_answer(*sub_id)), BlankState::Correct),
                    UnitOutcome::Wrong(c) => (Some(*c), BlankState::Wrong),
                    UnitOutcome::Unanswered => (None, BlankState::Unanswered),
                };
                BlankView { sub_id: *sub_id, selected, state }
            })
            .collect(),
        Question::Single(_) => Vec::new(),
    };

    ReviewItemView {
        index: review.index,
        total_units: review.units.len(),
        correct_units: review.correct_units,
        status: review.status,
        selected: answer.and_then(|a| a.selected_answer),
        question,
        blanks,
    }
}

pub fn result_view(result: &QuizResult) -> ResultView {
    ResultView {
        bank_name: result.bank_name.clone(),
        percentage: result.percentage,
        correct_count: result.correct_count,
        total_units: result.total_units,
        wrong_count: result.wrong_records.len(),
        message: result.grade().message().to_string(),
        items: result.review().into_iter().map(|r| review_item(result, r)).collect(),
    }
}

/// 解析命令行中的模式参数
pub fn parse_mode(input: &str) -> Option<QuizMode> {
    match input.trim().to_ascii_lowercase().as_str() {
        "quiz" | "test" => Some(QuizMode::Quiz),
        "study" | "learn" => Some(QuizMode::Study),
        _ => None,
    }
}

/// 解析题目数量，只接受正整数
pub fn parse_count(input: &str) -> Option<usize> {
    input.trim().parse().ok().filter(|&n: &usize| n > 0)
}
