//! 答题会话状态机
//!
//! `QuizState` 是纯数据，`reduce(state, event)` 是纯函数，所有界面操作都表示为 `QuizEvent`。
//! `QuizController` 持有状态，负责开局/续做、每次变更后的保存、提交计分和错题本维护。

use crate::models::{
    count_units, AnswerRecord, Choice, PassageSubQuestion, Question, QuizMode, SavedQuizSession,
    REVIEW_BANK_ID,
};
use crate::services::bank::BankRegistry;
use crate::services::scoring::{review, score, Origin, QuizResult, ReviewStatus};
use crate::services::storage::PersistenceStore;
use crate::utils::now_millis;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 错题复习会话显示的名称
pub const REVIEW_BANK_NAME: &str = "错题复习";

/// 学习模式下"已揭晓答案"的标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RevealKey {
    Single(u32),
    Sub { passage_id: u32, sub_id: u32 },
}

impl RevealKey {
    fn belongs_to(&self, question: &Question) -> bool {
        match (self, question) {
            (RevealKey::Single(id), Question::Single(q)) => *id == q.id,
            (RevealKey::Sub { passage_id, .. }, Question::Passage(p)) => *passage_id == p.id,
            _ => false,
        }
    }
}

impl fmt::Display for RevealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevealKey::Single(id) => write!(f, "single-{}", id),
            RevealKey::Sub { passage_id, sub_id } => write!(f, "sub-{}-{}", passage_id, sub_id),
        }
    }
}

/// 界面可以触发的全部操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    /// 单选题作答；学习模式下对材料题作用于当前小题
    SelectAnswer(Choice),
    SelectSubAnswer { sub_id: u32, choice: Choice },
    Advance,
    Retreat,
    /// 快速跳转到第 i 题，越界时取最后一题
    JumpTo(usize),
    SetActiveSub(usize),
    NextSub,
    PrevSub,
    /// 重新打乱全部题目并清空作答
    Shuffle { seed: u64 },
    /// 学习模式确认键：已揭晓时前往下一小题或下一题
    Confirm,
}

/// 会话状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuizState {
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerRecord>,
    pub current_index: usize,
    pub active_sub_index: usize,
    pub mode: QuizMode,
    pub revealed: BTreeSet<RevealKey>,
}

impl QuizState {
    pub fn new(questions: Vec<Question>, mode: QuizMode) -> Self {
        let answers = questions.iter().map(AnswerRecord::blank_for).collect();
        Self {
            questions,
            answers,
            current_index: 0,
            active_sub_index: 0,
            mode,
            revealed: BTreeSet::new(),
        }
    }

    /// 从保存的快照恢复。作答记录与题目对不上的位置重新置空，材料题的小题表补齐/去除多余键。
    pub fn restore(
        questions: Vec<Question>,
        answers: Vec<AnswerRecord>,
        current_index: usize,
        mode: QuizMode,
    ) -> Self {
        let mut saved = answers.into_iter();
        let answers = questions
            .iter()
            .map(|q| match saved.next() {
                Some(a) if a.question_id == q.id() => normalize_answer(q, a),
                _ => AnswerRecord::blank_for(q),
            })
            .collect();
        let current_index = current_index.min(questions.len().saturating_sub(1));

        Self {
            questions,
            answers,
            current_index,
            active_sub_index: 0,
            mode,
            revealed: BTreeSet::new(),
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.answers.get(self.current_index)
    }

    pub fn active_sub_question(&self) -> Option<&PassageSubQuestion> {
        self.current_question()?
            .as_passage()?
            .sub_questions
            .get(self.active_sub_index)
    }

    /// 当前题（或当前小题）的揭晓标记
    pub fn active_reveal_key(&self) -> Option<RevealKey> {
        match self.current_question()? {
            Question::Single(q) => Some(RevealKey::Single(q.id)),
            Question::Passage(p) => {
                let sub = p.sub_questions.get(self.active_sub_index)?;
                Some(RevealKey::Sub { passage_id: p.id, sub_id: sub.id })
            }
        }
    }

    pub fn is_revealed(&self, key: &RevealKey) -> bool {
        self.revealed.contains(key)
    }

    /// 已揭晓的单位当前选择是否正确；未揭晓或未作答时为 None
    pub fn revealed_correctness(&self, key: &RevealKey) -> Option<bool> {
        if !self.is_revealed(key) {
            return None;
        }
        let (question, answer) = (self.current_question()?, self.current_answer()?);
        match (key, question) {
            (RevealKey::Single(_), Question::Single(q)) => {
                answer.selected_answer.map(|c| c == q.correct_answer)
            }
            (RevealKey::Sub { sub_id, .. }, Question::Passage(p)) => {
                let sub = p.sub_question(*sub_id)?;
                answer.sub_answer(*sub_id).map(|c| c == sub.correct_answer)
            }
            _ => None,
        }
    }

    /// 已作答单位数：单选题看主选项，材料题数非空的小题答案
    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| a.answered_units(q))
            .sum()
    }

    pub fn total_units(&self) -> usize {
        count_units(&self.questions)
    }

    pub fn can_submit(&self) -> bool {
        self.answered_count() > 0
    }

    /// 单选题已选，或材料题所有小题都已选
    pub fn is_question_answered(&self, index: usize) -> bool {
        match (self.questions.get(index), self.answers.get(index)) {
            (Some(q), Some(a)) => a.is_complete(q),
            _ => false,
        }
    }

    fn select_sub(&mut self, sub_id: u32, choice: Choice) {
        let idx = self.current_index;
        let Some(Question::Passage(passage)) = self.questions.get(idx) else {
            return;
        };
        if passage.sub_question(sub_id).is_none() {
            return;
        }
        let passage_id = passage.id;
        if let Some(map) = self.answers[idx].sub_answers.as_mut() {
            map.insert(sub_id, Some(choice));
        }
        if self.mode == QuizMode::Study {
            self.revealed.insert(RevealKey::Sub { passage_id, sub_id });
        }
    }

    fn move_to(&mut self, target: usize) {
        if target == self.current_index || target >= self.questions.len() {
            return;
        }
        self.current_index = target;
        self.active_sub_index = 0;
        if self.mode == QuizMode::Study {
            // 学习模式每次来到一道题都是重新作答
            let question = &self.questions[target];
            self.answers[target] = AnswerRecord::blank_for(question);
            self.revealed.retain(|k| !k.belongs_to(question));
        }
    }

    fn set_active_sub(&mut self, index: usize) {
        let count = self
            .current_question()
            .and_then(Question::as_passage)
            .map(|p| p.sub_questions.len())
            .unwrap_or(0);
        self.active_sub_index = index.min(count.saturating_sub(1));
    }
}

fn normalize_answer(question: &Question, mut answer: AnswerRecord) -> AnswerRecord {
    answer.sub_answers = question.as_passage().map(|p| {
        let saved = answer.sub_answers.take().unwrap_or_default();
        p.sub_questions
            .iter()
            .map(|sq| (sq.id, saved.get(&sq.id).copied().flatten()))
            .collect::<BTreeMap<_, _>>()
    });
    answer
}

/// 状态转移
pub fn reduce(mut state: QuizState, event: &QuizEvent) -> QuizState {
    if state.questions.is_empty() {
        return state;
    }

    match event {
        QuizEvent::SelectAnswer(choice) => {
            let idx = state.current_index;
            match &state.questions[idx] {
                Question::Single(q) => {
                    let key = RevealKey::Single(q.id);
                    state.answers[idx].selected_answer = Some(*choice);
                    if state.mode == QuizMode::Study {
                        state.revealed.insert(key);
                    }
                }
                Question::Passage(p) if state.mode == QuizMode::Study => {
                    if let Some(sub_id) = p.sub_questions.get(state.active_sub_index).map(|sq| sq.id) {
                        state.select_sub(sub_id, *choice);
                    }
                }
                Question::Passage(_) => {}
            }
        }
        QuizEvent::SelectSubAnswer { sub_id, choice } => state.select_sub(*sub_id, *choice),
        QuizEvent::Advance => {
            let next = state.current_index + 1;
            state.move_to(next);
        }
        QuizEvent::Retreat => {
            if let Some(prev) = state.current_index.checked_sub(1) {
                state.move_to(prev);
            }
        }
        QuizEvent::JumpTo(index) => {
            let target = (*index).min(state.questions.len() - 1);
            state.move_to(target);
        }
        QuizEvent::SetActiveSub(index) => state.set_active_sub(*index),
        QuizEvent::NextSub => {
            let next = state.active_sub_index + 1;
            state.set_active_sub(next);
        }
        QuizEvent::PrevSub => {
            let prev = state.active_sub_index.saturating_sub(1);
            state.set_active_sub(prev);
        }
        QuizEvent::Shuffle { seed } => {
            let mut rng = StdRng::seed_from_u64(*seed);
            state.questions.shuffle(&mut rng);
            state = QuizState::new(state.questions, state.mode);
        }
        QuizEvent::Confirm => {
            if state.mode != QuizMode::Study {
                return state;
            }
            let revealed = state
                .active_reveal_key()
                .map(|k| state.is_revealed(&k))
                .unwrap_or(false);
            if !revealed {
                return state;
            }
            let sub_count = state
                .current_question()
                .and_then(Question::as_passage)
                .map(|p| p.sub_questions.len())
                .unwrap_or(0);
            if state.active_sub_index + 1 < sub_count {
                state.active_sub_index += 1;
            } else {
                let next = state.current_index + 1;
                state.move_to(next);
            }
        }
    }
    state
}

/// 学习模式下答案揭晓时的反馈（如音效）
pub trait AnswerFeedback {
    fn on_reveal(&self, correct: bool);
}

/// 不做任何反馈
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl AnswerFeedback for SilentFeedback {
    fn on_reveal(&self, _correct: bool) {}
}

/// 放弃、重做、清空等破坏性操作前的确认
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// 无法开始答题的原因，调用方应回到首页
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    UnknownBank(String),
    EmptyBank(String),
    NoWrongQuestions,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::UnknownBank(id) => write!(f, "题库不存在: {}", id),
            Unavailable::EmptyBank(id) => write!(f, "题库没有题目: {}", id),
            Unavailable::NoWrongQuestions => f.write_str("错题本是空的"),
        }
    }
}

/// 开始答题的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub bank_id: String,
    pub count: usize,
    pub mode: QuizMode,
    /// 有保存的进度时继续
    pub resume: bool,
    /// 随机抽题/洗牌种子，None 时随机生成
    pub seed: Option<u64>,
}

impl StartRequest {
    pub fn new(bank_id: &str, count: usize) -> Self {
        Self {
            bank_id: bank_id.to_string(),
            count,
            mode: QuizMode::Quiz,
            resume: false,
            seed: None,
        }
    }

    /// 错题复习
    pub fn review() -> Self {
        Self::new(REVIEW_BANK_ID, usize::MAX)
    }

    pub fn mode(mut self, mode: QuizMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn resume(mut self) -> Self {
        self.resume = true;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// 会话控制器
pub struct QuizController<'a> {
    bank_id: String,
    bank_name: String,
    start_time: i64,
    state: QuizState,
    resumed: bool,
    store: &'a PersistenceStore,
    feedback: &'a dyn AnswerFeedback,
    result: Option<QuizResult>,
}

impl<'a> QuizController<'a> {
    /// 开局或续做
    pub fn open(
        registry: &BankRegistry,
        store: &'a PersistenceStore,
        feedback: &'a dyn AnswerFeedback,
        request: &StartRequest,
    ) -> Result<Self, Unavailable> {
        if request.bank_id == REVIEW_BANK_ID {
            let records = store.wrong_questions().get_all();
            if records.is_empty() {
                return Err(Unavailable::NoWrongQuestions);
            }
            let questions: Vec<Question> = records.into_iter().map(|r| r.question).collect();
            info!("开始错题复习，共 {} 项", questions.len());
            return Ok(Self::build(request, REVIEW_BANK_NAME.to_string(), QuizState::new(questions, request.mode), store, feedback));
        }

        if request.resume {
            let saved = store.sessions().get(&request.bank_id);
            if let Some(saved) = saved.filter(|s| !s.questions.is_empty()) {
                info!("继续题库 {} 的进度，第 {} 题", saved.bank_id, saved.current_index + 1);
                let state = QuizState::restore(saved.questions, saved.answers, saved.current_index, saved.mode);
                let mut controller = Self::build(request, saved.bank_name, state, store, feedback);
                controller.start_time = saved.start_time;
                controller.resumed = true;
                return Ok(controller);
            }
        }

        let bank = registry
            .get_bank(&request.bank_id)
            .ok_or_else(|| Unavailable::UnknownBank(request.bank_id.clone()))?;
        let questions = match request.mode {
            QuizMode::Study => registry.sample_ordered(&bank.id, request.count),
            QuizMode::Quiz => {
                let seed = request.seed.unwrap_or_else(|| rand::thread_rng().gen());
                registry.sample_random(&bank.id, request.count, &mut StdRng::seed_from_u64(seed))
            }
        };
        if questions.is_empty() {
            return Err(Unavailable::EmptyBank(bank.id.clone()));
        }

        if store.sessions().has(&bank.id) {
            debug!("丢弃题库 {} 的旧进度", bank.id);
            store.sessions().remove(&bank.id);
        }
        info!("开始题库 {} ({:?})，共 {} 项", bank.id, request.mode, questions.len());
        let controller = Self::build(request, bank.name.clone(), QuizState::new(questions, request.mode), store, feedback);
        controller.persist();
        Ok(controller)
    }

    fn build(
        request: &StartRequest,
        bank_name: String,
        state: QuizState,
        store: &'a PersistenceStore,
        feedback: &'a dyn AnswerFeedback,
    ) -> Self {
        Self {
            bank_id: request.bank_id.clone(),
            bank_name,
            start_time: now_millis(),
            state,
            resumed: false,
            store,
            feedback,
            result: None,
        }
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn bank_id(&self) -> &str {
        &self.bank_id
    }

    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn elapsed_millis(&self) -> i64 {
        now_millis() - self.start_time
    }

    pub fn is_review(&self) -> bool {
        self.bank_id == REVIEW_BANK_ID
    }

    pub fn was_resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// 应用一个操作，随后保存快照
    pub fn dispatch(&mut self, event: QuizEvent) {
        if self.is_finished() {
            debug!("已提交，忽略操作 {:?}", event);
            return;
        }
        debug!("{} <- {:?}", self.bank_id, event);
        self.state = reduce(std::mem::take(&mut self.state), &event);

        if self.state.mode == QuizMode::Study {
            let key = match event {
                QuizEvent::SelectAnswer(_) => self.state.active_reveal_key(),
                QuizEvent::SelectSubAnswer { sub_id, .. } => self
                    .state
                    .current_question()
                    .and_then(Question::as_passage)
                    .map(|p| RevealKey::Sub { passage_id: p.id, sub_id }),
                _ => None,
            };
            if let Some(correct) = key.and_then(|k| self.state.revealed_correctness(&k)) {
                self.feedback.on_reveal(correct);
            }
        }

        self.persist();
    }

    pub fn select_answer(&mut self, choice: Choice) {
        self.dispatch(QuizEvent::SelectAnswer(choice));
    }

    pub fn select_sub_answer(&mut self, sub_id: u32, choice: Choice) {
        self.dispatch(QuizEvent::SelectSubAnswer { sub_id, choice });
    }

    pub fn advance(&mut self) {
        self.dispatch(QuizEvent::Advance);
    }

    pub fn retreat(&mut self) {
        self.dispatch(QuizEvent::Retreat);
    }

    pub fn jump_to(&mut self, index: usize) {
        self.dispatch(QuizEvent::JumpTo(index));
    }

    pub fn set_active_sub_index(&mut self, index: usize) {
        self.dispatch(QuizEvent::SetActiveSub(index));
    }

    pub fn shuffle_remaining(&mut self) {
        let seed = rand::thread_rng().gen();
        self.dispatch(QuizEvent::Shuffle { seed });
    }

    pub fn confirm(&mut self) {
        self.dispatch(QuizEvent::Confirm);
    }

    /// 当前状态的可保存快照
    pub fn snapshot(&self) -> SavedQuizSession {
        SavedQuizSession {
            bank_id: self.bank_id.clone(),
            bank_name: self.bank_name.clone(),
            questions: self.state.questions.clone(),
            answers: self.state.answers.clone(),
            current_index: self.state.current_index,
            start_time: self.start_time,
            last_updated: now_millis(),
            mode: self.state.mode,
        }
    }

    fn persist(&self) {
        // 提交后保存的进度已被删除，不能再写回
        if self.is_finished() || self.is_review() || self.state.questions.is_empty() {
            return;
        }
        self.store.sessions().save(&self.snapshot());
    }

    /// 提交。计分、删除保存的进度、更新错题本；重复调用返回第一次的结果。
    pub fn submit(&mut self) -> &QuizResult {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.finish(),
        };
        self.result.insert(result)
    }

    fn origin_of(&self, question: &Question) -> Origin {
        if !self.is_review() {
            return Origin {
                bank_id: self.bank_id.clone(),
                bank_name: self.bank_name.clone(),
            };
        }
        match self.store.wrong_questions().origin_of(question) {
            Some(record) => Origin {
                bank_id: record.bank_id,
                bank_name: record.bank_name,
            },
            None => Origin {
                bank_id: REVIEW_BANK_ID.to_string(),
                bank_name: self.bank_name.clone(),
            },
        }
    }

    fn finish(&self) -> QuizResult {
        let questions = &self.state.questions;
        let answers = &self.state.answers;
        let result = score(&self.bank_name, questions, answers, now_millis(), |q| self.origin_of(q));

        // 答对的题从错题本移除（按其原始题库）
        let wrong = self.store.wrong_questions();
        for item in review(questions, answers) {
            if item.status != ReviewStatus::Correct {
                continue;
            }
            let origin = self.origin_of(&questions[item.index]);
            if wrong.remove(&origin.bank_id, item.question_id) {
                debug!("错题 {}#{} 已答对，移出错题本", origin.bank_id, item.question_id);
            }
        }

        let records: Vec<_> = result
            .wrong_records
            .iter()
            .filter(|r| r.bank_id != REVIEW_BANK_ID)
            .cloned()
            .collect();
        wrong.add_many(&records);

        if !self.is_review() {
            self.store.sessions().remove(&self.bank_id);
        }
        info!(
            "提交 {}: {}/{} ({}%), 错题 {} 条",
            self.bank_id,
            result.correct_count,
            result.total_units,
            result.percentage,
            result.wrong_records.len()
        );
        result
    }

    /// 暂停离开，保留进度
    pub fn abandon(self, confirm: &dyn Confirm) -> Result<(), Self> {
        if self.is_finished() {
            return Ok(());
        }
        if !confirm.confirm("确定要离开吗？进度已保存，可以稍后继续。") {
            return Err(self);
        }
        self.persist();
        info!("暂停题库 {}", self.bank_id);
        Ok(())
    }

    /// 放弃进度，删除保存的会话
    pub fn reset(self, confirm: &dyn Confirm) -> Result<(), Self> {
        if self.is_finished() {
            return Ok(());
        }
        if !confirm.confirm("确定要从头再来吗？当前进度将被删除。") {
            return Err(self);
        }
        if !self.is_review() {
            self.store.sessions().remove(&self.bank_id);
        }
        info!("重置题库 {}", self.bank_id);
        Ok(())
    }
}
