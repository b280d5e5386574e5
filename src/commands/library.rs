// 题库与错题本命令模块
// 首页概览、错题本分组列表，以及需要确认的清理操作

use crate::models::{BankSummary, WrongQuestionRecord};
use crate::services::bank::BankRegistry;
use crate::services::session::Confirm;
use crate::services::storage::PersistenceStore;
use crate::utils::format_time_ago;
use log::info;
use serde::Serialize;

/// 保存的进度摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSessionDto {
    pub answered_units: usize,
    pub total_units: usize,
    /// 上次停留的题号，从 1 开始
    pub position: usize,
    pub total_items: usize,
    pub time_ago: String,
}

/// 首页题库卡片
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankOverviewDto {
    #[serde(flatten)]
    pub summary: BankSummary,
    pub saved: Option<SavedSessionDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeOverview {
    pub banks: Vec<BankOverviewDto>,
    pub wrong_count: usize,
}

/// 首页数据
pub fn home_overview(registry: &BankRegistry, store: &PersistenceStore, now: i64) -> HomeOverview {
    let sessions = store.sessions().get_all();
    let banks = registry
        .summaries()
        .into_iter()
        .map(|summary| {
            let saved = sessions.get(&summary.id).map(|s| SavedSessionDto {
                answered_units: s.answered_units(),
                total_units: s.total_units(),
                position: s.current_index + 1,
                total_items: s.questions.len(),
                time_ago: format_time_ago(s.last_updated, now),
            });
            BankOverviewDto { summary, saved }
        })
        .collect();

    HomeOverview {
        banks,
        wrong_count: store.wrong_questions().count(),
    }
}

/// 错题本中一个题库的分组
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongGroupDto {
    pub bank_id: String,
    pub bank_name: String,
    pub records: Vec<WrongQuestionRecord>,
}

/// 按题库分组，分组顺序为首次出现的顺序
pub fn wrong_questions_by_bank(store: &PersistenceStore) -> Vec<WrongGroupDto> {
    let mut groups: Vec<WrongGroupDto> = Vec::new();
    for record in store.wrong_questions().get_all() {
        match groups.iter_mut().find(|g| g.bank_id == record.bank_id) {
            Some(group) => group.records.push(record),
            None => groups.push(WrongGroupDto {
                bank_id: record.bank_id.clone(),
                bank_name: record.bank_name.clone(),
                records: vec![record],
            }),
        }
    }
    groups
}

pub fn remove_wrong_question(store: &PersistenceStore, bank_id: &str, question_id: u32) -> bool {
    store.wrong_questions().remove(bank_id, question_id)
}

/// 清空错题本，需要确认
pub fn clear_wrong_questions(store: &PersistenceStore, confirm: &dyn Confirm) -> bool {
    let count = store.wrong_questions().count();
    if count == 0 || !confirm.confirm(&format!("确定要清空全部 {} 道错题吗？", count)) {
        return false;
    }
    store.wrong_questions().clear();
    info!("已清空错题本 ({} 条)", count);
    true
}

/// 删除某个题库保存的进度，需要确认
pub fn discard_saved_session(store: &PersistenceStore, bank_id: &str, confirm: &dyn Confirm) -> bool {
    if !store.sessions().has(bank_id) || !confirm.confirm("确定要删除保存的进度吗？") {
        return false;
    }
    store.sessions().remove(bank_id);
    info!("已删除题库 {} 的进度", bank_id);
    true
}
