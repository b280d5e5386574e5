//! 持久化存储
//! 两个互相独立的集合：按题库保存的进行中会话，以及累积的错题记录。
//! 所有操作都是尽力而为：后端出错或内容损坏时记录警告，读取按"不存在"处理，写入被跳过。

use crate::models::{Question, SavedQuizSession, WrongQuestionRecord, REVIEW_BANK_ID};
use crate::services::database::{KeyValueStore, NullStore};
use crate::utils::now_millis;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// 会话键前缀，完整键为 `quiz-in-progress:<bankId>`
pub const SESSION_KEY_PREFIX: &str = "quiz-in-progress:";
/// 错题数组所在的键
pub const WRONG_QUESTIONS_KEY: &str = "quiz-wrong-questions";

/// 持久化存储，持有一个可注入的键值后端
pub struct PersistenceStore {
    backend: Box<dyn KeyValueStore>,
}

impl PersistenceStore {
    pub fn new<S: KeyValueStore + 'static>(backend: S) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// 无存储可用时使用，所有操作均为空操作
    pub fn headless() -> Self {
        Self::new(NullStore)
    }

    pub fn sessions(&self) -> SessionStore<'_> {
        SessionStore { store: self }
    }

    pub fn wrong_questions(&self) -> WrongQuestionStore<'_> {
        WrongQuestionStore { store: self }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("读取 {} 失败: {:#}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{} 的内容已损坏，按不存在处理: {}", key, e);
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("序列化 {} 失败: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &raw) {
            warn!("写入 {} 失败: {:#}", key, e);
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!("删除 {} 失败: {:#}", key, e);
        }
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        self.backend.keys_with_prefix(prefix).unwrap_or_else(|e| {
            warn!("列出 {}* 失败: {:#}", prefix, e);
            Vec::new()
        })
    }
}

fn session_key(bank_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, bank_id)
}

/// 进行中会话集合
pub struct SessionStore<'a> {
    store: &'a PersistenceStore,
}

impl SessionStore<'_> {
    /// 按 bank_id 覆盖保存，并把 last_updated 记为当前时间。错题复习会话不保存。
    pub fn save(&self, session: &SavedQuizSession) {
        if session.bank_id == REVIEW_BANK_ID {
            debug!("错题复习会话不做保存");
            return;
        }
        let mut stamped = session.clone();
        stamped.last_updated = now_millis();
        self.store.write_json(&session_key(&session.bank_id), &stamped);
    }

    pub fn get(&self, bank_id: &str) -> Option<SavedQuizSession> {
        if bank_id == REVIEW_BANK_ID {
            return None;
        }
        self.store.read_json(&session_key(bank_id))
    }

    pub fn has(&self, bank_id: &str) -> bool {
        self.get(bank_id).is_some()
    }

    pub fn remove(&self, bank_id: &str) {
        self.store.delete(&session_key(bank_id));
    }

    /// 所有可读的会话，损坏的条目被跳过
    pub fn get_all(&self) -> BTreeMap<String, SavedQuizSession> {
        self.store
            .keys(SESSION_KEY_PREFIX)
            .into_iter()
            .filter_map(|key| {
                let session: SavedQuizSession = self.store.read_json(&key)?;
                Some((session.bank_id.clone(), session))
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    pub fn clear_all(&self) {
        for key in self.store.keys(SESSION_KEY_PREFIX) {
            self.store.delete(&key);
        }
    }
}

/// 错题集合
pub struct WrongQuestionStore<'a> {
    store: &'a PersistenceStore,
}

impl WrongQuestionStore<'_> {
    pub fn get_all(&self) -> Vec<WrongQuestionRecord> {
        self.store.read_json(WRONG_QUESTIONS_KEY).unwrap_or_default()
    }

    /// 逐条插入，已存在相同 (bank_id, question.id) 的记录时丢弃新记录（先写者胜）。
    /// 返回实际插入的条数。
    pub fn add_many(&self, records: &[WrongQuestionRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }
        let mut all = self.get_all();
        let mut seen: HashSet<(String, u32)> = all
            .iter()
            .map(|r| (r.bank_id.clone(), r.question.id()))
            .collect();

        let mut inserted = 0;
        for record in records {
            if seen.insert((record.bank_id.clone(), record.question.id())) {
                all.push(record.clone());
                inserted += 1;
            }
        }

        if inserted > 0 {
            self.store.write_json(WRONG_QUESTIONS_KEY, &all);
        }
        debug!("错题写入 {} 条，忽略重复 {} 条", inserted, records.len() - inserted);
        inserted
    }

    /// 删除匹配的记录，不存在时什么也不做。返回是否删除了记录。
    pub fn remove(&self, bank_id: &str, question_id: u32) -> bool {
        let mut all = self.get_all();
        let before = all.len();
        all.retain(|r| !r.matches(bank_id, question_id));
        if all.len() == before {
            return false;
        }
        self.store.write_json(WRONG_QUESTIONS_KEY, &all);
        true
    }

    pub fn clear(&self) {
        self.store.delete(WRONG_QUESTIONS_KEY);
    }

    pub fn get_by_bank(&self, bank_id: &str) -> Vec<WrongQuestionRecord> {
        self.get_all()
            .into_iter()
            .filter(|r| r.bank_id == bank_id)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    /// 查找题目所属的原始错题记录：优先完全相同的题目快照，其次同 id 的第一条
    pub fn origin_of(&self, question: &Question) -> Option<WrongQuestionRecord> {
        let all = self.get_all();
        let exact = all.iter().position(|r| r.question == *question);
        let index = exact.or_else(|| all.iter().position(|r| r.question.id() == question.id()))?;
        all.into_iter().nth(index)
    }
}
