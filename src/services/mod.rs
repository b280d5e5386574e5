// 服务模块
// 提供核心业务逻辑服务

pub mod bank;
pub mod database;
pub mod passage;
pub mod scoring;
pub mod session;
pub mod storage;

pub use bank::{merge_parts, BankProblem, BankRegistry, QuestionPart};

pub use database::{KeyValueStore, MemoryStore, NullStore, SqliteStore};

pub use passage::{blank_ids, check_blanks, passage_segments, BlankMismatch, PassageSegment};

pub use scoring::{
    percentage,
    review,
    score,
    Origin,
    QuestionReview,
    QuizResult,
    ReviewStatus,
    ScoreGrade,
    UnitOutcome,
};

pub use session::{
    reduce,
    AnswerFeedback,
    Confirm,
    QuizController,
    QuizEvent,
    QuizState,
    RevealKey,
    SilentFeedback,
    StartRequest,
    Unavailable,
    REVIEW_BANK_NAME,
};

pub use storage::{PersistenceStore, SessionStore, WrongQuestionStore, SESSION_KEY_PREFIX, WRONG_QUESTIONS_KEY};
