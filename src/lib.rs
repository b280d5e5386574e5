pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use services::{BankRegistry, PersistenceStore, QuizController, StartRequest};
