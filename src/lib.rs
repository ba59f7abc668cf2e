pub mod backend;
pub mod cache;
pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod schedule;
pub mod session;
pub mod store;
pub mod watch;

pub use engine::CompletionEngine;
pub use error::AppError;
pub use store::{CurriculumStore, FetchStats};
