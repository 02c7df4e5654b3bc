/// Persisted document models.
pub mod models;
/// CSV question bank.
pub mod question_bank;
/// Storage error types.
pub mod storage;
/// Score and backup persistence.
pub mod trivia_store;
