//! Library crate for chat-trivia, exposing modules for the binary and integration tests.

pub mod config;
pub mod dao;
pub mod error;
pub mod services;
pub mod state;
pub mod transport;
