//! Insighter: a search-grounded research answer relay and its stream consumer.

pub mod config;
pub mod consumer;
pub mod error;
pub mod llm;
pub mod markup;
pub mod news;
pub mod prompt;
pub mod relay;
pub mod retry;
pub mod routes;
pub mod search;
pub mod sources;
pub mod state;
pub mod wire;
