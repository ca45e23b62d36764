//! Client library for a RAG answering service: endpoint config, liveness
//! monitor, question/answer exchange, and text rendering.
//! Used by the `rag-chat` binary.

pub mod app;
pub mod client;
pub mod config;
pub mod exchange;
pub mod health;
pub mod messages;
pub mod render;

pub use app::{App, View};
pub use client::{Client, ClientError};
pub use config::{default_config_path, Config, ConfigError, Endpoint};
pub use exchange::{ChatState, ExchangeController, Settled, Turn};
pub use health::{HealthMonitor, HealthReport, HealthStatus};
pub use messages::AnswerReply;
