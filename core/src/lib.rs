//! # weft-core
//!
//! The agent core: a provider-agnostic LLM adapter, an MCP tool-server
//! registry, a tool executor, three pluggable inference strategies, and the
//! [`engine::Engine`] that ties them together behind a hot-swappable
//! `(LlmClient, InferenceStrategy)` pair.
//!
//! This crate has no CLI surface of its own — it only emits `tracing`
//! events. The binary crate installs the subscriber.

pub mod engine;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod message;
pub mod strategy;
pub mod tools;

pub use engine::{Engine, StrategyKind};
pub use error::{AgentError, ErrorKind};
pub use message::{ConversationMemory, Message, Role};
