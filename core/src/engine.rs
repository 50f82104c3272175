//! Engine (spec §2 Module F, §4.6): owns the conversation's live state and
//! wires an `LlmClient` + `InferenceStrategy` pair to the shared MCP
//! registry and conversation memory.
//!
//! Grounded in the teacher's `session::Session` struct, which likewise holds
//! the swappable provider/strategy pair alongside memory that must survive a
//! swap. The Engine — not the strategy — owns [`ConversationMemory`], so a
//! hot-swap (spec §4.6, properties P5/R2) can replace the
//! `(LlmClient, InferenceStrategy)` pair while leaving memory and the
//! registry completely untouched; see spec.md §9's "per-inference
//! subprocess lifecycle bugs" flag for why the registry in particular must
//! never be torn down across a swap.

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::mcp::SharedRegistry;
use crate::message::ConversationMemory;
use crate::strategy::react::ReActStrategy;
use crate::strategy::simple::SimpleStrategy;
use crate::strategy::tooluse::ToolUseStrategy;
use crate::strategy::InferenceStrategy;
use crate::tools::ToolExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Simple,
    React,
    ToolUse,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Simple => "simple",
            StrategyKind::React => "react",
            StrategyKind::ToolUse => "tooluse",
        }
    }
}

fn build_strategy(kind: StrategyKind, llm: Arc<dyn LlmClient>, registry: SharedRegistry) -> Box<dyn InferenceStrategy> {
    let tools = registry.all_tools();
    let executor = ToolExecutor::new(registry);
    match kind {
        StrategyKind::Simple => Box::new(SimpleStrategy::new(llm, executor, tools)),
        StrategyKind::React => Box::new(ReActStrategy::new(llm, executor, tools)),
        StrategyKind::ToolUse => Box::new(ToolUseStrategy::new(llm, executor, tools)),
    }
}

/// Owns one conversation's live state. The Engine is the only thing that
/// ever constructs or replaces a strategy — callers never hold a
/// `Box<dyn InferenceStrategy>` of their own.
pub struct Engine {
    llm: Arc<dyn LlmClient>,
    strategy_kind: StrategyKind,
    strategy: Box<dyn InferenceStrategy>,
    registry: SharedRegistry,
    memory: ConversationMemory,
}

impl Engine {
    pub fn new(llm: Arc<dyn LlmClient>, strategy_kind: StrategyKind, registry: SharedRegistry) -> Self {
        let strategy = build_strategy(strategy_kind, Arc::clone(&llm), Arc::clone(&registry));
        Self { llm, strategy_kind, strategy, registry, memory: ConversationMemory::new() }
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy_kind
    }

    pub fn provider_name(&self) -> &str {
        self.llm.provider_name()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub async fn process_query(&mut self, text: &str) -> String {
        self.strategy.process_query(text, &mut self.memory).await
    }

    /// Hot-swaps the LLM client while keeping the current strategy kind,
    /// memory, and registry untouched. Tool schemas are reconverted through
    /// the new adapter as part of rebuilding the strategy (`build_strategy`
    /// re-reads `registry.all_tools()`), so nothing is cached stale.
    pub fn swap_llm(&mut self, llm: Arc<dyn LlmClient>) {
        self.strategy.close();
        self.strategy = build_strategy(self.strategy_kind, Arc::clone(&llm), Arc::clone(&self.registry));
        self.llm = llm;
    }

    /// Hot-swaps the strategy kind while keeping the current LLM client,
    /// memory, and registry untouched (spec §4.6 property P5).
    pub fn swap_strategy(&mut self, strategy_kind: StrategyKind) {
        self.strategy.close();
        self.strategy = build_strategy(strategy_kind, Arc::clone(&self.llm), Arc::clone(&self.registry));
        self.strategy_kind = strategy_kind;
    }

    /// Closes the current strategy and clears conversation memory — used by
    /// the `/reset` REPL command. Unlike a hot-swap, this intentionally does
    /// throw memory away; the registry connections are still left alone.
    pub fn reset_conversation(&mut self) {
        self.strategy.close();
        self.memory.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlm};
    use crate::mcp::McpRegistry;

    async fn registry() -> SharedRegistry {
        Arc::new(McpRegistry::connect_all(vec![]).await)
    }

    #[tokio::test]
    async fn process_query_delegates_to_the_configured_strategy() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("hi there")]));
        let mut engine = Engine::new(llm, StrategyKind::Simple, registry().await);
        let reply = engine.process_query("hello").await;
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn swap_strategy_changes_the_reported_kind() {
        let llm = Arc::new(MockLlm::new(vec![]));
        let mut engine = Engine::new(llm, StrategyKind::Simple, registry().await);
        engine.swap_strategy(StrategyKind::React);
        assert_eq!(engine.strategy_kind(), StrategyKind::React);
    }

    #[tokio::test]
    async fn swap_llm_updates_reported_provider_name() {
        let first = Arc::new(MockLlm::new(vec![]));
        let mut engine = Engine::new(first, StrategyKind::Simple, registry().await);
        assert_eq!(engine.provider_name(), "mock");
        let second = Arc::new(MockLlm::new(vec![]));
        engine.swap_llm(second);
        assert_eq!(engine.provider_name(), "mock");
    }

    #[tokio::test]
    async fn hot_swap_preserves_conversation_memory() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("first reply")]));
        let mut engine = Engine::new(llm, StrategyKind::Simple, registry().await);
        engine.process_query("remember this").await;
        assert_eq!(engine.memory().len(), 2);

        engine.swap_strategy(StrategyKind::React);
        assert_eq!(engine.memory().len(), 2);
        assert_eq!(engine.memory().history()[0].content, "remember this");
    }

    #[tokio::test]
    async fn reset_conversation_clears_memory() {
        let llm = Arc::new(MockLlm::new(vec![LlmResponse::text("reply")]));
        let mut engine = Engine::new(llm, StrategyKind::Simple, registry().await);
        engine.process_query("hello").await;
        assert!(!engine.memory().is_empty());
        engine.reset_conversation();
        assert!(engine.memory().is_empty());
    }

    #[test]
    fn strategy_kind_as_str_matches_lowercase_name() {
        assert_eq!(StrategyKind::Simple.as_str(), "simple");
        assert_eq!(StrategyKind::React.as_str(), "react");
        assert_eq!(StrategyKind::ToolUse.as_str(), "tooluse");
    }
}
