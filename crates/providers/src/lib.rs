//! aegis_providers
//!
//! Provider abstraction (component I): a `Provider<I, O>` trait, an ordered
//! `FallbackChain` that tries providers by priority with a per-attempt
//! timeout, a process-wide `FallbackRegistry` keyed by capability, and one
//! concrete HTTP transport (`OpenAICompatProvider`) for the `llm`
//! capability.

pub mod capabilities;
pub mod chain;
pub mod llm;
pub mod openai_compat;
pub mod registry;

pub use chain::{ChainAttempt, ChainError, ChainOutcome, FallbackChain, Provider};
pub use llm::{ChatMessage, LlmReply, LlmRequest, Usage};
pub use openai_compat::OpenAICompatProvider;
pub use registry::{global as global_registry, FallbackRegistry};
