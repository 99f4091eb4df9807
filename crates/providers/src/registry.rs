//! Process-wide fallback registry: one chain per capability. There is
//! exactly one of these per process; construct it through [`global`].
//!
//! A single `HashMap<String, dyn Any>` would erase the very types this crate
//! exists to preserve, so instead the registry is a small fixed struct with
//! one strongly-typed chain per capability and thin accessor methods.

use crate::capabilities::{EmbeddingReply, EmbeddingRequest, SearchReply, SearchRequest, SttReply, SttRequest, TtsReply, TtsRequest};
use crate::chain::{FallbackChain, Provider};
use crate::llm::{LlmReply, LlmRequest};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::RwLock;

/// Built-in placeholder registered on every chain so `status()`/`execute()`
/// have something to report before the host registers a real provider for
/// that capability. Always available, always fails on execute.
struct UnconfiguredProvider<I, O> {
    capability: &'static str,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> UnconfiguredProvider<I, O> {
    fn new(capability: &'static str) -> Self {
        Self { capability, _marker: PhantomData }
    }
}

#[async_trait::async_trait]
impl<I: Send + Sync + 'static, O: Send + Sync + 'static> Provider<I, O> for UnconfiguredProvider<I, O> {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn priority(&self) -> i32 {
        i32::MAX
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, _input: &I) -> Result<O, String> {
        Err(format!("no {} provider registered", self.capability))
    }
}

pub struct FallbackRegistry {
    pub llm: RwLock<FallbackChain<LlmRequest, LlmReply>>,
    pub embedding: RwLock<FallbackChain<EmbeddingRequest, EmbeddingReply>>,
    pub search: RwLock<FallbackChain<SearchRequest, SearchReply>>,
    pub tts: RwLock<FallbackChain<TtsRequest, TtsReply>>,
    pub stt: RwLock<FallbackChain<SttRequest, SttReply>>,
}

impl FallbackRegistry {
    fn new() -> Self {
        let mut llm = FallbackChain::new(Duration::from_secs(60));
        llm.register(Arc::new(UnconfiguredProvider::new("llm")));

        let mut embedding = FallbackChain::new(Duration::from_secs(30));
        embedding.register(Arc::new(UnconfiguredProvider::new("embedding")));

        let mut search = FallbackChain::new(Duration::from_secs(15));
        search.register(Arc::new(UnconfiguredProvider::new("search")));

        let mut tts = FallbackChain::new(Duration::from_secs(30));
        tts.register(Arc::new(UnconfiguredProvider::new("tts")));

        let mut stt = FallbackChain::new(Duration::from_secs(30));
        stt.register(Arc::new(UnconfiguredProvider::new("stt")));

        Self {
            llm: RwLock::new(llm),
            embedding: RwLock::new(embedding),
            search: RwLock::new(search),
            tts: RwLock::new(tts),
            stt: RwLock::new(stt),
        }
    }
}

static REGISTRY: OnceLock<FallbackRegistry> = OnceLock::new();

/// The process-wide registry, created lazily on first access.
pub fn global() -> &'static FallbackRegistry {
    REGISTRY.get_or_init(FallbackRegistry::new)
}
