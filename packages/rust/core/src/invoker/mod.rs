//! Model invoker boundary.
//!
//! The orchestrator only knows [`ModelInvoker`]; [`HttpModelInvoker`] is the
//! production implementation for OpenAI-compatible chat completion APIs.

mod http;

use async_trait::async_trait;

use brainstorm_shared::{InvokeError, ModelConfig, Persona, TokenUsage};

pub use http::HttpModelInvoker;

/// Generated text plus the token counters reported for the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub output_text: String,
    pub usage: TokenUsage,
}

/// One generation call on behalf of a persona.
///
/// Implementations own timeouts and any retry policy; the orchestrator treats
/// every returned error as terminal for the run.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        persona: &Persona,
        payload: &str,
        model: &ModelConfig,
    ) -> Result<Invocation, InvokeError>;
}
