//! AI code-generation collaborator.
//!
//! The pipeline only depends on the [`AiService`] trait: text in, text out,
//! plus an advisory token count. Concrete implementations:
//!
//! | Type                 | Purpose                                            |
//! |----------------------|----------------------------------------------------|
//! | `AnthropicService`   | Messages API over HTTP (`reqwest`)                 |
//! | `RetryingAiService`  | Wraps any service with capped exponential backoff  |

pub mod anthropic;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AiError;
pub use anthropic::AnthropicService;
pub use retry::{RetryPolicy, RetryingAiService};

/// A completed AI request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,
    /// Best-effort usage figure; zero when the transport does not report it.
    pub tokens_used: u64,
}

impl AiResponse {
    pub fn new(text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            text: text.into(),
            tokens_used,
        }
    }
}

/// Abstraction over the AI code-generation service for testability.
/// Real implementation: `AnthropicService`. Test doubles script responses.
#[async_trait]
pub trait AiService: Send + Sync {
    async fn ask(&self, prompt: &str, max_output_tokens: u32) -> Result<AiResponse, AiError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted AI doubles shared by unit tests across modules.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Replays queued responses in order and records every prompt it saw.
    /// Once the queue is empty it keeps returning `fallback`.
    pub struct ScriptedAi {
        queue: Mutex<VecDeque<Result<AiResponse, AiError>>>,
        fallback: Result<AiResponse, AiError>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAi {
        pub fn new(responses: Vec<Result<AiResponse, AiError>>) -> Self {
            Self::with_fallback(responses, Ok(AiResponse::new("", 0)))
        }

        pub fn with_fallback(
            responses: Vec<Result<AiResponse, AiError>>,
            fallback: Result<AiResponse, AiError>,
        ) -> Self {
            Self {
                queue: Mutex::new(responses.into()),
                fallback,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn always(text: &str) -> Self {
            Self::with_fallback(Vec::new(), Ok(AiResponse::new(text, 10)))
        }

        pub fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AiService for ScriptedAi {
        async fn ask(&self, prompt: &str, _max_output_tokens: u32) -> Result<AiResponse, AiError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.queue.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Accepts every request and never answers.
    #[derive(Default)]
    pub struct HangingAi {
        calls: AtomicU32,
    }

    impl HangingAi {
        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiService for HangingAi {
        async fn ask(&self, _prompt: &str, _max_output_tokens: u32) -> Result<AiResponse, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }
}
