//! Language-model backends for Napier.
//!
//! The orchestration loop only sees the [`LlmBackend`] trait: a system
//! preamble, a role-tagged history and generation options go in, text comes
//! out.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! │  - health_check()                       │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!     ┌─────────┐        ┌──────────┐
//!     │ Gemini  │        │   Mock   │
//!     └─────────┘        └──────────┘
//! ```

pub mod backend;
pub mod error;
pub mod gemini;
pub mod types;

pub use backend::{LlmBackend, MockBackend, MockResponse, SharedBackend, with_retry};
pub use error::{LlmError, RateLimitInfo, Result};
pub use gemini::{DEFAULT_GEMINI_MODEL, GEMINI_API_KEY_ENV, GeminiBackend, GeminiConfig};
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, GenerationOptions, Role};
