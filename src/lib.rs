//! mgsmeval - benchmark runner for multilingual grade-school math
//!
//! This crate provides:
//! - A rate-limited sampler for OpenAI-compatible chat-completion APIs
//! - The MGSM eval (11 languages, localized prompts and answer parsing)
//! - A runner that persists an HTML report and a JSON metrics file per
//!   (sampler, eval) pair

pub mod core;
pub mod error;
pub mod evals;
pub mod report;
pub mod runner;

pub use crate::core::{
    rate_limit_wait, retry_after_from_body, ChatCompletionSampler, ChatMessage, ContentPart,
    EvalResult, MessageContent, RetryPolicy, SamplerConfig, ScoredSample,
};
pub use crate::error::{MgsmEvalError, Result};
pub use crate::evals::{get_eval, Eval, EvalOptions, AVAILABLE_EVALS};
pub use crate::runner::{file_stem, EvalRunner};
