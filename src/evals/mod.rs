//! Eval registry and implementations

pub mod mgsm;

use crate::core::{ChatCompletionSampler, EvalResult};
use crate::error::{MgsmEvalError, Result};

/// Names of the evals this binary knows how to run
pub const AVAILABLE_EVALS: &[&str] = &["mgsm"];

/// Options shared by eval construction
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Examples taken per language (10 in debug mode, 250 otherwise)
    pub num_examples_per_lang: usize,
    /// Base URL the per-language datasets are fetched from
    pub data_base_url: String,
    /// Language subset to run; empty means all languages
    pub languages: Vec<String>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            num_examples_per_lang: 250,
            data_base_url: mgsm::DEFAULT_DATA_BASE_URL.to_string(),
            languages: Vec::new(),
        }
    }
}

/// A benchmark that drives a sampler through a fixed set of test cases
/// and produces a scored result.
#[async_trait::async_trait]
pub trait Eval: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, sampler: &ChatCompletionSampler) -> Result<EvalResult>;
}

/// Resolve an eval by name. An unrecognized name is a fatal
/// configuration error, raised before any remote call is made.
pub fn get_eval(name: &str, options: &EvalOptions) -> Result<Box<dyn Eval>> {
    match name {
        "mgsm" => Ok(Box::new(mgsm::MgsmEval::new(options)?)),
        _ => Err(MgsmEvalError::UnknownEval(
            name.to_string(),
            AVAILABLE_EVALS.join(", "),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_eval_mgsm() {
        let eval = get_eval("mgsm", &EvalOptions::default()).unwrap();
        assert_eq!(eval.name(), "mgsm");
    }

    #[test]
    fn test_unknown_eval() {
        let result = get_eval("unknown_eval", &EvalOptions::default());
        match result {
            Err(MgsmEvalError::UnknownEval(name, available)) => {
                assert_eq!(name, "unknown_eval");
                assert!(available.contains("mgsm"));
            }
            _ => panic!("Expected UnknownEval error"),
        }
    }

    #[test]
    fn test_unknown_language_is_fatal() {
        let options = EvalOptions {
            languages: vec!["xx".to_string()],
            ..EvalOptions::default()
        };
        assert!(get_eval("mgsm", &options).is_err());
    }
}
