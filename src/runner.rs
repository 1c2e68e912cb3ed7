//! Sequential (sampler, eval) pair execution and result persistence

use crate::core::{ChatCompletionSampler, EvalResult};
use crate::error::Result;
use crate::evals::Eval;
use crate::report;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output file stem for one (eval, sampler) pair
pub fn file_stem(eval_name: &str, sampler_name: &str, debug: bool) -> String {
    let debug_suffix = if debug { "_DEBUG" } else { "" };
    format!("{}_{}{}", eval_name, sampler_name, debug_suffix)
}

/// Summary of one completed pair, keyed by file stem in the run output
#[derive(Debug, Clone, Serialize)]
pub struct PairSummary {
    pub score: f64,
    pub metrics: BTreeMap<String, f64>,
    pub result_path: PathBuf,
    pub report_path: PathBuf,
}

/// Runs each configured eval against each configured sampler, one pair
/// at a time, and writes an HTML report plus a JSON metrics file per pair.
pub struct EvalRunner {
    output_dir: PathBuf,
    debug: bool,
}

impl EvalRunner {
    pub fn new(output_dir: PathBuf, debug: bool) -> Self {
        Self { output_dir, debug }
    }

    /// Write `<stem>.html` and `<stem>.json` for one result. The JSON file
    /// is the metrics map merged with `{"score": score}`, pretty-printed.
    fn write_outputs(
        &self,
        eval_name: &str,
        sampler_name: &str,
        stem: &str,
        result: &EvalResult,
    ) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self.output_dir.join(format!("{}.html", stem));
        info!(path = %report_path.display(), "Writing report");
        fs::write(
            &report_path,
            report::make_report(eval_name, sampler_name, result),
        )?;

        let mut merged = serde_json::Map::new();
        for (name, value) in &result.metrics {
            merged.insert(name.clone(), serde_json::json!(value));
        }
        merged.insert("score".to_string(), serde_json::json!(result.score));

        let result_path = self.output_dir.join(format!("{}.json", stem));
        info!(path = %result_path.display(), "Writing results");
        let writer = BufWriter::new(File::create(&result_path)?);
        serde_json::to_writer_pretty(writer, &merged)?;

        Ok((report_path, result_path))
    }

    /// Run every (sampler, eval) pair sequentially, in iteration order.
    /// Returns the summaries keyed by file stem.
    pub async fn run(
        &self,
        samplers: &[(String, ChatCompletionSampler)],
        evals: &[(String, Box<dyn Eval>)],
    ) -> Result<BTreeMap<String, PairSummary>> {
        let mut summaries = BTreeMap::new();

        for (sampler_name, sampler) in samplers {
            for (eval_name, eval) in evals {
                info!(eval = %eval_name, sampler = %sampler_name, "Running eval");
                let result = eval.run(sampler).await?;

                let stem = file_stem(eval_name, sampler_name, self.debug);
                let (report_path, result_path) =
                    self.write_outputs(eval_name, sampler_name, &stem, &result)?;

                summaries.insert(
                    stem,
                    PairSummary {
                        score: result.score,
                        metrics: result.metrics,
                        result_path,
                        report_path,
                    },
                );
            }
        }

        Ok(summaries)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
