//! HTML report rendering for eval results

use crate::core::EvalResult;
use std::fmt::Write;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2em; }\n\
table { border-collapse: collapse; margin-bottom: 2em; }\n\
td, th { border: 1px solid #ccc; padding: 4px 12px; text-align: left; }\n\
.sample { border: 1px solid #ccc; margin-bottom: 1em; padding: 1em; }\n\
.sample pre { white-space: pre-wrap; background: #f6f6f6; padding: 0.5em; }\n\
.correct { color: #070; }\n\
.incorrect { color: #a00; }\n";

/// Render a self-contained HTML report: overall score, metrics table,
/// and one block per scored sample.
pub fn make_report(eval_name: &str, sampler_name: &str, result: &EvalResult) -> String {
    let mut html = String::new();
    let title = format!("{} — {}", eval_name, sampler_name);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n",
        escape_html(&title),
        STYLE
    );
    let _ = write!(html, "<h1>{}</h1>\n", escape_html(&title));
    let _ = write!(html, "<h2>Score: {:.4}</h2>\n", result.score);

    html.push_str("<table>\n<tr><th>Metric</th><th>Value</th></tr>\n");
    for (name, value) in &result.metrics {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{:.4}</td></tr>\n",
            escape_html(name),
            value
        );
    }
    html.push_str("</table>\n");

    for sample in &result.samples {
        let (class, verdict) = if sample.correct {
            ("correct", "correct")
        } else {
            ("incorrect", "incorrect")
        };
        let _ = write!(
            html,
            "<div class=\"sample\">\n\
             <p><strong>Language:</strong> {} — <span class=\"{}\">{}</span></p>\n\
             <p><strong>Prompt:</strong></p>\n<pre>{}</pre>\n\
             <p><strong>Response:</strong></p>\n<pre>{}</pre>\n\
             <p><strong>Extracted:</strong> {} — <strong>Target:</strong> {}</p>\n\
             </div>\n",
            escape_html(&sample.language),
            class,
            verdict,
            escape_html(&sample.prompt),
            escape_html(&sample.response),
            escape_html(&sample.extracted_answer),
            escape_html(&sample.target),
        );
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScoredSample;
    use std::collections::BTreeMap;

    fn sample_result() -> EvalResult {
        let mut metrics = BTreeMap::new();
        metrics.insert("en".to_string(), 0.5);
        EvalResult {
            score: 0.5,
            metrics,
            samples: vec![ScoredSample {
                language: "en".to_string(),
                prompt: "What is 1 < 2?".to_string(),
                response: "Answer: 42".to_string(),
                extracted_answer: "42".to_string(),
                target: "42".to_string(),
                correct: true,
            }],
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_report_contains_score_and_metrics() {
        let html = make_report("mgsm", "groq_llama3.1_8b_instant", &sample_result());
        assert!(html.contains("Score: 0.5000"));
        assert!(html.contains("<td>en</td>"));
        assert!(html.contains("mgsm — groq_llama3.1_8b_instant"));
    }

    #[test]
    fn test_report_escapes_prompt_text() {
        let html = make_report("mgsm", "s", &sample_result());
        assert!(html.contains("What is 1 &lt; 2?"));
        assert!(!html.contains("What is 1 < 2?"));
    }

    #[test]
    fn test_report_marks_correct_samples() {
        let html = make_report("mgsm", "s", &sample_result());
        assert!(html.contains("class=\"correct\""));
    }
}
