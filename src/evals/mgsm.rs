//! MGSM - multilingual grade school math
//!
//! Eleven translations of the GSM8K test split. Each language has its own
//! instruction template and localized answer prefix; scoring is numeric
//! string equality on the extracted final answer.

use crate::core::{ChatCompletionSampler, ChatMessage, EvalResult, ScoredSample};
use crate::error::{MgsmEvalError, Result};
use crate::evals::{Eval, EvalOptions};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::info;

/// Public home of the per-language MGSM TSV files
pub const DEFAULT_DATA_BASE_URL: &str =
    "https://openaipublic.blob.core.windows.net/simple-evals";

/// One MGSM language: script group, prompt template, localized answer prefix
pub struct Language {
    pub code: &'static str,
    pub latin: bool,
    pub answer_prefix: &'static str,
    pub instruction: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language {
        code: "bn",
        latin: false,
        answer_prefix: "উত্তর",
        instruction: "এই গণিতের সমস্যাটি সমাধান করুন। চূড়ান্ত উত্তর দেওয়ার আগে যুক্তির ধাপগুলি দিন। শেষ লাইনে \"উত্তর:\" বিন্যাসে একা চূড়ান্ত উত্তরটি দিন। \"উত্তর:\" এর পরে পূর্ণসংখ্যার উত্তর ছাড়া অন্য কিছু যোগ করবেন না।\n\n{input}",
    },
    Language {
        code: "de",
        latin: true,
        answer_prefix: "Antwort",
        instruction: "Löse dieses Mathematikproblem. Gib die Begründungsschritte an, bevor du die endgültige Antwort in der letzten Zeile allein im Format \"Antwort:\" gibst. Füge nach \"Antwort:\" nichts anderes als die ganzzahlige Antwort hinzu.\n\n{input}",
    },
    Language {
        code: "en",
        latin: true,
        answer_prefix: "Answer",
        instruction: "Solve this math problem. Give the reasoning steps before giving the final answer on the last line by itself in the format of \"Answer:\". Do not add anything other than the integer answer after \"Answer:\".\n\n{input}",
    },
    Language {
        code: "es",
        latin: true,
        answer_prefix: "Respuesta",
        instruction: "Resuelve este problema matemático. Da los pasos de razonamiento antes de dar la respuesta final en la última línea por sí misma en el formato de \"Respuesta:\". No añadas nada más que la respuesta entera después de \"Respuesta:\".\n\n{input}",
    },
    Language {
        code: "fr",
        latin: true,
        answer_prefix: "Réponse",
        instruction: "Résolvez ce problème de mathématiques. Donnez les étapes de raisonnement avant de fournir la réponse finale sur la dernière ligne elle-même dans le format de \"Réponse:\". N'ajoutez rien d'autre que la réponse entière après \"Réponse:\".\n\n{input}",
    },
    Language {
        code: "ja",
        latin: false,
        answer_prefix: "答え",
        instruction: "この数学の問題を解いてください。最終的な答えを出す前に、推論の過程を記述してください。最後の行には \"答え:\" の形式で答えだけを記述し、\"答え:\" の後には整数の答え以外何も追加しないでください。\n\n{input}",
    },
    Language {
        code: "ru",
        latin: false,
        answer_prefix: "Ответ",
        instruction: "Решите эту математическую задачу. Объясните шаги рассуждения перед тем, как дать окончательный ответ в последней строке в формате \"Ответ:\". Не добавляйте ничего, кроме целочисленного ответа после \"Ответ:\".\n\n{input}",
    },
    Language {
        code: "sw",
        latin: true,
        answer_prefix: "Jibu",
        instruction: "Suluhisha tatizo hili la hesabu. Toa hatua za hoja kabla ya kutoa jibu la mwisho kwenye mstari wa mwisho peke yake katika muundo wa \"Jibu:\". Usiongeze chochote kingine isipokuwa jibu la nambari kamili baada ya \"Jibu:\".\n\n{input}",
    },
    Language {
        code: "te",
        latin: false,
        answer_prefix: "సమాధానం",
        instruction: "ఈ గణిత సమస్యను పరిష్కరించండి. చివరి సమాధానం ఇవ్వడానికి ముందు తార్కిక దశలను ఇవ్వండి. చివరి పంక్తిలో \"సమాధానం:\" ఆకృతిలో చివరి సమాధానాన్ని మాత్రమే ఇవ్వండి. \"సమాధానం:\" తరువాత పూర్ణాంక సమాధానం తప్ప మరేమీ చేర్చవద్దు.\n\n{input}",
    },
    Language {
        code: "th",
        latin: false,
        answer_prefix: "คำตอบ",
        instruction: "แก้ปัญหาคณิตศาสตร์ข้อนี้ แสดงขั้นตอนการให้เหตุผลก่อนให้คำตอบสุดท้ายในบรรทัดสุดท้ายโดยลำพังในรูปแบบ \"คำตอบ:\" อย่าเพิ่มสิ่งอื่นใดนอกจากคำตอบจำนวนเต็มหลัง \"คำตอบ:\"\n\n{input}",
    },
    Language {
        code: "zh",
        latin: false,
        answer_prefix: "答案",
        instruction: "解决这个数学问题。在给出最终答案之前给出推理步骤。最后一行单独以 \"答案:\" 的格式给出最终答案。\"答案:\" 后面除了整数答案不要添加任何其他内容。\n\n{input}",
    },
];

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").unwrap());

/// Extract the final numeric answer from a response: take the text after
/// the last occurrence of the localized prefix, strip commas, keep the
/// last number, drop a trailing dot. No prefix means no answer.
pub fn parse_answer(response: &str, answer_prefix: &str) -> String {
    if !response.contains(answer_prefix) {
        return String::new();
    }
    let tail = response
        .split(answer_prefix)
        .last()
        .unwrap_or_default()
        .trim()
        .replace(',', "");

    NUMBER_RE
        .find_iter(&tail)
        .last()
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .unwrap_or_default()
}

/// Numeric string equality with trailing-zero/dot normalization
pub fn score_answer(target: &str, prediction: &str) -> bool {
    let mut prediction = prediction.to_string();
    if prediction.contains('.') {
        prediction = prediction
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }
    target.replace(',', "") == prediction.replace(',', "")
}

/// Parse `question\tanswer` TSV rows, capped at `limit`
fn parse_tsv(text: &str, limit: usize) -> Result<Vec<(String, String)>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .take(limit)
        .map(|line| {
            line.split_once('\t')
                .map(|(question, answer)| (question.to_string(), answer.trim().to_string()))
                .ok_or_else(|| {
                    MgsmEvalError::DatasetError(format!("Malformed TSV row: {}", line))
                })
        })
        .collect()
}

/// The MGSM eval: per-language TSV datasets driven through a sampler
pub struct MgsmEval {
    num_examples_per_lang: usize,
    data_base_url: String,
    languages: Vec<&'static Language>,
    http: Client,
}

impl MgsmEval {
    pub fn new(options: &EvalOptions) -> Result<Self> {
        let languages = if options.languages.is_empty() {
            LANGUAGES.iter().collect()
        } else {
            options
                .languages
                .iter()
                .map(|code| {
                    LANGUAGES
                        .iter()
                        .find(|lang| lang.code == code)
                        .ok_or_else(|| {
                            MgsmEvalError::DatasetError(format!("Unknown MGSM language: {}", code))
                        })
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            num_examples_per_lang: options.num_examples_per_lang,
            data_base_url: options.data_base_url.trim_end_matches('/').to_string(),
            languages,
            http: Client::new(),
        })
    }

    async fn load_language(&self, language: &Language) -> Result<Vec<(String, String)>> {
        let url = format!("{}/mgsm_{}.tsv", self.data_base_url, language.code);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MgsmEvalError::DatasetError(format!(
                "Fetching {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        let text = response.text().await?;
        let rows = parse_tsv(&text, self.num_examples_per_lang)?;
        if rows.is_empty() {
            return Err(MgsmEvalError::DatasetError(format!(
                "No MGSM examples in {}",
                url
            )));
        }
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl Eval for MgsmEval {
    fn name(&self) -> &str {
        "mgsm"
    }

    async fn run(&self, sampler: &ChatCompletionSampler) -> Result<EvalResult> {
        let mut samples: Vec<ScoredSample> = Vec::new();
        let mut per_language: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total_correct = 0usize;
        let mut total = 0usize;

        for language in &self.languages {
            let rows = self.load_language(language).await?;
            let mut correct = 0usize;

            for (question, target) in &rows {
                let prompt = language.instruction.replace("{input}", question);
                let response = sampler.sample(&[ChatMessage::user(&prompt)]).await?;
                let extracted = parse_answer(&response, language.answer_prefix);
                let is_correct = score_answer(target, &extracted);

                if is_correct {
                    correct += 1;
                }
                samples.push(ScoredSample {
                    language: language.code.to_string(),
                    prompt,
                    response,
                    extracted_answer: extracted,
                    target: target.clone(),
                    correct: is_correct,
                });
            }

            let accuracy = correct as f64 / rows.len() as f64;
            info!(language = language.code, accuracy, "Finished language");
            per_language.insert(language.code, accuracy);
            total_correct += correct;
            total += rows.len();
        }

        let mut metrics: BTreeMap<String, f64> = per_language
            .iter()
            .map(|(code, accuracy)| (code.to_string(), *accuracy))
            .collect();

        for (key, latin) in [("latin", true), ("non_latin", false)] {
            let group: Vec<f64> = self
                .languages
                .iter()
                .filter(|lang| lang.latin == latin)
                .filter_map(|lang| per_language.get(lang.code).copied())
                .collect();
            if !group.is_empty() {
                metrics.insert(key.to_string(), group.iter().sum::<f64>() / group.len() as f64);
            }
        }

        let score = if total > 0 {
            total_correct as f64 / total as f64
        } else {
            0.0
        };

        Ok(EvalResult {
            score,
            metrics,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_simple() {
        assert_eq!(parse_answer("The total is six.\nAnswer: 6", "Answer"), "6");
    }

    #[test]
    fn test_parse_answer_takes_last_prefix() {
        let response = "Answer: 3 is wrong, let me redo it.\nAnswer: 42";
        assert_eq!(parse_answer(response, "Answer"), "42");
    }

    #[test]
    fn test_parse_answer_strips_commas_and_trailing_dot() {
        assert_eq!(parse_answer("Answer: 1,234.", "Answer"), "1234");
    }

    #[test]
    fn test_parse_answer_keeps_decimals() {
        assert_eq!(parse_answer("Answer: 2.75", "Answer"), "2.75");
    }

    #[test]
    fn test_parse_answer_missing_prefix() {
        assert_eq!(parse_answer("I don't know", "Answer"), "");
    }

    #[test]
    fn test_parse_answer_no_number_after_prefix() {
        assert_eq!(parse_answer("Answer: unsure", "Answer"), "");
    }

    #[test]
    fn test_parse_answer_localized_prefix() {
        assert_eq!(parse_answer("答えは以下の通りです。答え: 18", "答え"), "18");
    }

    #[test]
    fn test_score_answer_exact() {
        assert!(score_answer("42", "42"));
        assert!(!score_answer("42", "43"));
        assert!(!score_answer("42", ""));
    }

    #[test]
    fn test_score_answer_trailing_zeros() {
        assert!(score_answer("5", "5.0"));
        assert!(score_answer("5", "5.00"));
        assert!(!score_answer("5", "5.01"));
    }

    #[test]
    fn test_score_answer_comma_target() {
        assert!(score_answer("1,234", "1234"));
    }

    #[test]
    fn test_parse_tsv() {
        let rows = parse_tsv("q one\t11\nq two\t22\n\nq three\t33\n", 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("q one".to_string(), "11".to_string()));
        assert_eq!(rows[1], ("q two".to_string(), "22".to_string()));
    }

    #[test]
    fn test_parse_tsv_malformed_row() {
        assert!(parse_tsv("no tab here", 10).is_err());
    }

    #[test]
    fn test_language_table_complete() {
        assert_eq!(LANGUAGES.len(), 11);
        let latin: Vec<&str> = LANGUAGES
            .iter()
            .filter(|l| l.latin)
            .map(|l| l.code)
            .collect();
        assert_eq!(latin, vec!["de", "en", "es", "fr", "sw"]);
        for language in LANGUAGES {
            assert!(language.instruction.contains("{input}"));
            assert!(language.instruction.contains(language.answer_prefix));
        }
    }

    #[test]
    fn test_instruction_formatting() {
        let en = LANGUAGES.iter().find(|l| l.code == "en").unwrap();
        let prompt = en.instruction.replace("{input}", "What is 2+2?");
        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.ends_with("What is 2+2?"));
    }
}
