use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::report::{AnalysisResult, Report};
use crate::schema::SmellSchema;

static GREEDY_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("greedy span pattern is valid"));
static NON_GREEDY_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("non-greedy span pattern is valid"));

/// How an embedded object is located when the whole reply is not JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStrategy {
    /// First `{` to the last `}` of the reply.
    Greedy,
    /// First `{` to the first `}` following it.
    NonGreedy,
    /// Greedy span first, then the non-greedy span if the greedy one does not parse.
    #[default]
    GreedyThenNonGreedy,
}

/// Policy applied to values of recognized keys that are not JSON booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Accept `"true"`/`"false"` strings (case-insensitive) and numbers (`n != 0`).
    #[default]
    Lenient,
    /// Only JSON booleans are accepted; anything else leaves the key `false`.
    Strict,
}

/// Tunables for [`ResponseNormalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    pub strategy: SpanStrategy,
    pub coercion: CoercionPolicy,
    /// Retry failed spans with repaired strings/braces and JSON5 syntax.
    pub relaxed_syntax: bool,
}

/// Stateless extractor shared by the single-request and batch pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer {
    options: ExtractionOptions,
}

impl ResponseNormalizer {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ExtractionOptions {
        self.options
    }

    /// Reconcile a raw reply against `schema`. Never fails: any input, including
    /// empty text, yields a report carrying every schema key.
    pub fn extract(&self, raw: &str, schema: &SmellSchema) -> AnalysisResult {
        let candidate = self.candidate(raw).unwrap_or_default();
        let mut report = Report::all_false(schema);
        let mut matched = 0usize;

        for key in schema.iter() {
            let Some(value) = candidate.get(key) else {
                continue;
            };
            match coerce(value, self.options.coercion) {
                Some(flag) => {
                    report.set(key, flag);
                    matched += 1;
                }
                None => debug!(%key, %value, "rejected non-boolean smell value"),
            }
        }

        let contains_structured_data = !candidate.is_empty();
        trace!(
            candidate_keys = candidate.len(),
            matched,
            contains_structured_data,
            "normalized model reply"
        );
        AnalysisResult::new(raw.to_string(), report, contains_structured_data)
    }

    fn candidate(&self, raw: &str) -> Option<Map<String, Value>> {
        if let Some(object) = self.parse_object(raw) {
            trace!("reply parsed as a whole");
            return Some(object);
        }

        let greedy = GREEDY_SPAN.find(raw).map(|m| m.as_str());
        let non_greedy = NON_GREEDY_SPAN.find(raw).map(|m| m.as_str());
        let spans: Vec<&str> = match self.options.strategy {
            SpanStrategy::Greedy => greedy.into_iter().collect(),
            SpanStrategy::NonGreedy => non_greedy.into_iter().collect(),
            SpanStrategy::GreedyThenNonGreedy => {
                let mut spans: Vec<&str> = greedy.into_iter().collect();
                if let Some(narrow) = non_greedy {
                    if greedy != Some(narrow) {
                        spans.push(narrow);
                    }
                }
                spans
            }
        };

        spans.into_iter().find_map(|span| {
            let parsed = self.parse_object(span);
            if parsed.is_some() {
                trace!(span_len = span.len(), "reply parsed from embedded span");
            }
            parsed
        })
    }

    fn parse_object(&self, text: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => return into_object(value),
            Err(_) if !self.options.relaxed_syntax => return None,
            Err(_) => {}
        }

        let repaired = repair_json(text);
        if repaired != text {
            if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                return into_object(value);
            }
        }
        json5::from_str::<Value>(&repaired)
            .ok()
            .and_then(into_object)
    }
}

/// Normalize `raw` against `schema` with default options.
pub fn extract_report(raw: &str, schema: &SmellSchema) -> AnalysisResult {
    ResponseNormalizer::default().extract(raw, schema)
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn coerce(value: &Value, policy: CoercionPolicy) -> Option<bool> {
    match (value, policy) {
        (Value::Bool(flag), _) => Some(*flag),
        (_, CoercionPolicy::Strict) => None,
        (Value::String(text), CoercionPolicy::Lenient) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("true") {
                Some(true)
            } else if text.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        (Value::Number(number), CoercionPolicy::Lenient) => number.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

/// Escape raw newlines inside strings and close anything left open.
fn repair_json(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len() + 4);
    let mut in_string = false;
    let mut escape = false;

    for ch in payload.chars() {
        if in_string {
            if escape {
                result.push(ch);
                escape = false;
                continue;
            }
            match ch {
                '\\' => {
                    result.push(ch);
                    escape = true;
                }
                '"' => {
                    result.push(ch);
                    in_string = false;
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                _ => result.push(ch),
            }
        } else {
            result.push(ch);
            if ch == '"' {
                in_string = true;
            }
        }
    }

    if in_string {
        result.push('"');
    }

    let open_braces = result.chars().filter(|&c| c == '{').count();
    let close_braces = result.chars().filter(|&c| c == '}').count();
    for _ in close_braces..open_braces {
        result.push('}');
    }

    result
}
