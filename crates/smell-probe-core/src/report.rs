use std::fmt::Write;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::schema::SmellSchema;

/// Total mapping from every schema key to a boolean verdict, in schema order.
///
/// A report can only be created through [`Report::all_false`], and
/// [`Report::set`] refuses keys outside the schema, so the key set always
/// equals the schema it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    entries: Vec<(String, bool)>,
}

impl Report {
    /// Report with every schema key set to `false`.
    pub fn all_false(schema: &SmellSchema) -> Self {
        Self {
            entries: schema.iter().map(|key| (key.to_string(), false)).collect(),
        }
    }

    /// Set the verdict for `key`. Returns `false` when the key is not part of the schema.
    pub fn set(&mut self, key: &str, value: bool) -> bool {
        match self.entries.iter_mut().find(|(name, _)| name == key) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    /// Keys whose verdict is `true`, in schema order.
    pub fn flagged(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, value)| *value).map(|(name, _)| name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Report {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Outcome of normalizing one raw model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    raw_reply_text: String,
    report: Report,
    contains_structured_data: bool,
}

impl AnalysisResult {
    pub(crate) fn new(raw_reply_text: String, report: Report, contains_structured_data: bool) -> Self {
        Self {
            raw_reply_text,
            report,
            contains_structured_data,
        }
    }

    pub fn raw_reply_text(&self) -> &str {
        &self.raw_reply_text
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Whether any parseable structured object was found in the reply.
    pub fn contains_structured_data(&self) -> bool {
        self.contains_structured_data
    }

    pub fn into_parts(self) -> (String, Report, bool) {
        (
            self.raw_reply_text,
            self.report,
            self.contains_structured_data,
        )
    }
}

/// Format styles supported when printing an analysis result.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a printable report from an `AnalysisResult` using the desired format.
pub fn render_result(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonResult::from(result))?),
    }
}

fn render_human(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut out = String::new();
    let report = result.report();
    let flagged: Vec<_> = report.flagged().collect();
    writeln!(
        out,
        "Smells flagged: {} of {}",
        flagged.len(),
        report.len()
    )?;
    writeln!(
        out,
        "Structured data found: {}",
        if result.contains_structured_data() {
            "yes"
        } else {
            "no"
        }
    )?;
    writeln!(out)?;

    if flagged.is_empty() {
        writeln!(out, "No smells reported.")?;
    } else {
        writeln!(out, "Flagged:")?;
        for name in flagged {
            writeln!(out, "  - {name}")?;
        }
    }

    if !result.contains_structured_data() {
        writeln!(out)?;
        writeln!(out, "Raw reply:")?;
        writeln!(out, "  {}", sanitize_excerpt(result.raw_reply_text()))?;
    }

    Ok(out)
}

fn sanitize_excerpt(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonResult<'a> {
    result: &'a Report,
    raw_response: &'a str,
    contains_json: bool,
}

impl<'a> From<&'a AnalysisResult> for JsonResult<'a> {
    fn from(result: &'a AnalysisResult) -> Self {
        Self {
            result: result.report(),
            raw_response: result.raw_reply_text(),
            contains_json: result.contains_structured_data(),
        }
    }
}
