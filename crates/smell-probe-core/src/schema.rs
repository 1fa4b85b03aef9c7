use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smell keys requested from the model, in report order.
pub const DEFAULT_SMELL_KEYS: &[&str] = &[
    "data_class_smell",
    "large_class_smell",
    "lazy_class_smell",
    "open_close_principle_violation",
    "speculative_generality_smell",
    "alternative_classes_with_different_interfaces_smell",
    "interface_segregation_principle_violation",
    "middle_man_smell",
    "long_method_smell",
    "long_parameter_list_smell",
    "switch_statements_smell",
    "comments_smell",
    "data_clumps_smell",
    "dead_code_smell",
    "divergent_change_smell",
    "primitive_obsession_smell",
    "temporary_fields_smell",
    "single_responsability_principle_violation",
    "parallel_inheritance_hierarchies_smell",
    "refused_bequest_smell",
    "dependency_inversion_principle_violation",
    "liskov_substitution_principle_violation",
    "duplicate_code_smell",
    "feature_envy_smell",
    "inappropriate_intimacy_smell",
    "message_chains_smell",
    "shotgun_surgery_smell",
    "demeter_law_violation",
    "tell_dont_ask_principle_violation",
];

static DEFAULT_SCHEMA: Lazy<SmellSchema> = Lazy::new(|| SmellSchema {
    keys: DEFAULT_SMELL_KEYS.iter().map(|key| key.to_string()).collect(),
});

/// Ordered set of boolean findings every report must carry.
///
/// Keys are unique lowercase identifiers (`[a-z_][a-z0-9_]*`); the result
/// store uses them verbatim as column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SmellSchema {
    keys: Vec<String>,
}

impl SmellSchema {
    /// Build a schema from an ordered key list, validating its invariants.
    pub fn new<I, S>(keys: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !is_identifier(key) {
                return Err(SchemaError::InvalidKey { key: key.clone() });
            }
            if !seen.insert(key.as_str()) {
                return Err(SchemaError::DuplicateKey { key: key.clone() });
            }
        }
        Ok(Self { keys })
    }

    /// Shared process-wide schema built from [`DEFAULT_SMELL_KEYS`].
    pub fn default_schema() -> &'static SmellSchema {
        &DEFAULT_SCHEMA
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|candidate| candidate == key)
    }
}

impl<'de> Deserialize<'de> for SmellSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let keys = Vec::<String>::deserialize(deserializer)?;
        SmellSchema::new(keys).map_err(serde::de::Error::custom)
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Errors emitted while building a smell schema.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    #[error("smell schema must contain at least one key")]
    Empty,
    #[error("smell key `{key}` must match [a-z_][a-z0-9_]*")]
    InvalidKey { key: String },
    #[error("smell key `{key}` is listed more than once")]
    DuplicateKey { key: String },
}
