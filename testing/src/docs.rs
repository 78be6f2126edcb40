// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Sample document type used across fixture contracts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use trellis_routing::{ValidateBody, Violation};

/// Document kind of [`SampleDocument`] in query filters.
pub const SAMPLE_DOCUMENT_KIND: &str = "demo:sample-document";

/// Simple stored document for testing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDocument {
    /// Canonical path of the stored document, assigned on insert.
    #[serde(default)]
    pub self_link: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required: String,
    #[serde(default)]
    pub sorted_counter: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub key_values: HashMap<String, String>,
}

impl SampleDocument {
    pub fn named(name: impl Into<String>, counter: i64) -> Self {
        Self {
            name: name.into(),
            required: format!("required for {counter}"),
            sorted_counter: counter,
            ..Self::default()
        }
    }
}

impl ValidateBody for SampleDocument {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.name.is_empty() {
            violations.push(Violation::new("name", "must not be empty"));
        }
        if self.required.is_empty() {
            violations.push(Violation::new("required", "must not be empty"));
        }
        violations
    }
}
