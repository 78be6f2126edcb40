// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Body validation at the dispatch boundary
//!
//! Body parameters may carry a validation hook. The hook decodes the raw
//! JSON body into its typed form and collects constraint violations; any
//! violation fails the request with status 400 before the target method is
//! invoked.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context key under which violations are reported in the error body.
pub const VIOLATIONS_KEY: &str = "violations";

/// One failed constraint on a request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Field path within the body, `$` for the body itself.
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_value: Option<Value>,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into(), invalid_value: None }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.invalid_value = Some(value);
        self
    }
}

/// Constraints a body type checks on itself after decoding.
pub trait ValidateBody {
    fn validate(&self) -> Vec<Violation> {
        Vec::new()
    }
}

/// Validation hook for a typed body: a decode failure is itself a
/// violation, otherwise the type's own constraints run.
pub fn decode_and_validate<T: DeserializeOwned + ValidateBody>(body: &Value) -> Vec<Violation> {
    match serde_json::from_value::<T>(body.clone()) {
        Ok(typed) => typed.validate(),
        Err(e) => vec![Violation::new("$", format!("malformed body: {e}"))],
    }
}
