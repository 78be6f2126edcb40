// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Service fault model and its wire representation
//!
//! A failed request carries a structured error body so that callers can
//! recover the application error code, per-request context and the cause
//! chain instead of scraping a message string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Application error code applied when a fault does not set its own.
pub const DEFAULT_ERROR_CODE: i32 = 55056;

/// Application error code reserved for faults raised by the runtime itself.
pub const INTERNAL_ERROR_CODE: i32 = 55055;

/// Well-known keys used when decorating a fault's context map with request
/// metadata.
pub mod context_keys {
    pub const URI: &str = "uri";
    pub const ACTION: &str = "action";
    pub const RESPONSE_HEADERS: &str = "responseHeaders";
    pub const COOKIES: &str = "cookies";
    pub const RETRY_COUNT: &str = "retryCount";
    pub const RETRIES_REMAINING: &str = "retriesRemaining";
    pub const CONTEXT_ID: &str = "contextId";
    pub const EXPIRATION_MICROS: &str = "expirationMicros";
    pub const REFERER: &str = "referer";
}

/// Typed service error: HTTP-style status, application error code, free-form
/// context entries and an optional cause chain.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (status {status_code}, error code {error_code})")]
pub struct ServiceFault {
    pub message: String,
    pub status_code: u16,
    pub error_code: i32,
    pub context: BTreeMap<String, Value>,
    pub cause: Option<Box<ServiceFault>>,
}

impl ServiceFault {
    /// Fault with the default application error code and status 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 500,
            error_code: DEFAULT_ERROR_CODE,
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Fault raised by the runtime itself (internal error code).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_error_code(INTERNAL_ERROR_CODE)
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = error_code;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_cause(mut self, cause: ServiceFault) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Context entry for a key, when present.
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

/// Wire form of a [`ServiceFault`], serialized into the response body of a
/// failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
    pub error_code: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorBody>>,
}

impl ErrorBody {
    pub fn from_fault(fault: &ServiceFault) -> Self {
        Self {
            message: fault.message.clone(),
            status_code: fault.status_code,
            error_code: fault.error_code,
            context: fault.context.clone(),
            original_type: None,
            cause: fault.cause.as_deref().map(|c| Box::new(Self::from_fault(c))),
        }
    }

    pub fn into_fault(self) -> ServiceFault {
        ServiceFault {
            message: self.message,
            status_code: self.status_code,
            error_code: self.error_code,
            context: self.context,
            cause: self.cause.map(|c| Box::new(c.into_fault())),
        }
    }

    /// Try to read a structured error body out of a response body. Bodies
    /// missing the mandatory fields are not structured errors.
    pub fn decode(body: &Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }
}
