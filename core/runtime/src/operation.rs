// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Request envelope shared between services and clients
//!
//! An [`Operation`] is a cloneable handle over shared request state: verb,
//! URI, headers, cookies, directives, body and completion callbacks. The
//! party that created the request installs a completion; the party that
//! handles it calls [`Operation::complete`] or [`Operation::fail`] exactly
//! once. Completions nest: a nested callback fires first and continues the
//! chain by completing (or failing) the operation again.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RuntimeError;
use crate::fault::{ErrorBody, ServiceFault};
use crate::uri;

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "GET",
            Action::Post => "POST",
            Action::Put => "PUT",
            Action::Patch => "PATCH",
            Action::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Action::Get),
            "POST" => Ok(Action::Post),
            "PUT" => Ok(Action::Put),
            "PATCH" => Ok(Action::Patch),
            "DELETE" => Ok(Action::Delete),
            other => Err(RuntimeError::UnknownAction(other.to_string())),
        }
    }
}

/// Completion callback. Receives the operation and the failure, if any.
type Completion = Box<dyn FnOnce(&Operation, Option<&ServiceFault>) + Send>;

struct Inner {
    action: Action,
    uri: String,
    request_headers: HashMap<String, String>,
    response_headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    pragma_directives: Vec<String>,
    body: Option<Value>,
    status_code: u16,
    referer: String,
    context_id: Option<String>,
    expiration_micros: Option<u64>,
    retry_count: u32,
    retries_remaining: u32,
    // Completion stack: the last pushed callback fires first.
    completions: Vec<Completion>,
    completed: bool,
}

/// Cloneable handle to a single request. All clones observe the same state.
#[derive(Clone)]
pub struct Operation {
    inner: Arc<Mutex<Inner>>,
    created: Instant,
}

impl Operation {
    pub fn new(action: Action, uri: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                action,
                uri: uri.into(),
                request_headers: HashMap::new(),
                response_headers: HashMap::new(),
                cookies: HashMap::new(),
                pragma_directives: Vec::new(),
                body: None,
                status_code: 200,
                referer: String::new(),
                context_id: None,
                expiration_micros: None,
                retry_count: 0,
                retries_remaining: 0,
                completions: Vec::new(),
                completed: false,
            })),
            created: Instant::now(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Action::Get, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Action::Post, uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Action::Put, uri)
    }

    pub fn patch(uri: impl Into<String>) -> Self {
        Self::new(Action::Patch, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Action::Delete, uri)
    }

    pub fn action(&self) -> Action {
        self.inner.lock().action
    }

    pub fn uri(&self) -> String {
        self.inner.lock().uri.clone()
    }

    pub fn set_uri(&self, uri: impl Into<String>) -> &Self {
        self.inner.lock().uri = uri.into();
        self
    }

    /// Path portion of the URI, without the query string.
    pub fn path(&self) -> String {
        let inner = self.inner.lock();
        uri::split_query(&inner.uri).0.to_string()
    }

    /// Raw query string, when the URI carries one.
    pub fn query(&self) -> Option<String> {
        let inner = self.inner.lock();
        uri::split_query(&inner.uri).1.map(str::to_string)
    }

    pub fn body(&self) -> Option<Value> {
        self.inner.lock().body.clone()
    }

    pub fn has_body(&self) -> bool {
        self.inner.lock().body.is_some()
    }

    pub fn set_body(&self, body: Value) -> &Self {
        self.inner.lock().body = Some(body);
        self
    }

    /// Serialize a typed value into the body.
    pub fn set_body_from<T: Serialize>(&self, value: &T) -> Result<&Self, RuntimeError> {
        let body = serde_json::to_value(value).map_err(RuntimeError::BodyEncode)?;
        self.inner.lock().body = Some(body);
        Ok(self)
    }

    /// Typed view of the body.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, RuntimeError> {
        let body = self.body().ok_or(RuntimeError::MissingBody)?;
        serde_json::from_value(body).map_err(RuntimeError::BodyDecode)
    }

    pub fn add_request_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.inner.lock().request_headers.insert(name.into(), value.into());
        self
    }

    pub fn request_header(&self, name: &str) -> Option<String> {
        self.inner.lock().request_headers.get(name).cloned()
    }

    pub fn add_response_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.inner.lock().response_headers.insert(name.into(), value.into());
        self
    }

    pub fn response_headers(&self) -> HashMap<String, String> {
        self.inner.lock().response_headers.clone()
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.inner.lock().cookies.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner.lock().cookies.get(name).cloned()
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        self.inner.lock().cookies.clone()
    }

    pub fn add_pragma_directive(&self, directive: impl Into<String>) -> &Self {
        self.inner.lock().pragma_directives.push(directive.into());
        self
    }

    pub fn has_pragma_directive(&self, directive: &str) -> bool {
        self.inner.lock().pragma_directives.iter().any(|d| d == directive)
    }

    pub fn pragma_directives(&self) -> Vec<String> {
        self.inner.lock().pragma_directives.clone()
    }

    pub fn status_code(&self) -> u16 {
        self.inner.lock().status_code
    }

    pub fn set_status_code(&self, status_code: u16) -> &Self {
        self.inner.lock().status_code = status_code;
        self
    }

    pub fn referer(&self) -> String {
        self.inner.lock().referer.clone()
    }

    pub fn set_referer(&self, referer: impl Into<String>) -> &Self {
        self.inner.lock().referer = referer.into();
        self
    }

    pub fn context_id(&self) -> Option<String> {
        self.inner.lock().context_id.clone()
    }

    pub fn set_context_id(&self, context_id: impl Into<String>) -> &Self {
        self.inner.lock().context_id = Some(context_id.into());
        self
    }

    pub fn expiration_micros(&self) -> Option<u64> {
        self.inner.lock().expiration_micros
    }

    pub fn set_expiration_micros(&self, micros: u64) -> &Self {
        self.inner.lock().expiration_micros = Some(micros);
        self
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.lock().retry_count
    }

    pub fn retries_remaining(&self) -> u32 {
        self.inner.lock().retries_remaining
    }

    pub fn set_retry_tracking(&self, retry_count: u32, retries_remaining: u32) -> &Self {
        let mut inner = self.inner.lock();
        inner.retry_count = retry_count;
        inner.retries_remaining = retries_remaining;
        self
    }

    /// Time since the operation was created.
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }

    /// Install the base completion callback.
    pub fn set_completion(
        &self,
        completion: impl FnOnce(&Operation, Option<&ServiceFault>) + Send + 'static,
    ) -> &Self {
        self.inner.lock().completions.push(Box::new(completion));
        self
    }

    /// Push a callback that fires before the currently installed one. The
    /// nested callback continues the chain by calling [`Operation::complete`]
    /// or [`Operation::fail`] again.
    pub fn nest_completion(
        &self,
        completion: impl FnOnce(&Operation, Option<&ServiceFault>) + Send + 'static,
    ) -> &Self {
        self.inner.lock().completions.push(Box::new(completion));
        self
    }

    /// True once the last completion callback has fired.
    pub fn is_completed(&self) -> bool {
        self.inner.lock().completed
    }

    /// Complete the operation successfully. Pops and invokes the top
    /// completion callback; a no-op once the stack is exhausted.
    pub fn complete(&self) {
        self.finish(None);
    }

    /// Fail the operation: records the fault's status code, serializes the
    /// structured error body, then invokes the top completion callback.
    pub fn fail(&self, fault: ServiceFault) {
        {
            let mut inner = self.inner.lock();
            inner.status_code = fault.status_code;
            inner.body = serde_json::to_value(ErrorBody::from_fault(&fault)).ok();
        }
        self.finish(Some(fault));
    }

    pub fn fail_with_status(&self, status_code: u16, message: impl Into<String>) {
        self.fail(ServiceFault::new(message).with_status(status_code));
    }

    fn finish(&self, failure: Option<ServiceFault>) {
        // Take the callback out under the lock, invoke it outside so that
        // the callback can touch the operation.
        let callback = {
            let mut inner = self.inner.lock();
            let callback = inner.completions.pop();
            if inner.completions.is_empty() {
                inner.completed = true;
            }
            callback
        };
        if let Some(callback) = callback {
            callback(self, failure.as_ref());
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Operation")
            .field("action", &inner.action)
            .field("uri", &inner.uri)
            .field("status_code", &inner.status_code)
            .field("completed", &inner.completed)
            .finish()
    }
}
