// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Query task wire model
//!
//! A query task carries a filter specification on the way in and, once
//! executed, a result set on the way out. Paged tasks return their first
//! page empty with a link to the first populated page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result cap applied to one-shot queries that do not pick their own top.
pub const DEFAULT_RESULT_LIMIT: u32 = 9999;

/// Upper bound on the page size a task may request.
pub const DEFAULT_PAGE_LIMIT: u32 = 10_000;

/// Sort direction of an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

/// Ordering clause of a query spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field: String,
    pub kind: OrderKind,
}

/// What to match and how to shape the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(default)]
    pub filter: String,
    /// Page size; presence makes the task paged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_limit: Option<u32>,
    /// One-shot result cap for non-paged tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub count_only: bool,
}

/// Result set attached to an executed task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    #[serde(default)]
    pub documents: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTask {
    #[serde(default)]
    pub spec: QuerySpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<QueryResults>,
}

impl QueryTask {
    /// One-shot task: all matches up to `top` in a single result set.
    pub fn direct(filter: impl Into<String>) -> Self {
        Self {
            spec: QuerySpec {
                filter: filter.into(),
                top: Some(DEFAULT_RESULT_LIMIT),
                ..QuerySpec::default()
            },
            results: None,
        }
    }

    /// Paged task: the executed task links to pages of `page_size` documents.
    pub fn paged(filter: impl Into<String>, page_size: u32) -> Self {
        Self {
            spec: QuerySpec {
                filter: filter.into(),
                result_limit: Some(page_size.min(DEFAULT_PAGE_LIMIT)),
                ..QuerySpec::default()
            },
            results: None,
        }
    }

    /// Count-only task: no documents, only the matching document count.
    pub fn counting(filter: impl Into<String>) -> Self {
        Self {
            spec: QuerySpec {
                filter: filter.into(),
                count_only: true,
                ..QuerySpec::default()
            },
            results: None,
        }
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.spec.top = Some(top);
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>, kind: OrderKind) -> Self {
        self.spec.order_by = Some(OrderBy { field: field.into(), kind });
        self
    }

    pub fn filter(&self) -> &str {
        &self.spec.filter
    }

    pub fn next_page_link(&self) -> Option<&str> {
        self.results.as_ref().and_then(|r| r.next_page_link.as_deref())
    }

    pub fn prev_page_link(&self) -> Option<&str> {
        self.results.as_ref().and_then(|r| r.prev_page_link.as_deref())
    }
}
