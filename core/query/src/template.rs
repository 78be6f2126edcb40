// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative query templates
//!
//! A template is a filter expression with `:name` placeholders, declared
//! once next to a contract and expanded per call from named arguments.
//! Expansion always prepends a document-kind clause, so a template only
//! ever matches documents of its declared kind. The argument name
//! `limit` is reserved: it overrides the template's page size or result
//! cap instead of substituting into the filter.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use trellis_runtime::ServiceFault;

use crate::client::DocumentQueryClient;
use crate::page::Page;
use crate::stream::PagedStream;
use crate::task::{DEFAULT_PAGE_LIMIT, DEFAULT_RESULT_LIMIT, OrderBy, OrderKind, QueryTask};

/// Argument name reserved for limit overrides.
pub const LIMIT_ARG: &str = "limit";

/// Template for a paged query against one document kind.
#[derive(Debug, Clone)]
pub struct PagedQueryTemplate {
    document_kind: &'static str,
    filter: &'static str,
    page_size: u32,
    order_by: Option<OrderBy>,
}

impl PagedQueryTemplate {
    pub fn new(document_kind: &'static str, filter: &'static str) -> Self {
        Self { document_kind, filter, page_size: DEFAULT_PAGE_LIMIT, order_by: None }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>, kind: OrderKind) -> Self {
        self.order_by = Some(OrderBy { field: field.into(), kind });
        self
    }

    /// The task this template expands to for the given arguments.
    pub fn to_task(&self, args: &[(&str, Value)]) -> QueryTask {
        let criteria = filter_criteria(self.document_kind, self.filter, args);
        let page_size = limit_override(args).unwrap_or(self.page_size);
        let mut task = QueryTask::paged(criteria, page_size);
        task.spec.order_by = self.order_by.clone();
        task
    }

    /// Expand and execute, streaming the result pages.
    pub fn run_paged<D>(&self, client: &DocumentQueryClient, args: &[(&str, Value)]) -> PagedStream<D>
    where
        D: DeserializeOwned + Send + 'static,
    {
        PagedStream::execute(client.clone(), self.to_task(args))
    }
}

/// Template for a one-shot query against one document kind.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    document_kind: &'static str,
    filter: &'static str,
    top: u32,
    order_by: Option<OrderBy>,
}

impl QueryTemplate {
    pub fn new(document_kind: &'static str, filter: &'static str) -> Self {
        Self { document_kind, filter, top: DEFAULT_RESULT_LIMIT, order_by: None }
    }

    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn with_order_by(mut self, field: impl Into<String>, kind: OrderKind) -> Self {
        self.order_by = Some(OrderBy { field: field.into(), kind });
        self
    }

    pub fn to_task(&self, args: &[(&str, Value)]) -> QueryTask {
        let criteria = filter_criteria(self.document_kind, self.filter, args);
        let top = limit_override(args).unwrap_or(self.top);
        let mut task = QueryTask::direct(criteria).with_top(top);
        task.spec.order_by = self.order_by.clone();
        task
    }

    /// Expand, execute and return the executed task.
    pub async fn run_task(
        &self,
        client: &DocumentQueryClient,
        args: &[(&str, Value)],
    ) -> Result<QueryTask, ServiceFault> {
        client.query(self.to_task(args)).await
    }

    /// Expand, execute and decode the homogeneous result documents.
    pub async fn run<D>(
        &self,
        client: &DocumentQueryClient,
        args: &[(&str, Value)],
    ) -> Result<Vec<D>, ServiceFault>
    where
        D: DeserializeOwned,
    {
        let executed = self.run_task(client, args).await?;
        Page::new(client.clone(), executed).documents()
    }
}

/// Expand a template filter: prepend the document-kind clause, then
/// substitute each `:name` placeholder with its rendered argument.
/// Longer names substitute first so `:id` never clobbers `:identifier`.
pub fn filter_criteria(document_kind: &str, filter: &str, args: &[(&str, Value)]) -> String {
    let mut criteria = format!("documentKind eq {document_kind}");
    if !filter.is_empty() {
        let mut expanded = filter.to_string();
        let mut by_length: Vec<&(&str, Value)> =
            args.iter().filter(|(name, _)| *name != LIMIT_ARG).collect();
        by_length.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
        for (name, value) in by_length {
            expanded = expanded.replace(&format!(":{name}"), &render(value));
        }
        criteria.push_str(" and (");
        criteria.push_str(&expanded);
        criteria.push(')');
    }
    debug!(%criteria, "expanded filter criteria");
    criteria
}

fn limit_override(args: &[(&str, Value)]) -> Option<u32> {
    args.iter()
        .find(|(name, _)| *name == LIMIT_ARG)
        .and_then(|(_, value)| value.as_u64())
        .map(|v| v as u32)
}

/// Render an argument for filter substitution. Strings are single-quoted
/// with embedded quotes doubled; other values use their JSON form.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_criteria_expansion() {
        let criteria = filter_criteria(
            "demo:document",
            "name eq :name and counter lt :count",
            &[("name", json!("Name_5")), ("count", json!(500))],
        );
        assert_eq!(
            criteria,
            "documentKind eq demo:document and (name eq 'Name_5' and counter lt 500)"
        );
    }

    #[test]
    fn test_empty_filter_is_kind_only() {
        assert_eq!(filter_criteria("demo:document", "", &[]), "documentKind eq demo:document");
    }

    #[test]
    fn test_longer_names_substitute_first() {
        let criteria = filter_criteria(
            "k",
            "id eq :id and identifier eq :identifier",
            &[("id", json!(1)), ("identifier", json!(2))],
        );
        assert_eq!(criteria, "documentKind eq k and (id eq 1 and identifier eq 2)");
    }

    #[test]
    fn test_quotes_are_doubled() {
        assert_eq!(render(&json!("it's")), "'it''s'");
        assert_eq!(render(&json!(true)), "true");
    }

    #[test]
    fn test_limit_argument_overrides_page_size() {
        let template = PagedQueryTemplate::new("k", "name eq :name").with_page_size(4);
        let task = template.to_task(&[("name", json!("a")), ("limit", json!(2))]);
        assert_eq!(task.spec.result_limit, Some(2));
        assert!(!task.spec.filter.contains("limit"));

        let task = template.to_task(&[("name", json!("a"))]);
        assert_eq!(task.spec.result_limit, Some(4));
    }

    #[test]
    fn test_one_shot_task_shape() {
        let template = QueryTemplate::new("k", "name eq :name").with_top(100);
        let task = template.to_task(&[("name", json!("a"))]);
        assert_eq!(task.spec.top, Some(100));
        assert_eq!(task.spec.result_limit, None);
        assert!(!task.spec.count_only);
    }
}
