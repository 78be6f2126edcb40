// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-memory document store with routed service facades
//!
//! Backs the sample document contract and the query contract for tests.
//! Paged query execution materializes the page chain up front, one link
//! per chunk, and serves page fetches from that chain while counting
//! them so tests can assert how far a traversal actually reached.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::warn;

use trellis_query::{QUERY_SERVICE_PATH, QueryResults, QuerySpec, QueryTask, contract_specs};
use trellis_routing::{
    ArgValue, HandlerReply, ParamSpec, ParamType, ReturnSpec, RouteSpec, Router, RouterBuildError,
    ShapeSpec,
};
use trellis_runtime::{ServiceFault, ServiceOptions};

use crate::contract::{SAMPLE_SERVICE_PATH, sample_contract};
use crate::docs::{SAMPLE_DOCUMENT_KIND, SampleDocument};

/// Application error code reported for missing documents.
pub const NOT_FOUND_ERROR_CODE: i32 = 1234;

struct StoreInner {
    documents: RwLock<BTreeMap<String, SampleDocument>>,
    pages: RwLock<HashMap<String, QueryTask>>,
    next_id: AtomicUsize,
    next_page: AtomicUsize,
    page_fetches: AtomicUsize,
}

/// Shared in-memory document store.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                documents: RwLock::new(BTreeMap::new()),
                pages: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                next_page: AtomicUsize::new(0),
                page_fetches: AtomicUsize::new(0),
            }),
        }
    }

    /// Store a document, assigning its id and self link.
    pub fn insert(&self, mut doc: SampleDocument) -> SampleDocument {
        let id = format!("doc-{:04}", self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        doc.self_link = format!("{SAMPLE_SERVICE_PATH}/documents/{id}");
        self.inner.documents.write().insert(id, doc.clone());
        doc
    }

    pub fn get(&self, id: &str) -> Option<SampleDocument> {
        self.inner.documents.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<SampleDocument> {
        self.inner.documents.write().remove(id)
    }

    pub fn rename(&self, id: &str, name: &str) -> Option<SampleDocument> {
        let mut documents = self.inner.documents.write();
        let doc = documents.get_mut(id)?;
        doc.name = name.to_string();
        Some(doc.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.documents.read().is_empty()
    }

    /// First `limit` documents in id order.
    pub fn list(&self, limit: usize) -> Vec<SampleDocument> {
        self.inner.documents.read().values().take(limit).cloned().collect()
    }

    /// Number of page fetches served so far.
    pub fn page_fetches(&self) -> usize {
        self.inner.page_fetches.load(Ordering::Relaxed)
    }

    /// Execute a query task against the store, attaching results. Paged
    /// tasks come back with an empty first page linking into a
    /// materialized page chain.
    pub fn execute(&self, mut task: QueryTask) -> Result<QueryTask, ServiceFault> {
        let matches = self.matching(&task.spec)?;
        let total = matches.len() as u64;

        if task.spec.count_only {
            task.results =
                Some(QueryResults { document_count: Some(total), ..QueryResults::default() });
            return Ok(task);
        }

        if let Some(page_size) = task.spec.result_limit {
            let page_size = page_size.max(1) as usize;
            let chunks: Vec<Vec<Value>> = matches
                .chunks(page_size)
                .map(encode_documents)
                .collect::<Result<_, _>>()?;
            let pages: Vec<String> = (0..chunks.len()).map(|_| self.new_page_id()).collect();

            let mut registry = self.inner.pages.write();
            for (i, documents) in chunks.into_iter().enumerate() {
                let count = documents.len() as u64;
                registry.insert(
                    pages[i].clone(),
                    QueryTask {
                        spec: task.spec.clone(),
                        results: Some(QueryResults {
                            documents,
                            next_page_link: pages.get(i + 1).map(|p| page_link(p)),
                            prev_page_link: (i > 0).then(|| page_link(&pages[i - 1])),
                            document_count: Some(count),
                        }),
                    },
                );
            }

            task.results = Some(QueryResults {
                documents: Vec::new(),
                next_page_link: pages.first().map(|p| page_link(p)),
                prev_page_link: None,
                document_count: Some(total),
            });
            return Ok(task);
        }

        let top = task.spec.top.unwrap_or(u32::MAX) as usize;
        let documents = encode_documents(&matches[..matches.len().min(top)])?;
        task.results = Some(QueryResults {
            documents,
            next_page_link: None,
            prev_page_link: None,
            document_count: Some(total),
        });
        Ok(task)
    }

    /// Serve one page of a previously executed paged task.
    pub fn fetch_page(&self, page: &str) -> Option<QueryTask> {
        self.inner.page_fetches.fetch_add(1, Ordering::Relaxed);
        self.inner.pages.read().get(page).cloned()
    }

    pub fn count_matching(&self, filter: &str) -> Result<u64, ServiceFault> {
        let spec = QuerySpec { filter: filter.to_string(), ..QuerySpec::default() };
        Ok(self.matching(&spec)?.len() as u64)
    }

    fn matching(&self, spec: &QuerySpec) -> Result<Vec<SampleDocument>, ServiceFault> {
        let clauses = parse_filter(&spec.filter)?;
        let mut matches: Vec<SampleDocument> = self
            .inner
            .documents
            .read()
            .values()
            .filter(|doc| clauses.iter().all(|c| c.matches(doc)))
            .cloned()
            .collect();

        if let Some(order) = &spec.order_by {
            match order.field.as_str() {
                "sortedCounter" => matches.sort_by_key(|d| d.sorted_counter),
                "name" => matches.sort_by(|a, b| a.name.cmp(&b.name)),
                other => warn!(field = other, "unsupported order-by field, leaving id order"),
            }
            if order.kind == trellis_query::OrderKind::Desc {
                matches.reverse();
            }
        }
        Ok(matches)
    }

    fn new_page_id(&self) -> String {
        format!("p{}", self.inner.next_page.fetch_add(1, Ordering::Relaxed))
    }

    /// Routing table serving the sample document contract from this store.
    pub fn sample_router(&self) -> Result<Router, RouterBuildError> {
        let mut builder =
            Router::builder(SAMPLE_SERVICE_PATH).options(ServiceOptions::namespace_owner());
        for spec in sample_contract() {
            let store = self.clone();
            builder = match spec.name() {
                "list_documents" => builder.route(spec, move |args| store.handle_list(args)),
                "find_document" => builder.route(spec, move |args| store.handle_find(args)),
                "create_document" => builder.route(spec, move |args| store.handle_create(args)),
                "delete_document" => builder.route(spec, move |args| store.handle_delete(args)),
                "rename_document" => builder.route(spec, move |args| store.handle_rename(args)),
                "stats" => builder.route(spec, move |args| store.handle_stats(args)),
                "stats_async" => builder.route(spec, move |args| store.handle_stats_async(args)),
                _ => builder,
            };
        }
        builder.build()
    }

    /// Routing table serving the query contract from this store.
    pub fn query_router(&self) -> Result<Router, RouterBuildError> {
        let mut builder =
            Router::builder(QUERY_SERVICE_PATH).options(ServiceOptions::namespace_owner());
        for spec in contract_specs() {
            let store = self.clone();
            builder = match spec.name() {
                "query" => builder.route(spec, move |args| store.handle_query(args)),
                "count" => builder.route(spec, move |args| store.handle_count(args)),
                _ => builder,
            };
        }
        let store = self.clone();
        builder = builder.route(page_route(), move |args| store.handle_fetch_page(args));
        builder.build()
    }

    fn handle_list(&self, args: Vec<ArgValue>) -> HandlerReply {
        let limit = args.first().and_then(ArgValue::as_i32).unwrap_or(0).max(0) as usize;
        let docs = self.list(limit);
        HandlerReply::pending(async move { encode(&docs) })
    }

    fn handle_find(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(id) = string_arg(&args, 0) else {
            return HandlerReply::fail(ServiceFault::internal("id argument missing"));
        };
        let found = self.get(&id);
        HandlerReply::pending(async move {
            match found {
                Some(doc) => encode(&doc),
                None => Err(not_found(&id)),
            }
        })
    }

    fn handle_create(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(body) = args.first().and_then(|a| a.as_json().cloned()) else {
            return HandlerReply::fail(ServiceFault::internal("body argument missing"));
        };
        let doc: SampleDocument = match serde_json::from_value(body) {
            Ok(doc) => doc,
            Err(e) => {
                return HandlerReply::fail(ServiceFault::internal(format!(
                    "failed to decode document: {e}"
                )));
            }
        };
        let created = self.insert(doc);
        HandlerReply::pending(async move { encode(&created) })
    }

    fn handle_delete(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(id) = string_arg(&args, 0) else {
            return HandlerReply::fail(ServiceFault::internal("id argument missing"));
        };
        match self.remove(&id) {
            Some(_) => HandlerReply::pending(async { Ok(Value::Null) }),
            None => HandlerReply::fail(not_found(&id)),
        }
    }

    // Context method: completes the request itself.
    fn handle_rename(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(op) = args.get(2).and_then(ArgValue::as_operation) else {
            return HandlerReply::fail(ServiceFault::internal("request handle missing"));
        };
        let id = string_arg(&args, 0);
        let name = string_arg(&args, 1);
        match (id, name) {
            (Some(id), Some(name)) => match self.rename(&id, &name) {
                Some(renamed) => {
                    op.set_body_from(&renamed).ok();
                    op.complete();
                }
                None => op.fail(not_found(&id)),
            },
            (Some(_), None) => {
                op.fail(ServiceFault::new("name query parameter is required").with_status(400));
            }
            _ => op.fail(ServiceFault::internal("id argument missing")),
        }
        HandlerReply::unit()
    }

    fn handle_stats(&self, _args: Vec<ArgValue>) -> HandlerReply {
        HandlerReply::ok(self.stats())
    }

    fn handle_stats_async(&self, _args: Vec<ArgValue>) -> HandlerReply {
        let stats = self.stats();
        HandlerReply::pending(async move { Ok(stats) })
    }

    fn stats(&self) -> Value {
        json!({
            "documents": self.len() as u64,
            "pageFetches": self.page_fetches() as u64,
        })
    }

    fn handle_query(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(body) = args.first().and_then(|a| a.as_json().cloned()) else {
            return HandlerReply::fail(ServiceFault::internal("body argument missing"));
        };
        let task: QueryTask = match serde_json::from_value(body) {
            Ok(task) => task,
            Err(e) => {
                return HandlerReply::fail(
                    ServiceFault::new(format!("malformed query task: {e}")).with_status(400),
                );
            }
        };
        let executed = self.execute(task);
        HandlerReply::pending(async move { executed.and_then(|task| encode(&task)) })
    }

    fn handle_count(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(filter) = string_arg(&args, 0) else {
            return HandlerReply::fail(ServiceFault::internal("filter argument missing"));
        };
        let count = self.count_matching(&filter);
        HandlerReply::pending(async move { count.map(|n| json!(n)) })
    }

    fn handle_fetch_page(&self, args: Vec<ArgValue>) -> HandlerReply {
        let Some(page) = string_arg(&args, 0) else {
            return HandlerReply::fail(ServiceFault::internal("page argument missing"));
        };
        let found = self.fetch_page(&page);
        HandlerReply::pending(async move {
            match found {
                Some(task) => encode(&task),
                None => Err(ServiceFault::new(format!("no such page {page}")).with_status(404)),
            }
        })
    }
}

fn page_route() -> RouteSpec {
    RouteSpec::get("fetch_page")
        .path("/pages/{page}")
        .param(ParamSpec::path("page", ParamType::Str))
        .returns(ReturnSpec::future(ShapeSpec::Scalar("QueryTask")))
}

fn page_link(page: &str) -> String {
    format!("{QUERY_SERVICE_PATH}/pages/{page}")
}

fn string_arg(args: &[ArgValue], index: usize) -> Option<String> {
    args.get(index).and_then(|a| a.as_str().map(str::to_string))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, ServiceFault> {
    serde_json::to_value(value)
        .map_err(|e| ServiceFault::internal(format!("failed to encode response: {e}")))
}

fn encode_documents(docs: &[SampleDocument]) -> Result<Vec<Value>, ServiceFault> {
    docs.iter().map(encode).collect()
}

fn not_found(id: &str) -> ServiceFault {
    ServiceFault::new(format!("document {id} not found"))
        .with_status(404)
        .with_error_code(NOT_FOUND_ERROR_CODE)
}

enum ClauseValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Op::Eq),
            "ne" => Some(Op::Ne),
            "lt" => Some(Op::Lt),
            "le" => Some(Op::Le),
            "gt" => Some(Op::Gt),
            "ge" => Some(Op::Ge),
            _ => None,
        }
    }

    fn holds(&self, ord: std::cmp::Ordering) -> bool {
        match self {
            Op::Eq => ord.is_eq(),
            Op::Ne => ord.is_ne(),
            Op::Lt => ord.is_lt(),
            Op::Le => ord.is_le(),
            Op::Gt => ord.is_gt(),
            Op::Ge => ord.is_ge(),
        }
    }
}

enum Clause {
    Kind(String),
    Field { name: String, op: Op, value: ClauseValue },
}

impl Clause {
    fn matches(&self, doc: &SampleDocument) -> bool {
        match self {
            Clause::Kind(kind) => kind == SAMPLE_DOCUMENT_KIND,
            Clause::Field { name, op, value } => match (name.as_str(), value) {
                ("name", ClauseValue::Str(v)) => op.holds(doc.name.as_str().cmp(v.as_str())),
                ("required", ClauseValue::Str(v)) => {
                    op.holds(doc.required.as_str().cmp(v.as_str()))
                }
                ("sortedCounter", ClauseValue::Int(v)) => op.holds(doc.sorted_counter.cmp(v)),
                (field, _) => {
                    warn!(%field, "unsupported filter clause, matching nothing");
                    false
                }
            },
        }
    }
}

/// Parse the filter subset the fixture understands: a `documentKind eq K`
/// clause, optionally followed by ` and (...)` with `field op value`
/// clauses joined by ` and `.
fn parse_filter(filter: &str) -> Result<Vec<Clause>, ServiceFault> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let mut clauses = Vec::new();
    let inner = match filter.strip_prefix("documentKind eq ") {
        Some(rest) => match rest.split_once(" and ") {
            Some((kind, inner)) => {
                clauses.push(Clause::Kind(kind.trim().to_string()));
                let inner = inner.trim();
                inner.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(inner)
            }
            None => {
                clauses.push(Clause::Kind(rest.trim().to_string()));
                ""
            }
        },
        None => filter,
    };

    for part in inner.split(" and ").map(str::trim).filter(|p| !p.is_empty()) {
        clauses.push(parse_clause(part)?);
    }
    Ok(clauses)
}

fn parse_clause(raw: &str) -> Result<Clause, ServiceFault> {
    let bad = || ServiceFault::new(format!("unsupported filter clause: {raw}")).with_status(400);

    let (name, rest) = raw.split_once(' ').ok_or_else(bad)?;
    let (op, value) = rest.split_once(' ').ok_or_else(bad)?;
    let op = Op::parse(op).ok_or_else(bad)?;

    let value = value.trim();
    let value = if let Some(quoted) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        ClauseValue::Str(quoted.replace("''", "'"))
    } else if value == "true" || value == "false" {
        ClauseValue::Bool(value == "true")
    } else {
        ClauseValue::Int(value.parse().map_err(|_| bad())?)
    };

    Ok(Clause::Field { name: name.to_string(), op, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(count: i64) -> DocumentStore {
        let store = DocumentStore::new();
        for i in 0..count {
            store.insert(SampleDocument::named("paged", i));
        }
        store
    }

    #[test]
    fn test_filter_matching() {
        let store = seeded(10);
        store.insert(SampleDocument::named("other", 99));

        assert_eq!(
            store
                .count_matching(&format!("documentKind eq {SAMPLE_DOCUMENT_KIND} and (name eq 'paged')"))
                .unwrap(),
            10
        );
        assert_eq!(
            store
                .count_matching(
                    &format!("documentKind eq {SAMPLE_DOCUMENT_KIND} and (name eq 'paged' and sortedCounter lt 4)")
                )
                .unwrap(),
            4
        );
        assert_eq!(store.count_matching("documentKind eq unknown:kind").unwrap(), 0);
    }

    #[test]
    fn test_paged_execution_materializes_chain() {
        let store = seeded(10);
        let executed = store.execute(QueryTask::paged("name eq 'paged'", 4)).unwrap();

        let results = executed.results.as_ref().unwrap();
        assert!(results.documents.is_empty());
        assert_eq!(results.document_count, Some(10));

        let first = results.next_page_link.as_deref().unwrap();
        let page = first.rsplit('/').next().unwrap();
        let fetched = store.fetch_page(page).unwrap();
        let fetched_results = fetched.results.unwrap();
        assert_eq!(fetched_results.documents.len(), 4);
        assert!(fetched_results.next_page_link.is_some());
        assert!(fetched_results.prev_page_link.is_none());
        assert_eq!(store.page_fetches(), 1);
    }

    #[test]
    fn test_count_only_execution() {
        let store = seeded(3);
        let executed = store.execute(QueryTask::counting("name eq 'paged'")).unwrap();
        let results = executed.results.unwrap();
        assert!(results.documents.is_empty());
        assert_eq!(results.document_count, Some(3));
        assert!(results.next_page_link.is_none());
    }

    #[test]
    fn test_malformed_filter_is_client_error() {
        let store = seeded(1);
        let err = store.count_matching("name similar 'x'").unwrap_err();
        assert_eq!(err.status_code, 400);
    }
}
