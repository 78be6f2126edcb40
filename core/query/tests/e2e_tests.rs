// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for paged query traversal
//!
//! These tests execute query tasks against an in-process store behind the
//! query service contract:
//! - Sequential page-chain traversal and navigation
//! - Short-circuiting walks that leave later pages unfetched
//! - Collectors spanning page boundaries
//! - Counting independent of pagination state
//! - Template expansion feeding paged execution

use std::ops::ControlFlow;

use serde_json::json;

use trellis_query::{
    OrderKind, PagedQueryTemplate, PagedStream, QueryTask, QueryTemplate, filter_criteria,
};
use trellis_runtime::ServiceFault;
use trellis_testing::{SAMPLE_DOCUMENT_KIND, SampleDocument, TestEnv};

fn kind_filter() -> String {
    filter_criteria(SAMPLE_DOCUMENT_KIND, "", &[])
}

fn paged_stream(env: &TestEnv, page_size: u32) -> PagedStream<SampleDocument> {
    PagedStream::execute(env.query.clone(), QueryTask::paged(kind_filter(), page_size))
}

// ============================================================================
// Page-chain traversal
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_page_chain_starts_empty_and_splits_by_page_size() {
    let env = TestEnv::new();
    env.seed(10, "chained");

    let stream = paged_stream(&env, 4);
    let mut page = stream.first_page().await.unwrap();
    assert_eq!(page.page_size(), Some(4));
    assert!(page.has_next_page());
    assert!(!page.has_previous_page());

    let mut sizes = vec![page.raw_documents().len()];
    while let Some(next) = page.next().await.unwrap() {
        sizes.push(next.raw_documents().len());
        page = next;
    }
    assert_eq!(sizes, vec![0, 4, 4, 2]);
    assert!(!page.has_next_page());
    assert_eq!(env.store.page_fetches(), 3);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_for_each_visits_every_document_in_order() {
    let env = TestEnv::new();
    env.seed(10, "walked");

    let stream = paged_stream(&env, 4);
    let mut visited = Vec::new();
    stream.for_each(|doc: SampleDocument| visited.push(doc.sorted_counter)).await.unwrap();

    assert_eq!(visited, (0..10).collect::<Vec<i64>>());
    assert_eq!(env.store.page_fetches(), 3);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_previous_page_retraces_the_chain() {
    let env = TestEnv::new();
    env.seed(6, "retraced");

    let stream = paged_stream(&env, 4);
    let first = stream.first_page().await.unwrap();
    let p1 = first.next().await.unwrap().unwrap();
    assert!(!p1.has_previous_page());

    let p2 = p1.next().await.unwrap().unwrap();
    assert_eq!(p2.raw_documents().len(), 2);
    let back = p2.previous().await.unwrap().unwrap();
    assert_eq!(back.documents().unwrap(), p1.documents().unwrap());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_empty_result_walks_nothing() {
    let env = TestEnv::new();
    env.seed(3, "present");
    let criteria =
        filter_criteria(SAMPLE_DOCUMENT_KIND, "name eq :name", &[("name", json!("absent"))]);

    let stream: PagedStream<SampleDocument> =
        PagedStream::execute(env.query.clone(), QueryTask::paged(criteria, 4));
    let page = stream.first_page().await.unwrap();
    assert!(page.raw_documents().is_empty());
    assert!(!page.has_next_page());

    let mut visited = 0;
    stream.for_each(|_| visited += 1).await.unwrap();
    assert_eq!(visited, 0);
    assert_eq!(stream.total_count().await.unwrap(), 0);
    assert_eq!(env.store.page_fetches(), 0);
}

// ============================================================================
// Short-circuiting walks
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_short_circuit_leaves_later_pages_unfetched() {
    let env = TestEnv::new();
    env.seed(10, "stopped");

    let stream = paged_stream(&env, 4);
    let mut visited = Vec::new();
    stream
        .for_each_while(
            |doc: SampleDocument| visited.push(doc.sorted_counter),
            |doc| doc.sorted_counter < 6,
        )
        .await
        .unwrap();

    assert_eq!(visited, (0..6).collect::<Vec<i64>>());
    assert_eq!(env.store.page_fetches(), 2);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_visitor_fault_aborts_the_walk() {
    let env = TestEnv::new();
    env.seed(10, "aborted");

    let stream = paged_stream(&env, 4);
    let mut visited = Vec::new();
    let err = stream
        .walk(|doc: SampleDocument| {
            if doc.sorted_counter == 4 {
                ControlFlow::Break(Err(ServiceFault::new("bad document").with_status(409)))
            } else {
                visited.push(doc.sorted_counter);
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(err.status_code, 409);
    assert_eq!(visited, (0..4).collect::<Vec<i64>>());
    assert_eq!(env.store.page_fetches(), 2);
}

// ============================================================================
// Collectors
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_collectors_span_page_boundaries() {
    let env = TestEnv::new();
    env.seed(10, "collected");
    let stream = paged_stream(&env, 4);

    let evens = stream.filter(|doc| doc.sorted_counter % 2 == 0).await.unwrap();
    assert_eq!(evens.len(), 5);

    let doubled = stream.map(|doc| doc.sorted_counter * 2).await.unwrap();
    assert_eq!(doubled, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_map_if_skips_where_map_while_stops() {
    let env = TestEnv::new();
    env.seed(10, "mapped");
    let stream = paged_stream(&env, 4);

    let skipped = stream
        .map_if(|doc| doc.sorted_counter, |doc| doc.sorted_counter % 2 == 0)
        .await
        .unwrap();
    assert_eq!(skipped, vec![0, 2, 4, 6, 8]);

    let stopped = stream
        .map_while(|doc| doc.sorted_counter, |doc| doc.sorted_counter % 2 == 0)
        .await
        .unwrap();
    assert_eq!(stopped, vec![0]);
}

// ============================================================================
// Counting
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_total_count_ignores_traversal_state() {
    let env = TestEnv::new();
    env.seed(10, "counted");
    let stream = paged_stream(&env, 4);

    assert_eq!(stream.total_count().await.unwrap(), 10);

    let mut visited = 0;
    stream
        .for_each_while(|_| visited += 1, |doc| doc.sorted_counter < 2)
        .await
        .unwrap();
    assert_eq!(visited, 2);
    assert_eq!(stream.total_count().await.unwrap(), 10);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_count_only_task_carries_no_documents() {
    let env = TestEnv::new();
    env.seed(7, "tallied");

    let executed = env.query.query(QueryTask::counting(kind_filter())).await.unwrap();
    let results = executed.results.unwrap();
    assert_eq!(results.document_count, Some(7));
    assert!(results.documents.is_empty());
    assert!(results.next_page_link.is_none());
}

// ============================================================================
// Templates
// ============================================================================

#[tokio::test]
#[tracing_test::traced_test]
async fn test_template_runs_a_paged_query_per_argument_set() {
    let env = TestEnv::new();
    env.seed(4, "alpha");
    env.seed(3, "beta");

    let template =
        PagedQueryTemplate::new(SAMPLE_DOCUMENT_KIND, "name eq :name").with_page_size(2);

    let alphas: PagedStream<SampleDocument> =
        template.run_paged(&env.query, &[("name", json!("alpha"))]);
    let names = alphas.map(|doc| doc.name).await.unwrap();
    assert_eq!(names, vec!["alpha"; 4]);

    let betas: PagedStream<SampleDocument> =
        template.run_paged(&env.query, &[("name", json!("beta"))]);
    assert_eq!(betas.total_count().await.unwrap(), 3);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_template_order_by_descending() {
    let env = TestEnv::new();
    env.seed(4, "ordered");

    let template = PagedQueryTemplate::new(SAMPLE_DOCUMENT_KIND, "name eq :name")
        .with_page_size(2)
        .with_order_by("sortedCounter", OrderKind::Desc);

    let stream: PagedStream<SampleDocument> =
        template.run_paged(&env.query, &[("name", json!("ordered"))]);
    let counters = stream.map(|doc| doc.sorted_counter).await.unwrap();
    assert_eq!(counters, vec![3, 2, 1, 0]);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_one_shot_template_returns_documents_directly() {
    let env = TestEnv::new();
    env.seed(8, "direct");

    let template =
        QueryTemplate::new(SAMPLE_DOCUMENT_KIND, "sortedCounter lt :max").with_top(100);
    let docs: Vec<SampleDocument> =
        template.run(&env.query, &[("max", json!(5))]).await.unwrap();

    assert_eq!(docs.len(), 5);
    assert!(docs.iter().all(|d| d.sorted_counter < 5));
    assert_eq!(env.store.page_fetches(), 0);
}
