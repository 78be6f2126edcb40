// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Aggregate traversal over paged query results
//!
//! A [`PagedStream`] starts from a pending first page and walks the page
//! chain so callers do not follow links by hand. Traversal is strictly
//! sequential: the next page is requested only after the current page's
//! documents have been processed. The per-document visitor steers the
//! walk through [`ControlFlow`]: `Continue` keeps going, `Break(Ok(()))`
//! stops cleanly, `Break(Err(fault))` aborts with that fault.

use std::future::Future;
use std::ops::ControlFlow;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;

use trellis_runtime::ServiceFault;

use crate::client::DocumentQueryClient;
use crate::page::Page;
use crate::task::QueryTask;

pub struct PagedStream<D> {
    first: Shared<BoxFuture<'static, Result<Page<D>, ServiceFault>>>,
}

impl<D> Clone for PagedStream<D> {
    fn clone(&self) -> Self {
        Self { first: self.first.clone() }
    }
}

impl<D: Send + 'static> PagedStream<D> {
    /// Stream over a pending first page.
    pub fn new(
        first: impl Future<Output = Result<Page<D>, ServiceFault>> + Send + 'static,
    ) -> Self {
        Self { first: first.boxed().shared() }
    }

    /// Stream over an already fetched first page.
    pub fn from_page(page: Page<D>) -> Self {
        Self::new(async move { Ok(page) })
    }

    /// Execute a query task and stream its result pages.
    pub fn execute(client: DocumentQueryClient, task: QueryTask) -> Self
    where
        D: DeserializeOwned,
    {
        Self::new(async move {
            let executed = client.query(task).await?;
            Ok(Page::new(client, executed))
        })
    }

    /// The first page, shared between traversals of the same stream.
    pub async fn first_page(&self) -> Result<Page<D>, ServiceFault> {
        self.first.clone().await
    }

    /// Visit every document across all pages until the visitor breaks or
    /// the page chain is exhausted.
    pub async fn walk<F>(&self, mut visit: F) -> Result<(), ServiceFault>
    where
        F: FnMut(D) -> ControlFlow<Result<(), ServiceFault>> + Send,
    {
        let mut page = self.first_page().await?;
        loop {
            for doc in page.documents()? {
                match visit(doc) {
                    ControlFlow::Continue(()) => {}
                    ControlFlow::Break(outcome) => return outcome,
                }
            }
            match page.next().await? {
                Some(next) => page = next,
                None => return Ok(()),
            }
        }
    }

    /// Apply `action` to every document.
    pub async fn for_each<A>(&self, mut action: A) -> Result<(), ServiceFault>
    where
        A: FnMut(D) + Send,
    {
        self.walk(|doc| {
            action(doc);
            ControlFlow::Continue(())
        })
        .await
    }

    /// Apply `action` while `until` holds; the first failing document stops
    /// the walk cleanly without being visited.
    pub async fn for_each_while<A, P>(&self, mut action: A, mut until: P) -> Result<(), ServiceFault>
    where
        A: FnMut(D) + Send,
        P: FnMut(&D) -> bool + Send,
    {
        self.walk(|doc| {
            if until(&doc) {
                action(doc);
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(Ok(()))
            }
        })
        .await
    }

    /// Collect the documents passing `criteria`, across all pages.
    pub async fn filter<P>(&self, mut criteria: P) -> Result<Vec<D>, ServiceFault>
    where
        P: FnMut(&D) -> bool + Send,
    {
        let mut accumulate = Vec::new();
        self.walk(|doc| {
            if criteria(&doc) {
                accumulate.push(doc);
            }
            ControlFlow::Continue(())
        })
        .await?;
        Ok(accumulate)
    }

    /// Collect `mapper` applied to every document.
    pub async fn map<R, F>(&self, mut mapper: F) -> Result<Vec<R>, ServiceFault>
    where
        F: FnMut(D) -> R + Send,
        R: Send,
    {
        let mut accumulate = Vec::new();
        self.walk(|doc| {
            accumulate.push(mapper(doc));
            ControlFlow::Continue(())
        })
        .await?;
        Ok(accumulate)
    }

    /// Collect `mapper` applied to the documents passing `if_true`,
    /// across all pages.
    pub async fn map_if<R, F, P>(&self, mut mapper: F, mut if_true: P) -> Result<Vec<R>, ServiceFault>
    where
        F: FnMut(D) -> R + Send,
        P: FnMut(&D) -> bool + Send,
        R: Send,
    {
        let mut accumulate = Vec::new();
        self.walk(|doc| {
            if if_true(&doc) {
                accumulate.push(mapper(doc));
            }
            ControlFlow::Continue(())
        })
        .await?;
        Ok(accumulate)
    }

    /// Collect `mapper` applied while `if_true` holds; the first failing
    /// document stops the walk cleanly with what was collected so far.
    pub async fn map_while<R, F, P>(
        &self,
        mut mapper: F,
        mut if_true: P,
    ) -> Result<Vec<R>, ServiceFault>
    where
        F: FnMut(D) -> R + Send,
        P: FnMut(&D) -> bool + Send,
        R: Send,
    {
        let mut accumulate = Vec::new();
        self.walk(|doc| {
            if if_true(&doc) {
                accumulate.push(mapper(doc));
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(Ok(()))
            }
        })
        .await?;
        Ok(accumulate)
    }

    /// Number of documents matching the originating query, independent of
    /// how far the stream has been traversed.
    pub async fn total_count(&self) -> Result<u64, ServiceFault> {
        self.first_page().await?.total_count().await
    }
}
