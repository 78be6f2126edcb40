// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! One page of an executed paged query
//!
//! A page wraps the executed task it came from together with the client
//! used to follow its links. The first page of a paged task carries no
//! documents, only a link to the first populated page.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use trellis_runtime::ServiceFault;

use crate::client::DocumentQueryClient;
use crate::task::QueryTask;

/// Converts one raw result document into the caller's document type.
pub type DocumentDecoder<D> = Arc<dyn Fn(&Value) -> Result<D, ServiceFault> + Send + Sync>;

pub struct Page<D> {
    task: QueryTask,
    client: DocumentQueryClient,
    decode: DocumentDecoder<D>,
}

impl<D> Clone for Page<D> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            client: self.client.clone(),
            decode: self.decode.clone(),
        }
    }
}

impl<D: DeserializeOwned> Page<D> {
    /// Page over an executed task, decoding documents with serde.
    pub fn new(client: DocumentQueryClient, task: QueryTask) -> Self {
        Self::with_decoder(
            client,
            task,
            Arc::new(|value: &Value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| ServiceFault::internal(format!("failed to decode document: {e}")))
            }),
        )
    }
}

impl<D> Page<D> {
    /// Page with a caller-supplied document decoder.
    pub fn with_decoder(
        client: DocumentQueryClient,
        task: QueryTask,
        decode: DocumentDecoder<D>,
    ) -> Self {
        Self { task, client, decode }
    }

    pub fn task(&self) -> &QueryTask {
        &self.task
    }

    /// Documents of this page, undecoded.
    pub fn raw_documents(&self) -> &[Value] {
        self.task.results.as_ref().map(|r| r.documents.as_slice()).unwrap_or(&[])
    }

    /// Documents of this page, decoded.
    pub fn documents(&self) -> Result<Vec<D>, ServiceFault> {
        self.raw_documents().iter().map(|doc| (self.decode)(doc)).collect()
    }

    /// Configured page size of the originating query.
    pub fn page_size(&self) -> Option<u32> {
        self.task.spec.result_limit
    }

    pub fn has_next_page(&self) -> bool {
        self.task.next_page_link().is_some()
    }

    pub fn has_previous_page(&self) -> bool {
        self.task.prev_page_link().is_some()
    }

    /// Fetch the next page, or `None` when this is the last one.
    pub async fn next(&self) -> Result<Option<Page<D>>, ServiceFault> {
        self.follow(self.task.next_page_link()).await
    }

    /// Fetch the previous page, or `None` when this is the first one.
    pub async fn previous(&self) -> Result<Option<Page<D>>, ServiceFault> {
        self.follow(self.task.prev_page_link()).await
    }

    async fn follow(&self, link: Option<&str>) -> Result<Option<Page<D>>, ServiceFault> {
        let link = match link {
            Some(link) => link.to_string(),
            None => return Ok(None),
        };
        let task = self.client.fetch_page(&link).await?;
        Ok(Some(Page {
            task,
            client: self.client.clone(),
            decode: self.decode.clone(),
        }))
    }

    /// Number of documents matching the originating query, counted with a
    /// separate count-only query independent of pagination state.
    pub async fn total_count(&self) -> Result<u64, ServiceFault> {
        self.client.count(self.task.filter()).await
    }
}
