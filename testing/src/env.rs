// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Assembled fixture environment
//!
//! One host with the sample document service and the query service
//! mounted, plus ready-made clients for both. Everything runs in-process
//! over the host's loopback sender.

use std::sync::Arc;

use trellis_query::DocumentQueryClient;
use trellis_routing::ServiceConsumer;
use trellis_runtime::{ServiceHost, ServiceOptions};

use crate::contract::{SAMPLE_SERVICE_PATH, sample_contract};
use crate::docs::SampleDocument;
use crate::store::DocumentStore;

pub struct TestEnv {
    pub host: ServiceHost,
    pub store: DocumentStore,
    /// Consumer of the sample document contract.
    pub consumer: ServiceConsumer,
    /// Client of the query contract.
    pub query: DocumentQueryClient,
}

impl TestEnv {
    pub fn new() -> Self {
        let host = ServiceHost::new();
        let store = DocumentStore::new();

        let sample = store.sample_router().expect("sample router should build");
        host.register(SAMPLE_SERVICE_PATH, ServiceOptions::namespace_owner(), Arc::new(sample))
            .expect("sample service should register");

        let queries = store.query_router().expect("query router should build");
        host.register(
            trellis_query::QUERY_SERVICE_PATH,
            ServiceOptions::namespace_owner(),
            Arc::new(queries),
        )
        .expect("query service should register");

        let consumer = ServiceConsumer::builder()
            .contract(sample_contract())
            .contract_path(SAMPLE_SERVICE_PATH)
            .host(&host)
            .build()
            .expect("sample consumer should build");
        let query = DocumentQueryClient::new(&host).expect("query client should build");

        Self { host, store, consumer, query }
    }

    /// Insert `count` documents named `name`, counters `0..count`.
    pub fn seed(&self, count: usize, name: &str) -> Vec<SampleDocument> {
        (0..count)
            .map(|i| self.store.insert(SampleDocument::named(name, i as i64)))
            .collect()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
