// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Query service client
//!
//! Contract table and dispatch object for the document query service.
//! Page links returned by executed tasks are opaque paths, so page
//! fetches go through the consumer's raw send surface rather than a
//! templated contract method.

use trellis_routing::{
    ArgValue, ConsumerBuildError, ParamSpec, ParamType, ReturnSpec, RouteSpec, ServiceConsumer,
    ShapeSpec,
};
use trellis_runtime::{Operation, ServiceFault, ServiceHost};

use crate::task::QueryTask;

/// Mount path of the document query service.
pub const QUERY_SERVICE_PATH: &str = "/core/query-tasks";

/// Method table of the query service contract.
pub fn contract_specs() -> Vec<RouteSpec> {
    vec![
        RouteSpec::post("query")
            .param(ParamSpec::body())
            .returns(ReturnSpec::future(ShapeSpec::Scalar("QueryTask"))),
        RouteSpec::get("count")
            .path("/counts")
            .param(ParamSpec::query("filter", ParamType::Str))
            .returns(ReturnSpec::future(ShapeSpec::Scalar("u64"))),
    ]
}

/// Typed facade over the query service contract.
#[derive(Clone)]
pub struct DocumentQueryClient {
    consumer: ServiceConsumer,
}

impl DocumentQueryClient {
    /// Client wired to a host-local query service.
    pub fn new(host: &ServiceHost) -> Result<Self, ConsumerBuildError> {
        let consumer = ServiceConsumer::builder()
            .contract(contract_specs())
            .contract_path(QUERY_SERVICE_PATH)
            .referer(QUERY_SERVICE_PATH)
            .host(host)
            .build()?;
        Ok(Self { consumer })
    }

    /// Client over an existing consumer, e.g. one with a remote base URI.
    pub fn from_consumer(consumer: ServiceConsumer) -> Self {
        Self { consumer }
    }

    /// Execute a query task and return it with results attached.
    pub async fn query(&self, task: QueryTask) -> Result<QueryTask, ServiceFault> {
        let body = serde_json::to_value(&task)
            .map_err(|e| ServiceFault::internal(format!("failed to encode query task: {e}")))?;
        self.consumer.invoke("query", vec![ArgValue::Json(body)]).await
    }

    /// Follow an opaque page link from an executed task.
    pub async fn fetch_page(&self, link: &str) -> Result<QueryTask, ServiceFault> {
        self.consumer.send(Operation::get(link)).await
    }

    /// Number of documents matching `filter`, independent of paging.
    pub async fn count(&self, filter: &str) -> Result<u64, ServiceFault> {
        self.consumer
            .invoke("count", vec![ArgValue::Str(filter.to_string())])
            .await
    }
}
