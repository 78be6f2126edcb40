// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server-side dispatch
//!
//! A [`Router`] is the routing table of one service: built once from the
//! service's route specs and handlers, then attached to the host as the
//! service's request handler. Dispatch selects the first matching route in
//! registration order, extracts the declared arguments from the request,
//! invokes the handler and applies the completion policy for the method
//! kind (context-bound, synchronous or pending).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use trellis_runtime::{Operation, RequestHandler, ServiceFault, ServiceOptions, uri};

use crate::builder::DescriptorBuilder;
use crate::coerce;
use crate::descriptor::{ArgValue, ParamRole, RouteDescriptor};
use crate::errors::RouterBuildError;
use crate::matcher::UriMatcher;
use crate::spec::RouteSpec;
use crate::validate::{VIOLATIONS_KEY, Violation};

/// Reply produced by a route handler.
pub enum HandlerReply {
    /// Synchronous result: the dispatcher completes the request.
    Value(Result<Value, ServiceFault>),
    /// Asynchronous result: the dispatcher completes once it resolves.
    Pending(BoxFuture<'static, Result<Value, ServiceFault>>),
}

impl HandlerReply {
    pub fn ok(value: Value) -> Self {
        HandlerReply::Value(Ok(value))
    }

    /// Successful reply of a method without a result.
    pub fn unit() -> Self {
        HandlerReply::Value(Ok(Value::Null))
    }

    pub fn fail(fault: ServiceFault) -> Self {
        HandlerReply::Value(Err(fault))
    }

    pub fn pending(
        fut: impl std::future::Future<Output = Result<Value, ServiceFault>> + Send + 'static,
    ) -> Self {
        HandlerReply::Pending(fut.boxed())
    }
}

/// Type-erased route handler: declared arguments in, reply out.
pub type RouteHandler = Arc<dyn Fn(Vec<ArgValue>) -> HandlerReply + Send + Sync>;

struct Route {
    descriptor: Arc<RouteDescriptor>,
    matcher: UriMatcher,
    /// Token distance between the service path and the route template, used
    /// to map template placeholder positions onto full request paths.
    path_offset: usize,
    handler: RouteHandler,
}

/// Routing table of one service.
pub struct Router {
    path: String,
    routes: Vec<Route>,
}

/// Assembles a [`Router`] from route specs and their handlers.
pub struct RouterBuilder {
    path: String,
    options: ServiceOptions,
    descriptors: DescriptorBuilder,
    entries: Vec<(RouteSpec, RouteHandler)>,
}

impl RouterBuilder {
    pub fn new(service_path: &str) -> Self {
        Self {
            path: uri::normalize_path(service_path),
            options: ServiceOptions::default(),
            descriptors: DescriptorBuilder::new(),
            entries: Vec::new(),
        }
    }

    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Descriptor builder to use, carrying generic result hints.
    pub fn descriptor_builder(mut self, descriptors: DescriptorBuilder) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Register a route. Registration order breaks matching ties.
    pub fn route(
        mut self,
        spec: RouteSpec,
        handler: impl Fn(Vec<ArgValue>) -> HandlerReply + Send + Sync + 'static,
    ) -> Self {
        self.entries.push((spec, Arc::new(handler)));
        self
    }

    pub fn build(self) -> Result<Router, RouterBuildError> {
        // Routed dispatch requires ownership of the service's URI namespace;
        // without it sub-paths of the service never arrive here.
        if !self.options.uri_namespace_owner {
            return Err(RouterBuildError::NotNamespaceOwner(self.path));
        }

        let mut routes = Vec::with_capacity(self.entries.len());
        for (spec, handler) in &self.entries {
            let Some(descriptor) = self.descriptors.build(spec)? else {
                debug!(method = spec.name(), "skipping handler without an action marker");
                continue;
            };

            let full_path = match descriptor.template.as_deref() {
                Some(template) => uri::build_path(&self.path, template),
                None => self.path.clone(),
            };
            let template_tokens =
                descriptor.template.as_deref().map(uri::token_count).unwrap_or(0);
            let path_offset = uri::token_count(&full_path) - template_tokens;

            info!(
                action = %descriptor.action,
                path = %full_path,
                method = %descriptor.name,
                "route registered"
            );
            routes.push(Route {
                descriptor: Arc::new(descriptor),
                matcher: UriMatcher::new(&full_path),
                path_offset,
                handler: handler.clone(),
            });
        }

        Ok(Router { path: self.path, routes })
    }
}

impl Router {
    pub fn builder(service_path: &str) -> RouterBuilder {
        RouterBuilder::new(service_path)
    }

    pub fn service_path(&self) -> &str {
        &self.path
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Descriptor of a registered method, when present.
    pub fn descriptor(&self, method: &str) -> Option<Arc<RouteDescriptor>> {
        self.routes
            .iter()
            .find(|r| r.descriptor.name == method)
            .map(|r| r.descriptor.clone())
    }

    async fn dispatch(&self, route: &Route, op: Operation) {
        let descriptor = route.descriptor.clone();

        // Completion timing log; the nested callback continues the chain.
        let method = descriptor.name.clone();
        op.nest_completion(move |op, failure| {
            debug!(
                method = %method,
                status = op.status_code(),
                elapsed_us = op.elapsed().as_micros() as u64,
                failed = failure.is_some(),
                "request handled"
            );
            match failure {
                Some(f) => op.fail(f.clone()),
                None => op.complete(),
            }
        });

        let args = match resolve_arguments(route, &op) {
            Ok(args) => args,
            Err(fault) => {
                warn!(method = %descriptor.name, "rejecting request: {fault}");
                op.fail(fault);
                return;
            }
        };

        let result = match (route.handler)(args) {
            HandlerReply::Value(result) => result,
            HandlerReply::Pending(pending) => pending.await,
        };

        if descriptor.context_param().is_some() {
            // The method owns completion; only errors are handled here, once.
            match result {
                Ok(value) => {
                    if !descriptor.result.is_void && !value.is_null() && !op.is_completed() {
                        op.set_body(value);
                    }
                }
                Err(fault) => {
                    if op.is_completed() {
                        warn!(method = %descriptor.name, "handler failed after completing: {fault}");
                    } else {
                        warn!(method = %descriptor.name, "handler failed: {fault}");
                        op.fail(fault);
                    }
                }
            }
            return;
        }

        match result {
            Ok(value) => {
                if !descriptor.result.is_void {
                    op.set_body(value);
                }
                op.complete();
            }
            Err(fault) => {
                warn!(method = %descriptor.name, "handler failed: {fault}");
                op.fail(fault);
            }
        }
    }
}

#[async_trait]
impl RequestHandler for Router {
    async fn handle(&self, op: Operation) {
        let path = uri::normalize_path(&op.path());
        let action = op.action();

        let route = self
            .routes
            .iter()
            .find(|r| r.descriptor.action == action && r.matcher.matches(&path));

        match route {
            Some(route) => self.dispatch(route, op).await,
            None => {
                debug!(%action, %path, "no route matched");
                op.fail(
                    ServiceFault::new(format!("no route for {action} {path}")).with_status(404),
                );
            }
        }
    }
}

/// Extract the declared arguments from a request, in binding order.
fn resolve_arguments(route: &Route, op: &Operation) -> Result<Vec<ArgValue>, ServiceFault> {
    let descriptor = &route.descriptor;
    let path = uri::normalize_path(&op.path());
    let tokens: Vec<&str> = uri::split_tokens(&path).collect();
    let query = op
        .query()
        .map(|q| uri::parse_query(&q))
        .unwrap_or_default();

    let mut args = Vec::with_capacity(descriptor.params.len());
    for binding in &descriptor.params {
        let value = match binding.role {
            ParamRole::Query => wire_or_default(query.get(&binding.name).cloned(), binding),
            ParamRole::Header => wire_or_default(op.request_header(&binding.name), binding),
            ParamRole::Cookie => wire_or_default(op.cookie(&binding.name), binding),
            ParamRole::Path => descriptor
                .path_param_index
                .get(&binding.name)
                .and_then(|i| tokens.get(i + route.path_offset))
                .and_then(|raw| coerce::from_wire(raw, binding.declared))
                .or_else(|| binding.default.clone())
                .unwrap_or(ArgValue::Absent),
            ParamRole::Context => ArgValue::Op(op.clone()),
            ParamRole::Directive => ArgValue::StrList(op.pragma_directives()),
            ParamRole::Body => resolve_body(binding, op)?,
        };
        args.push(value);
    }
    Ok(args)
}

fn wire_or_default(raw: Option<String>, binding: &crate::descriptor::ParamBinding) -> ArgValue {
    match raw {
        Some(raw) => coerce::from_wire(&raw, binding.declared).unwrap_or(ArgValue::Absent),
        None => binding.default.clone().unwrap_or(ArgValue::Absent),
    }
}

fn resolve_body(
    binding: &crate::descriptor::ParamBinding,
    op: &Operation,
) -> Result<ArgValue, ServiceFault> {
    match (op.body(), binding.validator) {
        (None, None) => Ok(ArgValue::Absent),
        (body, Some(validator)) => {
            let body = body.unwrap_or(Value::Null);
            let violations = validator(&body);
            if violations.is_empty() {
                Ok(ArgValue::Json(body))
            } else {
                Err(validation_fault(violations))
            }
        }
        (Some(body), None) => Ok(ArgValue::Json(body)),
    }
}

fn validation_fault(violations: Vec<Violation>) -> ServiceFault {
    let details = serde_json::to_value(&violations).unwrap_or(Value::Null);
    ServiceFault::new("request body failed validation")
        .with_status(400)
        .with_context(VIOLATIONS_KEY, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamType;
    use crate::spec::{ParamSpec, ReturnSpec, ShapeSpec};
    use serde_json::json;
    use tokio::sync::oneshot;

    fn await_completion(op: &Operation) -> oneshot::Receiver<(u16, Option<ServiceFault>)> {
        let (tx, rx) = oneshot::channel();
        op.set_completion(move |op, failure| {
            let _ = tx.send((op.status_code(), failure.cloned()));
        });
        rx
    }

    fn sample_router() -> Router {
        Router::builder("/demo")
            .options(ServiceOptions::namespace_owner())
            .route(
                RouteSpec::get("find_document")
                    .path("/documents/{id}")
                    .param(ParamSpec::path("id", ParamType::Str))
                    .param(ParamSpec::query("limit", ParamType::I32).with_default("2"))
                    .returns(ReturnSpec::future(ShapeSpec::Scalar("Doc"))),
                |args| {
                    let id = args[0].as_str().unwrap_or("none").to_string();
                    let limit = args[1].as_i32().unwrap_or(-1);
                    HandlerReply::pending(async move { Ok(json!({ "id": id, "limit": limit })) })
                },
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_namespace_ownership_is_required() {
        let err = Router::builder("/demo").build().unwrap_err();
        assert!(matches!(err, RouterBuildError::NotNamespaceOwner(_)));
    }

    #[tokio::test]
    async fn test_path_params_span_the_service_prefix() {
        let router = sample_router();
        let op = Operation::get("/demo/documents/42");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        let (status, failure) = rx.await.unwrap();
        assert_eq!(status, 200);
        assert!(failure.is_none());
        assert_eq!(op.body().unwrap(), json!({ "id": "42", "limit": 2 }));
    }

    #[tokio::test]
    async fn test_query_overrides_default() {
        let router = sample_router();
        let op = Operation::get("/demo/documents/42?limit=9");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        rx.await.unwrap();
        assert_eq!(op.body().unwrap()["limit"], json!(9));
    }

    #[tokio::test]
    async fn test_unmatched_request_fails_404() {
        let router = sample_router();
        let op = Operation::post("/demo/documents/42");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        let (status, failure) = rx.await.unwrap();
        assert_eq!(status, 404);
        assert!(failure.is_some());
    }

    #[tokio::test]
    async fn test_validation_rejects_before_invocation() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Named {
            name: String,
        }
        impl crate::validate::ValidateBody for Named {
            fn validate(&self) -> Vec<Violation> {
                if self.name.is_empty() {
                    vec![Violation::new("name", "must not be empty")]
                } else {
                    Vec::new()
                }
            }
        }

        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen = invoked.clone();
        let router = Router::builder("/demo")
            .options(ServiceOptions::namespace_owner())
            .route(
                RouteSpec::post("create")
                    .path("/documents")
                    .param(
                        ParamSpec::body()
                            .with_validator(crate::validate::decode_and_validate::<Named>),
                    )
                    .returns(ReturnSpec::future(ShapeSpec::Scalar("Named"))),
                move |args| {
                    seen.store(true, std::sync::atomic::Ordering::SeqCst);
                    HandlerReply::ok(args[0].as_json().cloned().unwrap_or(Value::Null))
                },
            )
            .build()
            .unwrap();

        let op = Operation::post("/demo/documents");
        op.set_body(json!({ "name": "" }));
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        let (status, failure) = rx.await.unwrap();
        assert_eq!(status, 400);
        let fault = failure.unwrap();
        assert_eq!(fault.context_value(VIOLATIONS_KEY).unwrap()[0]["path"], json!("name"));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_context_method_owns_completion() {
        let router = Router::builder("/demo")
            .options(ServiceOptions::namespace_owner())
            .route(
                RouteSpec::patch("touch")
                    .path("/documents/{id}")
                    .param(ParamSpec::path("id", ParamType::Str))
                    .param(ParamSpec::operation()),
                |args| {
                    let op = args[1].as_operation().unwrap();
                    op.set_status_code(204);
                    op.complete();
                    HandlerReply::unit()
                },
            )
            .build()
            .unwrap();

        let op = Operation::patch("/demo/documents/9");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        let (status, failure) = rx.await.unwrap();
        assert_eq!(status, 204);
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn test_context_method_error_safety_net() {
        let router = Router::builder("/demo")
            .options(ServiceOptions::namespace_owner())
            .route(
                RouteSpec::patch("broken")
                    .path("/documents/{id}")
                    .param(ParamSpec::path("id", ParamType::Str))
                    .param(ParamSpec::operation()),
                |_| HandlerReply::fail(ServiceFault::new("could not touch")),
            )
            .build()
            .unwrap();

        let op = Operation::patch("/demo/documents/9");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;

        let (status, failure) = rx.await.unwrap();
        assert_eq!(status, 500);
        assert!(failure.is_some());
    }

    #[tokio::test]
    async fn test_first_registered_route_wins_ties() {
        let router = Router::builder("/demo")
            .options(ServiceOptions::namespace_owner())
            .route(
                RouteSpec::get("first")
                    .path("/documents/{id}")
                    .returns(ReturnSpec::value(ShapeSpec::Scalar("Tag"))),
                |_| HandlerReply::ok(json!("first")),
            )
            .route(
                RouteSpec::get("second")
                    .path("/documents/{other}")
                    .returns(ReturnSpec::value(ShapeSpec::Scalar("Tag"))),
                |_| HandlerReply::ok(json!("second")),
            )
            .build()
            .unwrap();

        let op = Operation::get("/demo/documents/1");
        let rx = await_completion(&op);
        router.handle(op.clone()).await;
        rx.await.unwrap();
        assert_eq!(op.body().unwrap(), json!("first"));
    }
}
