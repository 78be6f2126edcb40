// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side dispatch
//!
//! A [`ServiceConsumer`] is the explicit dispatch object of a service
//! contract: descriptors are built eagerly from the contract's route specs,
//! and every typed contract method forwards to [`ServiceConsumer::invoke`]
//! with its arguments in declaration order. The consumer assembles the
//! request from the descriptor, hands it to a fire-and-forget sender,
//! awaits completion and decodes the result; failures pass through the
//! error handler, which recovers the structured error body.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use trellis_runtime::{
    ErrorBody, Operation, RequestSender, ServiceFault, ServiceHost, context_keys, uri,
};

use crate::builder::DescriptorBuilder;
use crate::descriptor::{ArgValue, ParamRole, ResultContainer, RouteDescriptor};
use crate::errors::ConsumerBuildError;
use crate::interceptor::{CompletedCall, InterceptorChain, OperationInterceptor};
use crate::spec::{RouteSpec, ShapeSpec};

/// Failure context handed to the error handler.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Operation as it was sent.
    pub source: Operation,
    /// Operation as it completed.
    pub completed: Operation,
    /// Failure reported through the completion.
    pub fault: ServiceFault,
}

/// Maps a failed call to the typed fault returned to the caller.
pub type ErrorHandler = Arc<dyn Fn(ErrorContext) -> ServiceFault + Send + Sync>;

/// Replaces the default body extraction of a completed call.
pub type ResponseDecoder =
    Arc<dyn Fn(&Operation, &RouteDescriptor) -> Result<Value, ServiceFault> + Send + Sync>;

enum BaseUri {
    Literal(String),
    Supplier(Arc<dyn Fn() -> String + Send + Sync>),
}

impl BaseUri {
    fn resolve(&self) -> String {
        match self {
            BaseUri::Literal(base) => base.clone(),
            BaseUri::Supplier(supplier) => supplier(),
        }
    }
}

struct ConsumerInner {
    descriptors: HashMap<String, Arc<RouteDescriptor>>,
    base_uri: BaseUri,
    contract_path: String,
    sender: Arc<dyn RequestSender>,
    referer: String,
    interceptors: InterceptorChain,
    error_handler: ErrorHandler,
    decoder: Option<ResponseDecoder>,
}

/// Builder for [`ServiceConsumer`].
pub struct ConsumerBuilder {
    specs: Vec<RouteSpec>,
    contract_path: String,
    base_uri: Option<BaseUri>,
    host: Option<ServiceHost>,
    sender: Option<Arc<dyn RequestSender>>,
    referer: String,
    interceptors: InterceptorChain,
    error_handler: Option<ErrorHandler>,
    decoder: Option<ResponseDecoder>,
    descriptors: DescriptorBuilder,
}

impl Default for ConsumerBuilder {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            contract_path: String::new(),
            base_uri: None,
            host: None,
            sender: None,
            referer: "/consumer".to_string(),
            interceptors: InterceptorChain::default(),
            error_handler: None,
            decoder: None,
            descriptors: DescriptorBuilder::new(),
        }
    }
}

impl ConsumerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contract method table.
    pub fn contract(mut self, specs: Vec<RouteSpec>) -> Self {
        self.specs = specs;
        self
    }

    /// Base path marker of the contract, prepended to every route template.
    pub fn contract_path(mut self, path: &str) -> Self {
        self.contract_path = path.to_string();
        self
    }

    /// Fixed base URI of the target service.
    pub fn base_uri(mut self, base: impl Into<String>) -> Self {
        self.base_uri = Some(BaseUri::Literal(base.into()));
        self
    }

    /// Base URI resolved per request.
    pub fn base_uri_supplier(
        mut self,
        supplier: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.base_uri = Some(BaseUri::Supplier(Arc::new(supplier)));
        self
    }

    /// Host to derive the default sender from.
    pub fn host(mut self, host: &ServiceHost) -> Self {
        self.host = Some(host.clone());
        self
    }

    /// Explicit sender, replacing the host-derived one.
    pub fn sender(mut self, sender: Arc<dyn RequestSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Referer recorded on outbound operations.
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn OperationInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Replace the default error handler.
    pub fn error_handler(
        mut self,
        handler: impl Fn(ErrorContext) -> ServiceFault + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Replace the default body extraction of completed calls.
    pub fn response_decoder(
        mut self,
        decoder: impl Fn(&Operation, &RouteDescriptor) -> Result<Value, ServiceFault>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Bind a generic result variable for descriptor building.
    pub fn hint(mut self, var: &'static str, shape: ShapeSpec) -> Self {
        self.descriptors = self.descriptors.hint(var, shape);
        self
    }

    pub fn build(self) -> Result<ServiceConsumer, ConsumerBuildError> {
        if self.specs.is_empty() {
            return Err(ConsumerBuildError::NoContract);
        }

        let mut descriptors = HashMap::with_capacity(self.specs.len());
        for descriptor in self.descriptors.build_all(&self.specs)? {
            let name = descriptor.name.clone();
            if descriptors.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(ConsumerBuildError::DuplicateMethod(name));
            }
        }

        let sender = match (self.sender, &self.host) {
            (Some(sender), _) => sender,
            (None, Some(host)) => Arc::new(host.sender()),
            (None, None) => return Err(ConsumerBuildError::NoSender),
        };

        Ok(ServiceConsumer {
            inner: Arc::new(ConsumerInner {
                descriptors,
                base_uri: self.base_uri.unwrap_or(BaseUri::Literal(String::new())),
                contract_path: self.contract_path,
                sender,
                referer: self.referer,
                interceptors: self.interceptors,
                error_handler: self.error_handler.unwrap_or_else(|| Arc::new(default_error_handler)),
                decoder: self.decoder,
            }),
        })
    }
}

/// Explicit dispatch object for one service contract.
#[derive(Clone)]
pub struct ServiceConsumer {
    inner: Arc<ConsumerInner>,
}

impl ServiceConsumer {
    pub fn builder() -> ConsumerBuilder {
        ConsumerBuilder::new()
    }

    /// Descriptor of a contract method, when declared.
    pub fn descriptor(&self, method: &str) -> Option<Arc<RouteDescriptor>> {
        self.inner.descriptors.get(method).cloned()
    }

    /// Invoke a contract method and decode its result.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<T, ServiceFault> {
        let (completed, descriptor) = self.invoke_raw(method, args).await?;
        self.decode_result(&completed, &descriptor)
    }

    /// Invoke a contract method without a result.
    pub async fn invoke_unit(&self, method: &str, args: Vec<ArgValue>) -> Result<(), ServiceFault> {
        self.invoke_raw(method, args).await.map(|_| ())
    }

    async fn invoke_raw(
        &self,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<(Operation, Arc<RouteDescriptor>), ServiceFault> {
        let descriptor = self
            .descriptor(method)
            .ok_or_else(|| ServiceFault::internal(format!("unknown contract method {method}")))?;
        let op = self.build_operation(&descriptor, &args)?;
        let completed = self.send_operation(op).await?;
        Ok((completed, descriptor))
    }

    /// Send a prebuilt operation through the consumer's sender, completion
    /// handling, interceptors and error handler.
    pub async fn send_operation(&self, op: Operation) -> Result<Operation, ServiceFault> {
        let inner = &self.inner;

        if op.referer().is_empty() {
            op.set_referer(&inner.referer);
        }
        if op.context_id().is_none() {
            op.set_context_id(format!("{:08x}", rand::random::<u32>()));
        }

        let op = inner.interceptors.before_send(op);

        let (tx, rx) = oneshot::channel();
        op.set_completion(move |op, failure| {
            let _ = tx.send((op.clone(), failure.cloned()));
        });

        debug!(action = %op.action(), uri = %op.uri(), "sending operation");
        inner.sender.send(op.clone());

        let (completed, fault) = rx
            .await
            .map_err(|_| ServiceFault::internal("request dropped without completion"))?;

        let outcome = inner
            .interceptors
            .after_complete(&op, CompletedCall { operation: completed, fault });

        match outcome.fault {
            Some(fault) => Err((inner.error_handler)(ErrorContext {
                source: op,
                completed: outcome.operation,
                fault,
            })),
            None => Ok(outcome.operation),
        }
    }

    /// Send a prebuilt operation and decode the completed body directly.
    pub async fn send<T: DeserializeOwned>(&self, op: Operation) -> Result<T, ServiceFault> {
        let completed = self.send_operation(op).await?;
        let body = completed.body().unwrap_or(Value::Null);
        serde_json::from_value(body)
            .map_err(|e| ServiceFault::internal(format!("failed to decode response: {e}")))
    }

    /// Assemble the outbound operation for a descriptor: substitute path
    /// placeholders, collect query pairs, headers, cookies, directives and
    /// the body. Absent arguments contribute nothing.
    pub fn build_operation(
        &self,
        descriptor: &RouteDescriptor,
        args: &[ArgValue],
    ) -> Result<Operation, ServiceFault> {
        if args.len() != descriptor.params.len() {
            return Err(ServiceFault::internal(format!(
                "{} expects {} arguments, got {}",
                descriptor.name,
                descriptor.params.len(),
                args.len()
            )));
        }

        let base = self.inner.base_uri.resolve();
        let mut path = uri::build_path(&base, &self.inner.contract_path);
        if let Some(template) = &descriptor.template {
            path = uri::build_path(&path, template);
        }

        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut cookies: Vec<(String, String)> = Vec::new();
        let mut directives: Vec<String> = Vec::new();
        let mut body: Option<Value> = None;

        for (binding, arg) in descriptor.params.iter().zip(args) {
            if arg.is_absent() {
                continue;
            }
            match binding.role {
                ParamRole::Path => {
                    if let Some(value) = arg.to_wire_string() {
                        path = path.replace(&format!("{{{}}}", binding.name), &value);
                    }
                }
                ParamRole::Query => match arg {
                    ArgValue::StrList(items) => {
                        query.extend(items.iter().map(|i| (binding.name.clone(), i.clone())));
                    }
                    other => {
                        if let Some(value) = other.to_wire_string() {
                            query.push((binding.name.clone(), value));
                        }
                    }
                },
                ParamRole::Header => {
                    if let Some(value) = arg.to_wire_string() {
                        headers.push((binding.name.clone(), value));
                    }
                }
                ParamRole::Cookie => {
                    if let Some(value) = arg.to_wire_string() {
                        cookies.push((binding.name.clone(), value));
                    }
                }
                ParamRole::Body => body = Some(arg_to_body(arg)),
                ParamRole::Directive => match arg {
                    ArgValue::StrList(items) => directives.extend(items.iter().cloned()),
                    other => {
                        if let Some(value) = other.to_wire_string() {
                            directives.push(value);
                        }
                    }
                },
                // The request handle is a server-side argument.
                ParamRole::Context => {}
            }
        }

        if path.contains('{') {
            debug!(method = %descriptor.name, %path, "unsubstituted path placeholders remain");
        }

        let op = Operation::new(descriptor.action, uri::extend_uri_with_query(&path, &query));
        for (name, value) in headers {
            op.add_request_header(name, value);
        }
        for (name, value) in cookies {
            op.set_cookie(name, value);
        }
        for directive in directives {
            op.add_pragma_directive(directive);
        }
        if let Some(body) = body {
            op.set_body(body);
        }
        Ok(op)
    }

    fn decode_result<T: DeserializeOwned>(
        &self,
        completed: &Operation,
        descriptor: &RouteDescriptor,
    ) -> Result<T, ServiceFault> {
        let value = match &self.inner.decoder {
            Some(decoder) => decoder(completed, descriptor)?,
            None => completed
                .body()
                .unwrap_or_else(|| empty_value(descriptor.result.container)),
        };
        serde_json::from_value(value).map_err(|e| {
            ServiceFault::internal(format!("failed to decode {} response: {e}", descriptor.name))
        })
    }
}

/// Empty value synthesized for a result container when a successful
/// response carries no body.
fn empty_value(container: ResultContainer) -> Value {
    match container {
        ResultContainer::List | ResultContainer::Set | ResultContainer::Array => json!([]),
        ResultContainer::Map => json!({}),
        ResultContainer::Plain | ResultContainer::Opaque => Value::Null,
    }
}

fn arg_to_body(arg: &ArgValue) -> Value {
    match arg {
        ArgValue::Json(v) => v.clone(),
        ArgValue::Str(s) => Value::String(s.clone()),
        ArgValue::I32(v) => json!(v),
        ArgValue::I64(v) => json!(v),
        ArgValue::F64(v) => json!(v),
        ArgValue::Bool(v) => json!(v),
        ArgValue::StrList(v) => json!(v),
        ArgValue::Op(_) | ArgValue::Absent => Value::Null,
    }
}

/// Default error handler: recover the structured error body when the
/// response carries one, otherwise wrap the raw outcome; either way the
/// fault's context is decorated with the request metadata.
pub fn default_error_handler(ctx: ErrorContext) -> ServiceFault {
    let completed = &ctx.completed;
    let status = completed.status_code();

    let mut fault = match completed.body().and_then(|b| ErrorBody::decode(&b)) {
        Some(body) => body.into_fault(),
        None => {
            let body_text = completed
                .body()
                .map(|b| b.to_string())
                .unwrap_or_else(|| "<empty>".to_string());
            ServiceFault::new(format!(
                "unable to complete {} on {}: status {status}, body {body_text}",
                completed.action(),
                completed.uri()
            ))
            .with_status(status)
            .with_cause(ctx.fault.clone())
        }
    };
    if fault.status_code == 0 {
        fault.status_code = status;
    }

    fault = fault
        .with_context(context_keys::URI, json!(completed.uri()))
        .with_context(context_keys::ACTION, json!(completed.action().as_str()))
        .with_context(context_keys::REFERER, json!(completed.referer()))
        .with_context(context_keys::RETRY_COUNT, json!(completed.retry_count()))
        .with_context(context_keys::RETRIES_REMAINING, json!(completed.retries_remaining()));

    let response_headers = completed.response_headers();
    if !response_headers.is_empty() {
        fault = fault.with_context(context_keys::RESPONSE_HEADERS, json!(response_headers));
    }
    let cookies = completed.cookies();
    if !cookies.is_empty() {
        fault = fault.with_context(context_keys::COOKIES, json!(cookies));
    }
    if let Some(context_id) = completed.context_id() {
        fault = fault.with_context(context_keys::CONTEXT_ID, json!(context_id));
    }
    if let Some(expiration) = completed.expiration_micros() {
        fault = fault.with_context(context_keys::EXPIRATION_MICROS, json!(expiration));
    }

    warn!(
        action = %completed.action(),
        uri = %completed.uri(),
        status = fault.status_code,
        error_code = fault.error_code,
        "request failed"
    );
    fault
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamType;
    use crate::spec::{ParamSpec, ReturnSpec};

    struct DropSender;

    impl RequestSender for DropSender {
        fn send(&self, _op: Operation) {}
    }

    fn sample_consumer() -> ServiceConsumer {
        ServiceConsumer::builder()
            .contract(vec![
                RouteSpec::get("find_document")
                    .path("/documents/{id}")
                    .param(ParamSpec::path("id", ParamType::Str))
                    .param(ParamSpec::query("expand", ParamType::Bool))
                    .param(ParamSpec::query("tags", ParamType::StrList))
                    .param(ParamSpec::header("x-tenant", ParamType::Str))
                    .param(ParamSpec::cookie("session", ParamType::Str))
                    .returns(ReturnSpec::future(ShapeSpec::Scalar("Doc"))),
                RouteSpec::post("create_document")
                    .path("/documents")
                    .param(ParamSpec::body())
                    .param(ParamSpec::directive())
                    .returns(ReturnSpec::future(ShapeSpec::Scalar("Doc"))),
            ])
            .contract_path("/demo")
            .sender(Arc::new(DropSender))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_operation_substitutes_and_encodes() {
        let consumer = sample_consumer();
        let descriptor = consumer.descriptor("find_document").unwrap();

        let op = consumer
            .build_operation(
                &descriptor,
                &[
                    ArgValue::Str("doc one".into()),
                    ArgValue::Bool(true),
                    ArgValue::StrList(vec!["a".into(), "b".into()]),
                    ArgValue::Str("tenant-1".into()),
                    ArgValue::Absent,
                ],
            )
            .unwrap();

        assert_eq!(op.path(), "/demo/documents/doc one");
        assert_eq!(op.query().as_deref(), Some("expand=true&tags=a&tags=b"));
        assert_eq!(op.request_header("x-tenant").as_deref(), Some("tenant-1"));
        assert!(op.cookie("session").is_none());
    }

    #[test]
    fn test_build_operation_skips_absent() {
        let consumer = sample_consumer();
        let descriptor = consumer.descriptor("create_document").unwrap();

        let op = consumer
            .build_operation(&descriptor, &[ArgValue::Absent, ArgValue::Absent])
            .unwrap();
        assert!(!op.has_body());
        assert!(op.pragma_directives().is_empty());
        assert!(op.query().is_none());

        let op = consumer
            .build_operation(
                &descriptor,
                &[
                    ArgValue::Json(json!({ "name": "a" })),
                    ArgValue::StrList(vec!["no-index".into()]),
                ],
            )
            .unwrap();
        assert_eq!(op.body().unwrap(), json!({ "name": "a" }));
        assert!(op.has_pragma_directive("no-index"));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let consumer = sample_consumer();
        let descriptor = consumer.descriptor("create_document").unwrap();
        let err = consumer.build_operation(&descriptor, &[]).unwrap_err();
        assert!(err.message.contains("expects 2 arguments"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let consumer = sample_consumer();
        let err = consumer.invoke::<Value>("missing", Vec::new()).await.unwrap_err();
        assert!(err.message.contains("unknown contract method"));
    }

    #[test]
    fn test_empty_value_synthesis() {
        assert_eq!(empty_value(ResultContainer::List), json!([]));
        assert_eq!(empty_value(ResultContainer::Set), json!([]));
        assert_eq!(empty_value(ResultContainer::Map), json!({}));
        assert_eq!(empty_value(ResultContainer::Plain), Value::Null);
    }

    #[test]
    fn test_default_error_handler_decodes_structured_bodies() {
        let source = Operation::get("/demo/documents/1");
        let completed = Operation::get("/demo/documents/1");
        completed.set_referer("/consumer");
        let server_fault = ServiceFault::new("missing document")
            .with_status(404)
            .with_error_code(1234);
        completed.set_status_code(404);
        completed.set_body(serde_json::to_value(ErrorBody::from_fault(&server_fault)).unwrap());

        let fault = default_error_handler(ErrorContext {
            source,
            completed,
            fault: server_fault.clone(),
        });

        assert_eq!(fault.status_code, 404);
        assert_eq!(fault.error_code, 1234);
        assert_eq!(fault.message, "missing document");
        assert_eq!(fault.context_value(context_keys::URI).unwrap(), &json!("/demo/documents/1"));
        assert_eq!(fault.context_value(context_keys::ACTION).unwrap(), &json!("GET"));
    }

    #[test]
    fn test_default_error_handler_wraps_raw_bodies() {
        let source = Operation::get("/demo/documents/1");
        let completed = Operation::get("/demo/documents/1");
        completed.set_status_code(502);
        completed.set_body(json!("upstream gone"));

        let fault = default_error_handler(ErrorContext {
            source,
            completed,
            fault: ServiceFault::new("transport failed"),
        });

        assert_eq!(fault.status_code, 502);
        assert!(fault.message.contains("upstream gone"));
        assert_eq!(fault.cause.as_ref().unwrap().message, "transport failed");
    }
}
