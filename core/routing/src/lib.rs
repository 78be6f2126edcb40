// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative method-to-request routing
//!
//! Service contracts declare their methods as route specs. A descriptor
//! builder turns each spec into a route descriptor, routers dispatch
//! inbound operations to handlers through those descriptors, and service
//! consumers assemble outbound operations from the same tables.

pub mod builder;
pub mod coerce;
pub mod consumer;
pub mod descriptor;
pub mod errors;
pub mod interceptor;
pub mod matcher;
pub mod router;
pub mod spec;
pub mod validate;

pub use builder::DescriptorBuilder;
pub use consumer::{
    ConsumerBuilder, ErrorContext, ErrorHandler, ResponseDecoder, ServiceConsumer,
    default_error_handler,
};
pub use descriptor::{
    ArgValue, BodyValidator, ParamBinding, ParamRole, ParamType, ResultContainer, ResultShape,
    RouteDescriptor,
};
pub use errors::{ConsumerBuildError, DescriptorError, RouterBuildError};
pub use interceptor::{CompletedCall, InterceptorChain, OperationInterceptor};
pub use matcher::UriMatcher;
pub use router::{HandlerReply, RouteHandler, Router, RouterBuilder};
pub use spec::{ParamSpec, ReturnSpec, RoleMarker, RouteSpec, ShapeSpec};
pub use validate::{VIOLATIONS_KEY, ValidateBody, Violation, decode_and_validate};
