// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative route markers
//!
//! A service contract is declared as a table of [`RouteSpec`] entries, one
//! per method: the action, the URI template, the role of every parameter in
//! declaration order and the declared result. The descriptor builder turns
//! these tables into [`RouteDescriptor`]s; both dispatchers consume only the
//! built descriptors.
//!
//! [`RouteDescriptor`]: crate::descriptor::RouteDescriptor

use trellis_runtime::Action;

use crate::descriptor::{BodyValidator, ParamType};

/// Explicit role marker on a parameter. Parameters without a marker are
/// classified by their declared type: the request-handle type becomes the
/// context parameter, anything else is a declaration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMarker {
    Path(&'static str),
    Query(&'static str),
    Header(&'static str),
    Cookie(&'static str),
    Body,
    Directive,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub(crate) marker: Option<RoleMarker>,
    pub(crate) declared: ParamType,
    pub(crate) default_value: Option<&'static str>,
    pub(crate) validator: Option<BodyValidator>,
}

impl ParamSpec {
    fn marked(marker: RoleMarker, declared: ParamType) -> Self {
        Self { marker: Some(marker), declared, default_value: None, validator: None }
    }

    pub fn path(name: &'static str, declared: ParamType) -> Self {
        Self::marked(RoleMarker::Path(name), declared)
    }

    pub fn query(name: &'static str, declared: ParamType) -> Self {
        Self::marked(RoleMarker::Query(name), declared)
    }

    pub fn header(name: &'static str, declared: ParamType) -> Self {
        Self::marked(RoleMarker::Header(name), declared)
    }

    pub fn cookie(name: &'static str, declared: ParamType) -> Self {
        Self::marked(RoleMarker::Cookie(name), declared)
    }

    pub fn body() -> Self {
        Self::marked(RoleMarker::Body, ParamType::Json)
    }

    pub fn directive() -> Self {
        Self::marked(RoleMarker::Directive, ParamType::StrList)
    }

    /// Unmarked parameter of the request-handle type; classified as the
    /// context parameter.
    pub fn operation() -> Self {
        Self { marker: None, declared: ParamType::Operation, default_value: None, validator: None }
    }

    /// Unmarked parameter of an arbitrary type. Only valid for the
    /// request-handle type; anything else fails descriptor building.
    pub fn unmarked(declared: ParamType) -> Self {
        Self { marker: None, declared, default_value: None, validator: None }
    }

    /// Default-value literal, coerced through the declared type at build
    /// time.
    pub fn with_default(mut self, literal: &'static str) -> Self {
        self.default_value = Some(literal);
        self
    }

    /// Attach a body validation hook.
    pub fn with_validator(mut self, validator: BodyValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Declared result shape. `Var` stands for a generic type variable resolved
/// through builder hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeSpec {
    Unit,
    Scalar(&'static str),
    List(&'static str),
    Set(&'static str),
    Map(&'static str),
    Array(&'static str),
    Var(&'static str),
    Opaque,
}

/// Declared return of a route: the shape, optionally wrapped in a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnSpec {
    pub(crate) is_async: bool,
    pub(crate) shape: ShapeSpec,
}

impl ReturnSpec {
    /// Synchronous method without a result.
    pub fn unit() -> Self {
        Self { is_async: false, shape: ShapeSpec::Unit }
    }

    /// Synchronous method returning a value.
    pub fn value(shape: ShapeSpec) -> Self {
        Self { is_async: false, shape }
    }

    /// Asynchronous method resolving to a value (or to nothing with
    /// [`ShapeSpec::Unit`]).
    pub fn future(shape: ShapeSpec) -> Self {
        Self { is_async: true, shape }
    }
}

/// One declared route.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub(crate) name: &'static str,
    pub(crate) action: Option<Action>,
    pub(crate) path: Option<&'static str>,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) returns: ReturnSpec,
}

impl RouteSpec {
    /// Method without an action marker; skipped by the descriptor builder.
    pub fn unrouted(name: &'static str) -> Self {
        Self { name, action: None, path: None, params: Vec::new(), returns: ReturnSpec::unit() }
    }

    pub fn new(name: &'static str, action: Action) -> Self {
        Self { name, action: Some(action), path: None, params: Vec::new(), returns: ReturnSpec::unit() }
    }

    pub fn get(name: &'static str) -> Self {
        Self::new(name, Action::Get)
    }

    pub fn post(name: &'static str) -> Self {
        Self::new(name, Action::Post)
    }

    pub fn put(name: &'static str) -> Self {
        Self::new(name, Action::Put)
    }

    pub fn patch(name: &'static str) -> Self {
        Self::new(name, Action::Patch)
    }

    pub fn delete(name: &'static str) -> Self {
        Self::new(name, Action::Delete)
    }

    /// URI template relative to the service path, `{name}` placeholders
    /// allowed.
    pub fn path(mut self, template: &'static str) -> Self {
        self.path = Some(template);
        self
    }

    /// Append a parameter. Declaration order defines the parameter index.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, returns: ReturnSpec) -> Self {
        self.returns = returns;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
