// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Built route descriptors
//!
//! A [`RouteDescriptor`] is the immutable, declaration-order product of the
//! descriptor builder: where each argument of a target method comes from on
//! the wire, and what the method returns. Descriptors are plain data; they
//! carry no callable references and can be shared freely between the server
//! and client dispatchers.

use std::collections::HashMap;

use serde_json::Value;

use trellis_runtime::{Action, Operation};

use crate::validate::Violation;

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Path template placeholder.
    Path,
    /// Query-string parameter.
    Query,
    /// Request header.
    Header,
    /// Request cookie.
    Cookie,
    /// Request body.
    Body,
    /// The request handle itself; the target method owns completion.
    Context,
    /// Out-of-band pragma directives.
    Directive,
}

/// Declared parameter type, used to coerce wire strings and default values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    I32,
    I64,
    F64,
    Bool,
    StrList,
    Json,
    /// The request handle type.
    Operation,
}

/// Validation hook attached to a body parameter.
pub type BodyValidator = fn(&Value) -> Vec<Violation>;

/// Runtime argument handed to a route handler, one per declared parameter.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Str(String),
    I32(i32),
    I64(i64),
    F64(f64),
    Bool(bool),
    StrList(Vec<String>),
    Json(Value),
    Op(Operation),
    /// No wire value and no default.
    Absent,
}

impl ArgValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ArgValue::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ArgValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::I64(v) => Some(*v),
            ArgValue::I32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            ArgValue::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_operation(&self) -> Option<Operation> {
        match self {
            ArgValue::Op(op) => Some(op.clone()),
            _ => None,
        }
    }

    /// Render the value for path or single-valued query/header slots.
    pub fn to_wire_string(&self) -> Option<String> {
        match self {
            ArgValue::Str(s) => Some(s.clone()),
            ArgValue::I32(v) => Some(v.to_string()),
            ArgValue::I64(v) => Some(v.to_string()),
            ArgValue::F64(v) => Some(v.to_string()),
            ArgValue::Bool(v) => Some(v.to_string()),
            ArgValue::StrList(v) => Some(v.join(",")),
            ArgValue::Json(Value::String(s)) => Some(s.clone()),
            ArgValue::Json(v) => Some(v.to_string()),
            ArgValue::Op(_) | ArgValue::Absent => None,
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Str(a), ArgValue::Str(b)) => a == b,
            (ArgValue::I32(a), ArgValue::I32(b)) => a == b,
            (ArgValue::I64(a), ArgValue::I64(b)) => a == b,
            (ArgValue::F64(a), ArgValue::F64(b)) => a == b,
            (ArgValue::Bool(a), ArgValue::Bool(b)) => a == b,
            (ArgValue::StrList(a), ArgValue::StrList(b)) => a == b,
            (ArgValue::Json(a), ArgValue::Json(b)) => a == b,
            (ArgValue::Absent, ArgValue::Absent) => true,
            _ => false,
        }
    }
}

/// One parameter of a built descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBinding {
    pub role: ParamRole,
    /// Wire name. Empty for body, context and directive parameters.
    pub name: String,
    /// Position in the target method's declared parameter order.
    pub index: usize,
    pub declared: ParamType,
    /// Default applied when the wire carries no value, already coerced.
    pub default: Option<ArgValue>,
    /// Body validation hook, body parameters only.
    pub validator: Option<BodyValidator>,
}

/// Container kind of a declared result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContainer {
    /// Single value.
    Plain,
    List,
    Set,
    Map,
    Array,
    /// Unresolvable element type; decoded as a raw JSON value.
    Opaque,
}

/// Declared result of a route: async wrapping, container kind and the
/// nominal element type, plus whether the method returns nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultShape {
    pub is_async: bool,
    pub container: ResultContainer,
    pub element: Option<String>,
    pub is_void: bool,
}

impl ResultShape {
    pub fn void(is_async: bool) -> Self {
        Self { is_async, container: ResultContainer::Plain, element: None, is_void: true }
    }
}

/// Built descriptor for one routable method.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    /// Target method name, used for lookup and diagnostics.
    pub name: String,
    pub action: Action,
    /// Normalized URI template relative to the service path, when declared.
    pub template: Option<String>,
    /// Placeholder name to token position within the template.
    pub path_param_index: HashMap<String, usize>,
    /// Bindings ordered by parameter index.
    pub params: Vec<ParamBinding>,
    pub result: ResultShape,
}

impl RouteDescriptor {
    pub fn body_param(&self) -> Option<&ParamBinding> {
        self.params.iter().find(|p| p.role == ParamRole::Body)
    }

    pub fn context_param(&self) -> Option<&ParamBinding> {
        self.params.iter().find(|p| p.role == ParamRole::Context)
    }
}
