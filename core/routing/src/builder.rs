// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Descriptor builder
//!
//! Turns declarative [`RouteSpec`] tables into [`RouteDescriptor`]s.
//! Classification is strict: a parameter that cannot be assigned a role is
//! a declaration error, surfaced at build time rather than at dispatch.
//! Building is a pure function of the specs and hints; the same input
//! always produces identical descriptors.

use std::collections::HashMap;

use tracing::debug;

use crate::coerce;
use crate::descriptor::{
    ArgValue, ParamBinding, ParamRole, ParamType, ResultContainer, ResultShape, RouteDescriptor,
};
use crate::errors::DescriptorError;
use crate::matcher;
use crate::spec::{ParamSpec, ReturnSpec, RoleMarker, RouteSpec, ShapeSpec};

/// Builds route descriptors, resolving generic result shapes through hints.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    hints: HashMap<&'static str, ShapeSpec>,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a generic type variable to a concrete shape.
    pub fn hint(mut self, var: &'static str, shape: ShapeSpec) -> Self {
        self.hints.insert(var, shape);
        self
    }

    /// Build descriptors for every action-carrying spec, in table order.
    pub fn build_all(&self, specs: &[RouteSpec]) -> Result<Vec<RouteDescriptor>, DescriptorError> {
        let mut descriptors = Vec::with_capacity(specs.len());
        for spec in specs {
            if let Some(descriptor) = self.build(spec)? {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    /// Build the descriptor for one spec. Specs without an action marker
    /// are not routable and yield `None`.
    pub fn build(&self, spec: &RouteSpec) -> Result<Option<RouteDescriptor>, DescriptorError> {
        let Some(action) = spec.action else {
            debug!(method = spec.name, "skipping method without an action marker");
            return Ok(None);
        };

        let template = spec.path.map(trellis_runtime::uri::normalize_path);
        let path_param_index = template
            .as_deref()
            .map(matcher::parse_path_params)
            .unwrap_or_default();

        let mut params = Vec::with_capacity(spec.params.len());
        for (index, param) in spec.params.iter().enumerate() {
            params.push(self.build_param(spec, index, param)?);
        }
        params.sort_by_key(|p: &ParamBinding| p.index);

        if params.iter().filter(|p| p.role == ParamRole::Body).count() > 1 {
            return Err(DescriptorError::DuplicateBody(spec.name.to_string()));
        }
        if params.iter().filter(|p| p.role == ParamRole::Context).count() > 1 {
            return Err(DescriptorError::DuplicateContext(spec.name.to_string()));
        }

        Ok(Some(RouteDescriptor {
            name: spec.name.to_string(),
            action,
            template,
            path_param_index,
            params,
            result: self.resolve_result(&spec.returns),
        }))
    }

    fn build_param(
        &self,
        spec: &RouteSpec,
        index: usize,
        param: &ParamSpec,
    ) -> Result<ParamBinding, DescriptorError> {
        let (role, name) = classify(spec, index, param)?;

        let default = param.default_value.and_then(|literal| {
            let coerced = coerce::from_wire(literal, param.declared);
            if coerced.is_none() {
                debug!(
                    method = spec.name,
                    index,
                    literal,
                    "default value does not coerce, leaving unset"
                );
            }
            coerced
        });

        Ok(ParamBinding {
            role,
            name,
            index,
            declared: param.declared,
            default,
            validator: param.validator,
        })
    }

    fn resolve_result(&self, returns: &ReturnSpec) -> ResultShape {
        let shape = match returns.shape {
            ShapeSpec::Var(var) => match self.hints.get(var) {
                Some(ShapeSpec::Var(_)) | None => {
                    debug!(var, "unresolved generic result shape");
                    ShapeSpec::Opaque
                }
                Some(concrete) => *concrete,
            },
            other => other,
        };

        let (container, element, is_void) = match shape {
            ShapeSpec::Unit => (ResultContainer::Plain, None, true),
            ShapeSpec::Scalar(e) => (ResultContainer::Plain, Some(e), false),
            ShapeSpec::List(e) => (ResultContainer::List, Some(e), false),
            ShapeSpec::Set(e) => (ResultContainer::Set, Some(e), false),
            ShapeSpec::Map(e) => (ResultContainer::Map, Some(e), false),
            ShapeSpec::Array(e) => (ResultContainer::Array, Some(e), false),
            ShapeSpec::Opaque | ShapeSpec::Var(_) => (ResultContainer::Opaque, None, false),
        };

        ResultShape {
            is_async: returns.is_async,
            container,
            element: element.map(str::to_string),
            is_void,
        }
    }
}

fn classify(
    spec: &RouteSpec,
    index: usize,
    param: &ParamSpec,
) -> Result<(ParamRole, String), DescriptorError> {
    match param.marker {
        Some(RoleMarker::Path(name)) => Ok((ParamRole::Path, name.to_string())),
        Some(RoleMarker::Query(name)) => Ok((ParamRole::Query, name.to_string())),
        Some(RoleMarker::Header(name)) => Ok((ParamRole::Header, name.to_string())),
        Some(RoleMarker::Cookie(name)) => Ok((ParamRole::Cookie, name.to_string())),
        Some(RoleMarker::Body) => Ok((ParamRole::Body, String::new())),
        Some(RoleMarker::Directive) => Ok((ParamRole::Directive, String::new())),
        None if param.declared == ParamType::Operation => {
            Ok((ParamRole::Context, String::new()))
        }
        None => Err(DescriptorError::Unclassifiable {
            method: spec.name.to_string(),
            index,
        }),
    }
}
