// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side operation interceptors
//!
//! Interceptors observe and rewrite outbound operations before they are
//! handed to the sender, and the completed outcome before it is decoded.
//! `before_send` hooks run in registration order, `after_complete` hooks in
//! reverse order.

use std::sync::Arc;

use trellis_runtime::{Operation, ServiceFault};

/// Outcome of a completed call: the completed operation plus its failure,
/// if any.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    pub operation: Operation,
    pub fault: Option<ServiceFault>,
}

pub trait OperationInterceptor: Send + Sync {
    fn before_send(&self, op: Operation) -> Operation {
        op
    }

    fn after_complete(&self, _sent: &Operation, outcome: CompletedCall) -> CompletedCall {
        outcome
    }
}

/// Ordered set of interceptors applied around every invocation.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn OperationInterceptor>>,
}

impl InterceptorChain {
    pub fn push(&mut self, interceptor: Arc<dyn OperationInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn before_send(&self, op: Operation) -> Operation {
        self.interceptors.iter().fold(op, |op, i| i.before_send(op))
    }

    pub fn after_complete(&self, sent: &Operation, outcome: CompletedCall) -> CompletedCall {
        self.interceptors
            .iter()
            .rev()
            .fold(outcome, |outcome, i| i.after_complete(sent, outcome))
    }
}
