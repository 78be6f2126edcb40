// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod errors;
pub mod fault;
pub mod host;
pub mod operation;
pub mod uri;

pub use errors::RuntimeError;
pub use fault::{DEFAULT_ERROR_CODE, ErrorBody, INTERNAL_ERROR_CODE, ServiceFault, context_keys};
pub use host::{LoopbackSender, RequestHandler, RequestSender, ServiceHost, ServiceOptions};
pub use operation::{Action, Operation};
