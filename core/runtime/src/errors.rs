// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("a service is already registered at {0}")]
    AlreadyRegistered(String),

    #[error("request carries no body")]
    MissingBody,

    #[error("failed to decode request body: {0}")]
    BodyDecode(#[source] serde_json::Error),

    #[error("failed to encode body: {0}")]
    BodyEncode(#[source] serde_json::Error),

    #[error("unknown action: {0}")]
    UnknownAction(String),
}
