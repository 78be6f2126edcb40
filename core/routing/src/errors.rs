// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors raised while building descriptors from route specs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("cannot classify parameter {index} of {method}: no role marker and not the request-handle type")]
    Unclassifiable { method: String, index: usize },

    #[error("{0} declares more than one body parameter")]
    DuplicateBody(String),

    #[error("{0} declares more than one request-handle parameter")]
    DuplicateContext(String),
}

/// Errors raised while assembling a routing table.
#[derive(Error, Debug)]
pub enum RouterBuildError {
    #[error("service at {0} does not own its URI namespace")]
    NotNamespaceOwner(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Errors raised while building a service consumer.
#[derive(Error, Debug)]
pub enum ConsumerBuildError {
    #[error("no contract specs supplied")]
    NoContract,

    #[error("no sender and no host to derive one from")]
    NoSender,

    #[error("contract declares {0} twice")]
    DuplicateMethod(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}
