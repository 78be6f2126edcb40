// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Test fixtures for Trellis
//!
//! Provides a sample document contract, an in-memory store serving it and
//! the query contract, and an assembled in-process environment.

pub mod contract;
pub mod docs;
pub mod env;
pub mod store;

pub use contract::{SAMPLE_SERVICE_PATH, sample_contract};
pub use docs::{SAMPLE_DOCUMENT_KIND, SampleDocument};
pub use env::TestEnv;
pub use store::{DocumentStore, NOT_FOUND_ERROR_CODE};
