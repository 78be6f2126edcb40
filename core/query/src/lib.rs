// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Document query tasks with paginated result streaming
//!
//! Query tasks execute against the document query service through the
//! routing contract tables; paged results come back as link-chained
//! pages wrapped by [`PagedStream`] for aggregate traversal.

pub mod client;
pub mod page;
pub mod stream;
pub mod task;
pub mod template;

pub use client::{DocumentQueryClient, QUERY_SERVICE_PATH, contract_specs};
pub use page::{DocumentDecoder, Page};
pub use stream::PagedStream;
pub use task::{
    DEFAULT_PAGE_LIMIT, DEFAULT_RESULT_LIMIT, OrderBy, OrderKind, QueryResults, QuerySpec,
    QueryTask,
};
pub use template::{LIMIT_ARG, PagedQueryTemplate, QueryTemplate, filter_criteria};
