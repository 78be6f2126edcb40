// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Sample document-service contract
//!
//! One route per dispatch flavor: templated paths, query defaults,
//! validated bodies, a context method owning its own completion, and a
//! sync/async pair sharing a result shape.

use serde_json::Value;

use trellis_routing::{
    ParamSpec, ParamType, ReturnSpec, RouteSpec, ShapeSpec, Violation, decode_and_validate,
};

use crate::docs::SampleDocument;

/// Mount path of the sample document service.
pub const SAMPLE_SERVICE_PATH: &str = "/demo";

fn validate_sample_document(body: &Value) -> Vec<Violation> {
    decode_and_validate::<SampleDocument>(body)
}

/// Method table of the sample document service.
pub fn sample_contract() -> Vec<RouteSpec> {
    vec![
        RouteSpec::get("list_documents")
            .param(ParamSpec::query("limit", ParamType::I32).with_default("2"))
            .returns(ReturnSpec::future(ShapeSpec::List("SampleDocument"))),
        RouteSpec::get("find_document")
            .path("/documents/{id}")
            .param(ParamSpec::path("id", ParamType::Str))
            .param(ParamSpec::header("x-tenant", ParamType::Str))
            .param(ParamSpec::cookie("session", ParamType::Str))
            .returns(ReturnSpec::future(ShapeSpec::Scalar("SampleDocument"))),
        RouteSpec::post("create_document")
            .path("/documents")
            .param(ParamSpec::body().with_validator(validate_sample_document))
            .returns(ReturnSpec::future(ShapeSpec::Scalar("SampleDocument"))),
        RouteSpec::delete("delete_document")
            .path("/documents/{id}")
            .param(ParamSpec::path("id", ParamType::Str))
            .returns(ReturnSpec::future(ShapeSpec::Unit)),
        RouteSpec::patch("rename_document")
            .path("/documents/{id}")
            .param(ParamSpec::path("id", ParamType::Str))
            .param(ParamSpec::query("name", ParamType::Str))
            .param(ParamSpec::operation()),
        RouteSpec::get("stats")
            .path("/stats")
            .returns(ReturnSpec::value(ShapeSpec::Map("u64"))),
        RouteSpec::get("stats_async")
            .path("/stats/async")
            .returns(ReturnSpec::future(ShapeSpec::Map("u64"))),
    ]
}
