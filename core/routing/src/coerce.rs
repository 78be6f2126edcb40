// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Wire-string coercion
//!
//! Query parameters, headers, cookies, path tokens and default-value
//! literals arrive as strings and are coerced through the parameter's
//! declared type: direct for strings, parsed for primitives, wrapped as a
//! single-element list for list types, parsed as JSON for JSON types. A
//! value that does not coerce yields nothing; the caller decides between
//! default and absent.

use tracing::debug;

use crate::descriptor::{ArgValue, ParamType};

/// Coerce one wire string through a declared type.
pub fn from_wire(raw: &str, declared: ParamType) -> Option<ArgValue> {
    let coerced = match declared {
        ParamType::Str => Some(ArgValue::Str(raw.to_string())),
        ParamType::I32 => raw.parse().ok().map(ArgValue::I32),
        ParamType::I64 => raw.parse().ok().map(ArgValue::I64),
        ParamType::F64 => raw.parse().ok().map(ArgValue::F64),
        ParamType::Bool => raw.parse().ok().map(ArgValue::Bool),
        ParamType::StrList => Some(ArgValue::StrList(vec![raw.to_string()])),
        ParamType::Json => serde_json::from_str(raw).ok().map(ArgValue::Json),
        ParamType::Operation => None,
    };
    if coerced.is_none() {
        debug!(%raw, ?declared, "wire value does not coerce to the declared type");
    }
    coerced
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_string() {
        assert_eq!(from_wire("plain", ParamType::Str), Some(ArgValue::Str("plain".into())));
    }

    #[test]
    fn test_primitive_parse() {
        assert_eq!(from_wire("2", ParamType::I32), Some(ArgValue::I32(2)));
        assert_eq!(from_wire("-9", ParamType::I64), Some(ArgValue::I64(-9)));
        assert_eq!(from_wire("1.5", ParamType::F64), Some(ArgValue::F64(1.5)));
        assert_eq!(from_wire("true", ParamType::Bool), Some(ArgValue::Bool(true)));
        assert_eq!(from_wire("x", ParamType::I32), None);
    }

    #[test]
    fn test_single_element_list_wrap() {
        assert_eq!(
            from_wire("one", ParamType::StrList),
            Some(ArgValue::StrList(vec!["one".into()]))
        );
    }

    #[test]
    fn test_json_parse() {
        assert_eq!(from_wire("{\"a\":1}", ParamType::Json), Some(ArgValue::Json(json!({"a": 1}))));
        assert_eq!(from_wire("not json", ParamType::Json), None);
    }
}
