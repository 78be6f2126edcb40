// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Path and query-string helpers shared by the dispatch layers
//!
//! Request URIs are host-relative: an absolute path, optionally followed by a
//! `?query` suffix. Paths are compared in normalized form (single slashes, no
//! trailing slash).

use std::collections::HashMap;

use url::form_urlencoded;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Separator between the path and the query string.
pub const QUERY_SEPARATOR: char = '?';

/// Normalize a path: force a leading slash, collapse duplicate slashes and
/// strip the trailing one. The root path stays `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for token in split_tokens(path) {
        out.push(PATH_SEPARATOR);
        out.push_str(token);
    }
    if out.is_empty() {
        out.push(PATH_SEPARATOR);
    }
    out
}

/// Join a base path and a sub-path with a single separator, normalized.
pub fn build_path(base: &str, segment: &str) -> String {
    let mut joined = String::with_capacity(base.len() + segment.len() + 1);
    joined.push_str(base);
    joined.push(PATH_SEPARATOR);
    joined.push_str(segment);
    normalize_path(&joined)
}

/// Split a path into its non-empty segments.
pub fn split_tokens(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|t| !t.is_empty())
}

/// Number of non-empty segments in a path.
pub fn token_count(path: &str) -> usize {
    split_tokens(path).count()
}

/// Split a request URI into its path and optional raw query string.
pub fn split_query(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once(QUERY_SEPARATOR) {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

/// Decode a raw query string into a map. Later duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Append encoded query pairs to a URI, extending an existing query string
/// when one is already present.
pub fn extend_uri_with_query(uri: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return uri.to_string();
    }

    let mut encoder = form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        encoder.append_pair(name, value);
    }
    let encoded = encoder.finish();

    let separator = if uri.contains(QUERY_SEPARATOR) { '&' } else { QUERY_SEPARATOR };
    format!("{uri}{separator}{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b"), "/a/b");
        assert_eq!(normalize_path("a/b/"), "/a/b");
        assert_eq!(normalize_path("//a///b//"), "/a/b");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_build_path() {
        assert_eq!(build_path("/base", "child"), "/base/child");
        assert_eq!(build_path("/base/", "/child/"), "/base/child");
        assert_eq!(build_path("", "child"), "/child");
        assert_eq!(build_path("/base", ""), "/base");
    }

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/a/b?x=1&y=2"), ("/a/b", Some("x=1&y=2")));
        assert_eq!(split_query("/a/b"), ("/a/b", None));
    }

    #[test]
    fn test_parse_query() {
        let map = parse_query("x=1&y=two%20words&x=3");
        assert_eq!(map.get("x").map(String::as_str), Some("3"));
        assert_eq!(map.get("y").map(String::as_str), Some("two words"));
    }

    #[test]
    fn test_extend_uri_with_query() {
        let uri = extend_uri_with_query("/a", &[("x".into(), "1".into())]);
        assert_eq!(uri, "/a?x=1");

        let uri = extend_uri_with_query(&uri, &[("y".into(), "two words".into())]);
        assert_eq!(uri, "/a?x=1&y=two+words");

        assert_eq!(extend_uri_with_query("/a", &[]), "/a");
    }
}
