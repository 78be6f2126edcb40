// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! URI template matching
//!
//! Templates without placeholders compare as normalized strings. Templates
//! with `{name}` placeholders match structurally: equal token count,
//! literal tokens equal, placeholder tokens match any non-empty token.

use std::collections::HashMap;

use trellis_runtime::uri;

/// Matcher for one registered route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriMatcher {
    Exact(String),
    Tokens(Vec<String>),
}

impl UriMatcher {
    pub fn new(path: &str) -> Self {
        if path.contains('{') {
            UriMatcher::Tokens(uri::split_tokens(path).map(str::to_string).collect())
        } else {
            UriMatcher::Exact(uri::normalize_path(path))
        }
    }

    /// Match a normalized request path against this matcher.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UriMatcher::Exact(exact) => exact == path,
            UriMatcher::Tokens(pattern) => {
                let tokens: Vec<&str> = uri::split_tokens(path).collect();
                tokens.len() == pattern.len()
                    && pattern
                        .iter()
                        .zip(&tokens)
                        .all(|(p, t)| is_placeholder(p) || p == t)
            }
        }
    }
}

/// True for `{name}` tokens.
pub fn is_placeholder(token: &str) -> bool {
    token.len() > 2 && token.starts_with('{') && token.ends_with('}')
}

/// Placeholder name to token position for a template.
pub fn parse_path_params(template: &str) -> HashMap<String, usize> {
    uri::split_tokens(template)
        .enumerate()
        .filter(|(_, token)| is_placeholder(token))
        .map(|(index, token)| (token[1..token.len() - 1].to_string(), index))
        .collect()
}
