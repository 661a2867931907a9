//! Segment-wise path matching and typed query predicates.
//!
//! A pattern such as `/users/:id?sort=str` matches a request when
//!
//! - both paths have the same number of `/`-separated segments,
//! - every literal segment is equal and every `:name` segment is non-empty,
//! - every query key in the pattern is present in the request and its value
//!   satisfies the predicate (`int`, `str`, `*` or a literal).
//!
//! Trailing empty segments are ignored, so `/json/` and `/json` line up.

use std::collections::HashMap;

use crate::http::parser::parse_query;

pub fn path_only(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}

pub fn query_only(target: &str) -> &str {
    target.split_once('?').map_or("", |(_, query)| query)
}

pub fn segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').collect();
    while segments.last().is_some_and(|segment| segment.is_empty()) {
        segments.pop();
    }
    segments
}

/// Full match of a route (`route_method` plus `pattern`) against a request's
/// method, path and parsed query.
pub fn matches(
    route_method: &str,
    pattern: &str,
    method: &str,
    path: &str,
    query: &HashMap<String, String>,
) -> bool {
    route_method == method && path_matches(pattern, path) && query_matches(pattern, query)
}

/// Compares the path part of `pattern` against the path part of `path`.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let expected = segments(path_only(pattern));
    let actual = segments(path_only(path));

    expected.len() == actual.len()
        && expected.iter().zip(&actual).all(|(expected, actual)| {
            if expected.starts_with(':') {
                !actual.is_empty()
            } else {
                expected == actual
            }
        })
}

/// Checks every `key=type` predicate of the pattern's query string against
/// the request's query map. Keys not named by the pattern are ignored.
pub fn query_matches(pattern: &str, query: &HashMap<String, String>) -> bool {
    parse_query(query_only(pattern))
        .iter()
        .all(|(key, predicate)| query.get(key).is_some_and(|value| satisfies(predicate, value)))
}

/// `int`: optional minus then digits. `str`: ASCII letters or underscores.
/// `*`: anything, including empty. Otherwise the literal value.
pub fn satisfies(predicate: &str, value: &str) -> bool {
    match predicate {
        "int" => {
            let digits = value.strip_prefix('-').unwrap_or(value);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        "str" => !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_'),
        "*" => true,
        literal => literal == value,
    }
}

/// Binds each `:name` segment of `pattern` to the segment at the same
/// position in `path`. Positions missing from `path` are left unbound.
pub fn bind_params(pattern: &str, path: &str) -> HashMap<String, String> {
    let actual = segments(path_only(path));
    segments(path_only(pattern))
        .iter()
        .enumerate()
        .filter_map(|(index, segment)| {
            let name = segment.strip_prefix(':')?;
            let value = actual.get(index)?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_int_predicate() {
        assert!(satisfies("int", "-3"));
        assert!(satisfies("int", "42"));
        assert!(!satisfies("int", "3.5"));
        assert!(!satisfies("int", "abc"));
        assert!(!satisfies("int", "-"));
        assert!(!satisfies("int", ""));
    }

    #[test]
    fn test_str_predicate() {
        assert!(satisfies("str", "abc"));
        assert!(satisfies("str", "snake_case"));
        assert!(!satisfies("str", "abc1"));
        assert!(!satisfies("str", ""));
    }

    #[test]
    fn test_wildcard_and_literal_predicates() {
        assert!(satisfies("*", ""));
        assert!(satisfies("*", "anything 1"));
        assert!(satisfies("asc", "asc"));
        assert!(!satisfies("asc", "desc"));
    }

    #[test]
    fn test_segment_counts_must_agree() {
        assert!(path_matches("/upload/:data", "/upload/x"));
        assert!(!path_matches("/upload/:data", "/upload"));
        assert!(!path_matches("/upload/:data", "/upload/x/y"));
        assert!(path_matches("/json/", "/json"));
        assert!(path_matches("/", ""));
    }

    #[test]
    fn test_param_segment_must_be_non_empty() {
        assert!(!path_matches("/a/:id/b", "/a//b"));
    }

    #[test]
    fn test_query_predicates() {
        assert!(query_matches("/json/?id=str", &query(&[("id", "abc")])));
        assert!(!query_matches("/json/?id=str", &query(&[("id", "123")])));
        assert!(!query_matches("/json/?id=str", &query(&[])));
        assert!(query_matches("/json/?id=str", &query(&[("id", "abc"), ("extra", "1")])));
        assert!(query_matches("/json", &query(&[("id", "123")])));
    }

    #[test]
    fn test_full_match() {
        let ids = query(&[("id", "7")]);
        assert!(matches("GET", "/users/:name?id=int", "GET", "/users/ada", &ids));
        assert!(!matches("GET", "/users/:name?id=int", "PUT", "/users/ada", &ids));
        assert!(!matches("GET", "/users/:name?id=int", "GET", "/users/ada", &query(&[("id", "x")])));
    }

    #[test]
    fn test_bind_params() {
        let params = bind_params("/upload/:data/:mango", "/upload/one/two?x=1");
        assert_eq!(params.get("data").map(String::as_str), Some("one"));
        assert_eq!(params.get("mango").map(String::as_str), Some("two"));
        assert_eq!(params.len(), 2);

        assert!(bind_params("/upload/:data", "/upload").is_empty());
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9_]{1,8}"
    }

    proptest! {
        #[test]
        fn literal_segments_decide_the_match(
            literals in prop::collection::vec(segment(), 1..6),
            params in prop::collection::vec(any::<bool>(), 1..6),
            reuse in prop::collection::vec(any::<bool>(), 1..6),
            values in prop::collection::vec(segment(), 1..6),
        ) {
            let len = literals.len().min(params.len()).min(reuse.len()).min(values.len());
            let pattern: Vec<String> = (0..len)
                .map(|i| if params[i] { format!(":p{i}") } else { literals[i].clone() })
                .collect();
            let path: Vec<String> = (0..len)
                .map(|i| if reuse[i] { literals[i].clone() } else { values[i].clone() })
                .collect();

            let expected = (0..len).all(|i| params[i] || literals[i] == path[i]);
            let pattern = format!("/{}", pattern.join("/"));
            let path = format!("/{}", path.join("/"));
            prop_assert_eq!(path_matches(&pattern, &path), expected);
        }

        #[test]
        fn param_values_never_affect_the_match(
            value_a in segment(),
            value_b in segment(),
        ) {
            let a = path_matches("/users/:id/posts", &format!("/users/{value_a}/posts"));
            let b = path_matches("/users/:id/posts", &format!("/users/{value_b}/posts"));
            prop_assert!(a && b);
        }
    }
}
