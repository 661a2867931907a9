use std::collections::HashMap;

use super::multipart;
use super::request::{ContentType, MULTIPART_FORM_DATA};
use super::{Request, Version};
use crate::error::ParseError;

const HEAD_TERMINATOR: &str = "\r\n\r\n";

/// Parses raw request text into a `Request`.
///
/// Route params are left empty; they depend on the route selected later.
/// Empty input is not handled here, the dispatcher answers it on its fast
/// path before parsing.
pub fn parse(raw: &str) -> Result<Request, ParseError> {
    let (head, body) = split_head(raw);

    let request_line = head.split("\r\n").next().unwrap_or_default();
    let (method, target, version) = parse_request_line(request_line)?;
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, HashMap::new()),
    };

    let headers = parse_headers(head);
    let content_type = header_value(&headers, "Content-Type")
        .map(parse_content_type)
        .transpose()?;
    let cookies = header_value(&headers, "Cookie")
        .map(parse_cookies)
        .unwrap_or_default();

    let files = content_type
        .as_ref()
        .filter(|content_type| content_type.is_multipart())
        .and_then(|content_type| content_type.boundary.as_deref())
        .map(|boundary| multipart::parse_form_data(body, boundary));

    Ok(Request {
        method: method.to_string(),
        path: path.to_string(),
        target: target.to_string(),
        version: Version::from(version),
        headers,
        query,
        params: HashMap::new(),
        cookies,
        body: body.to_string(),
        content_type,
        files,
    })
}

/// Splits at the first blank line. Without one the whole text is the head.
fn split_head(raw: &str) -> (&str, &str) {
    raw.split_once(HEAD_TERMINATOR).unwrap_or((raw, ""))
}

fn parse_request_line(line: &str) -> Result<(&str, &str, &str), ParseError> {
    let mut parts = line.split(' ').filter(|part| !part.is_empty());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version)) => Ok((method, target, version)),
        _ => Err(ParseError::malformed_request_line(line)),
    }
}

/// Parses `a=1&b=2`. A `/` inside a pair cuts the pair short, so
/// `id=str/?age=int` yields `id=str`. Pairs without `=` are skipped.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let pair = pair.split('/').next().unwrap_or_default();
            let (key, value) = pair.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_headers(head: &str) -> HashMap<String, String> {
    head.split("\r\n")
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.trim().is_empty())
}

fn parse_content_type(header: &str) -> Result<ContentType, ParseError> {
    let mut tokens = header.split(';').map(str::trim);
    let media_type = tokens.next().unwrap_or_default().to_string();
    let boundary = tokens
        .filter_map(|token| token.strip_prefix("boundary="))
        .map(|boundary| boundary.replace('"', ""))
        .last();

    if media_type == MULTIPART_FORM_DATA && boundary.as_deref().is_none_or(str::is_empty) {
        return Err(ParseError::missing_boundary(header));
    }

    Ok(ContentType { media_type, boundary })
}

fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|piece| {
            let (name, value) = piece.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}
