use std::collections::HashMap;

/// Splits a `multipart/form-data` body into field name -> content.
///
/// Parts without a blank line between headers and content, or without a
/// `name=` token in `Content-Disposition`, are skipped.
pub fn parse_form_data(body: &str, boundary: &str) -> HashMap<String, String> {
    let delimiter = format!("--{boundary}");
    let mut fields = HashMap::new();

    for part in body.split(delimiter.as_str()) {
        let part = part.trim();
        if part.is_empty() || part == "--" {
            continue;
        }

        let Some((headers, content)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        let content = content.strip_suffix("\r\n").unwrap_or(content);

        if let Some(name) = disposition_name(headers) {
            fields.insert(name, content.to_string());
        }
    }

    fields
}

fn disposition_name(headers: &str) -> Option<String> {
    headers
        .split("\r\n")
        .map(str::trim)
        .filter(|line| line.starts_with("Content-Disposition"))
        .flat_map(|line| line.split(';'))
        .filter_map(|token| token.trim().strip_prefix("name="))
        .map(|name| name.replace('"', ""))
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part() {
        let body = "--X\r\n\
                    Content-Disposition: form-data; name=\"file\"\r\n\
                    \r\n\
                    hello\r\n\
                    --X--\r\n";
        let fields = parse_form_data(body, "X");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("file").map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_filename_token_is_not_the_name() {
        let body = "--b\r\n\
                    Content-Disposition: form-data; name=\"chunk\"; filename=\"a.txt\"\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    line one\r\nline two\r\n\
                    --b\r\n\
                    Content-Disposition: form-data; name=name\r\n\
                    \r\n\
                    a.txt\r\n\
                    --b--";
        let fields = parse_form_data(body, "b");
        assert_eq!(fields.get("chunk").map(String::as_str), Some("line one\r\nline two"));
        assert_eq!(fields.get("name").map(String::as_str), Some("a.txt"));
    }

    #[test]
    fn test_parts_without_name_or_separator_are_skipped() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\norphan\r\n--b\r\nno separator here\r\n--b--";
        assert!(parse_form_data(body, "b").is_empty());
    }
}
