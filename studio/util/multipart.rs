/// Minimal multipart/form-data parsing for the upload form.

/// One uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
}

/// Headers and body of every part, with the trailing CRLF of the body removed.
fn parts<'a>(body: &'a [u8], boundary: &str) -> Vec<(String, &'a [u8])> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";
    split_on(body, delimiter.as_bytes())
        .into_iter()
        .filter_map(|part| {
            let sep_pos = find_subsequence(part, sep)?;
            let headers = String::from_utf8_lossy(&part[..sep_pos]).into_owned();
            let raw = &part[sep_pos + sep.len()..];
            Some((headers, raw.strip_suffix(b"\r\n").unwrap_or(raw)))
        })
        .collect()
}

/// Value of `key="..."` in a Content-Disposition header.
fn disposition_param(headers: &str, key: &str) -> Option<String> {
    let needle = format!("{}=\"", key);
    let mut search = headers;
    while let Some(pos) = search.find(&needle) {
        // `name=` must not match the tail of `filename=`.
        let preceded_ok = pos == 0 || !search.as_bytes()[pos - 1].is_ascii_alphanumeric();
        let rest = &search[pos + needle.len()..];
        if preceded_ok {
            let end = rest.find('"')?;
            return Some(rest[..end].to_owned());
        }
        search = rest;
    }
    None
}

/// Extracts a plain-text (non-file) field from a multipart body.
pub fn extract_text_field(body: &[u8], boundary: &str, field_name: &str) -> Option<String> {
    parts(body, boundary)
        .into_iter()
        .find(|(headers, _)| {
            disposition_param(headers, "filename").is_none()
                && disposition_param(headers, "name").as_deref() == Some(field_name)
        })
        .and_then(|(_, raw)| String::from_utf8(raw.to_vec()).ok())
}

/// The first file part, with its client-side file name.
pub fn extract_file(body: &[u8], boundary: &str) -> Option<FilePart> {
    parts(body, boundary).into_iter().find_map(|(headers, raw)| {
        let filename = disposition_param(&headers, "filename")?;
        Some(FilePart {
            filename,
            bytes: raw.to_vec(),
        })
    })
}
