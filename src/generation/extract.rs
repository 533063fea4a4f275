//! Pulls the first SELECT statement out of a raw model response.

/// Scan once for a case-insensitive `SELECT` token and return everything up to
/// the first `;` outside a string literal, a markdown fence, or end of text.
pub fn extract_first_select(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut start: Option<usize> = None;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match start {
            None => {
                if is_select_at(bytes, i) {
                    start = Some(i);
                    i += "select".len();
                    continue;
                }
            }
            Some(s) => {
                if let Some(q) = quote {
                    if b == q {
                        quote = None;
                    }
                } else if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if b == b';' || bytes[i..].starts_with(b"```") {
                    return finish(&text[s..i]);
                }
            }
        }
        i += 1;
    }

    start.and_then(|s| finish(&text[s..]))
}

fn is_select_at(bytes: &[u8], i: usize) -> bool {
    let end = i + "select".len();
    if end > bytes.len() || !bytes[i..end].eq_ignore_ascii_case(b"select") {
        return false;
    }
    let boundary_before = i == 0 || !is_word_byte(bytes[i - 1]);
    let boundary_after = end == bytes.len() || !is_word_byte(bytes[end]);
    boundary_before && boundary_after
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn finish(statement: &str) -> Option<String> {
    let trimmed = statement.trim();
    if trimmed.eq_ignore_ascii_case("select") || trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
