use std::fmt::Write;

/// Escape a field per PostgreSQL COPY CSV rules:
/// - field is wrapped in double quotes
/// - internal `"` becomes `""`
/// - commas, newlines, tabs are safe because quoting protects them
pub fn escape_csv_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    for ch in s.chars() {
        if ch == '"' {
            out.push('"'); // double the quote
        }
        out.push(ch);
    }

    out.push('"');
    out
}

pub fn encode_bytea(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + 2 * bytes.len());
    out.push_str("\\x");
    for b in bytes {
        write!(&mut out, "{:02x}", b).unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escape_doubles_quotes() {
        assert_eq!(escape_csv_string(r#"say "hi""#), r#""say ""hi""""#);
        assert_eq!(escape_csv_string("a,b\nc"), "\"a,b\nc\"");
    }

    #[test]
    fn bytea_is_hex_with_prefix() {
        assert_eq!(encode_bytea(&[0x00, 0xab, 0xff]), "\\x00abff");
    }
}
