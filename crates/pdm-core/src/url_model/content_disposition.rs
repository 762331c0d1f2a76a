//! `Content-Disposition` filename extraction (RFC 6266, RFC 5987).

/// File name carried by a `Content-Disposition` value.
///
/// `filename*=charset'lang'value` wins over plain `filename=`; UTF-8 and
/// ISO-8859-1 charsets are understood. Quoted values may contain `;`.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain = None;
    for (name, value) in params(header_value) {
        match name.as_str() {
            "filename*" => {
                if let Some(name) = decode_ext_value(&value).filter(|n| !n.is_empty()) {
                    return Some(name);
                }
            }
            "filename" if !value.is_empty() => plain = Some(value),
            _ => {}
        }
    }
    plain
}

/// `name=value` pairs after the disposition type. Names are lowercased and
/// quoted values are unescaped.
fn params(header_value: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = match header_value.split_once(';') {
        Some((_, params)) => params,
        None => return out,
    };
    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            return out;
        }
        let Some(eq) = rest.find('=') else {
            return out;
        };
        if let Some(semi) = rest[..eq].find(';') {
            // Bare token without a value.
            rest = &rest[semi..];
            continue;
        }
        let name = rest[..eq].trim().to_ascii_lowercase();
        let after = rest[eq + 1..].trim_start();
        let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
            take_quoted(quoted)
        } else {
            let end = after.find(';').unwrap_or(after.len());
            (after[..end].trim().to_string(), &after[end..])
        };
        out.push((name, value));
        rest = tail;
    }
}

/// Read a quoted string body up to its closing quote. Returns the unescaped
/// value and the remainder after the quote.
fn take_quoted(s: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return (value, &s[i + 1..]),
            _ => value.push(c),
        }
    }
    (value, "")
}

/// Decode an RFC 5987 `charset'lang'pct-encoded` value.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?.trim().to_ascii_lowercase();
    let _lang = parts.next()?;
    let encoded = parts.next()?;
    let bytes = percent_decode_bytes(encoded);
    match charset.as_str() {
        "utf-8" => String::from_utf8(bytes).ok(),
        "iso-8859-1" | "latin1" => Some(bytes.into_iter().map(char::from).collect()),
        _ => None,
    }
}

/// Percent-decode to UTF-8, replacing invalid sequences. Malformed escapes are
/// kept verbatim.
pub(super) fn percent_decode(input: &str) -> String {
    String::from_utf8_lossy(&percent_decode_bytes(input)).into_owned()
}

fn percent_decode_bytes(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(h), Some(l)) = (
                bytes.get(i + 1).copied().and_then(hex_digit),
                bytes.get(i + 2).copied().and_then(hex_digit),
            ) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_and_token_forms() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=report.pdf").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn quoted_value_may_hold_separators_and_escapes() {
        let r = parse_content_disposition_filename(
            r#"attachment; filename="a; b \"c\".txt"; size=10"#,
        );
        assert_eq!(r.as_deref(), Some(r#"a; b "c".txt"#));
    }

    #[test]
    fn extended_value_wins_and_ignores_charset_case() {
        let r = parse_content_disposition_filename(
            "attachment; filename=\"fallback.bin\"; FILENAME*=Utf-8''caf%C3%A9%20menu.txt",
        );
        assert_eq!(r.as_deref(), Some("café menu.txt"));
    }

    #[test]
    fn latin1_extended_value() {
        let r = parse_content_disposition_filename("inline; filename*=iso-8859-1'en'%A3%20rates.csv");
        assert_eq!(r.as_deref(), Some("£ rates.csv"));
    }

    #[test]
    fn unknown_charset_falls_back_to_plain_name() {
        let r = parse_content_disposition_filename(
            "attachment; filename*=koi8-r''%C1.txt; filename=plain.txt",
        );
        assert_eq!(r.as_deref(), Some("plain.txt"));
    }

    #[test]
    fn no_filename() {
        assert_eq!(parse_content_disposition_filename("inline"), None);
        assert_eq!(parse_content_disposition_filename("attachment; size=3"), None);
    }

    #[test]
    fn percent_decode_keeps_malformed_escapes() {
        assert_eq!(percent_decode("a%20b%zz%4"), "a b%zz%4");
    }
}
