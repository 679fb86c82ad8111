//! Minimal MIME reader for archived emails
//!
//! Handles what the email browser needs: unfolded headers, RFC 2047
//! encoded words, recipient lists, and picking a readable body out of
//! (possibly nested) multipart messages. Attachments are ignored.

use super::types::ParsedEmail;
use crate::security::validate_email_address;
use base64::Engine;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

const NO_SUBJECT: &str = "(no subject)";
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

static ENCODED_WORD_RE: OnceLock<Regex> = OnceLock::new();

fn encoded_word_regex() -> &'static Regex {
    ENCODED_WORD_RE.get_or_init(|| {
        Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
    })
}

/// A header block split into ordered `(lower-cased name, value)` pairs
type HeaderList = Vec<(String, String)>;

/// A single non-multipart body part
#[derive(Debug)]
struct Leaf {
    content_type: String,
    body: String,
}

/// Parse a raw MIME message into a [`ParsedEmail`]
///
/// Never fails: malformed input yields empty fields and invalid bytes are
/// replaced with U+FFFD. Each body part is decoded with its own charset.
pub fn parse_email(raw: &[u8]) -> ParsedEmail {
    let message = normalize_newlines(raw);
    let (header_block, body) = split_headers(&message);
    let header_list = parse_headers(header_block);

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &header_list {
        headers
            .entry(name.clone())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }

    let first = |name: &str| -> Option<&str> {
        header_list
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };

    let subject = first("subject")
        .map(decode_encoded_words)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());
    let from = first("from").map(decode_encoded_words).unwrap_or_default();
    let from_address = extract_address(&from);
    let to = first("to")
        .map(|v| split_addresses(&decode_encoded_words(v)))
        .unwrap_or_default();
    let cc = first("cc")
        .map(|v| split_addresses(&decode_encoded_words(v)))
        .unwrap_or_default();
    let date = first("date").unwrap_or_default().to_string();

    let mut leaves = Vec::new();
    collect_leaves(&header_list, body, &mut leaves, 0);
    let chosen = pick_body(leaves);

    ParsedEmail {
        subject,
        from,
        from_address,
        to,
        cc,
        date,
        body: chosen.body,
        content_type: chosen.content_type,
        headers,
    }
}

/// Collapse CRLF line endings to LF
fn normalize_newlines(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, &b) in raw.iter().enumerate() {
        if b == b'\r' && raw.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Split a message at the first empty line into header block and body
fn split_headers(message: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = message.strip_prefix(b"\n") {
        return (&message[..0], rest);
    }
    match message.windows(2).position(|w| w == b"\n\n") {
        Some(idx) => (&message[..idx], &message[idx + 2..]),
        None => (message, &message[message.len()..]),
    }
}

/// Parse a header block, unfolding continuation lines
///
/// Header bytes that are not UTF-8 become U+FFFD.
fn parse_headers(block: &[u8]) -> HeaderList {
    let block = String::from_utf8_lossy(block);
    let mut headers: HeaderList = Vec::new();
    for line in block.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(continuation);
                }
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() || name.contains(' ') {
                continue;
            }
            headers.push((name.to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

/// Parse a `Content-Type` value into its lower-cased type and parameters
fn parse_content_type(value: &str) -> (String, HashMap<String, String>) {
    let mut parts = value.split(';');
    let mime = parts
        .next()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let params = parts
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().trim_matches('"').to_string(),
            )
        })
        .collect();

    (mime, params)
}

fn header<'a>(headers: &'a HeaderList, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Flatten a part into its readable leaves
///
/// Nested multiparts are followed up to a fixed depth so a hostile message
/// cannot recurse without bound.
fn collect_leaves(headers: &HeaderList, body: &[u8], out: &mut Vec<Leaf>, depth: usize) {
    let (mime, params) = parse_content_type(header(headers, "content-type").unwrap_or(""));

    if mime.starts_with("multipart/") && depth < 8 {
        if let Some(boundary) = params.get("boundary").filter(|b| !b.is_empty()) {
            for part in split_multipart(body, boundary) {
                let (part_headers, part_body) = split_headers(part);
                let part_headers = parse_headers(part_headers);
                collect_leaves(&part_headers, part_body, out, depth + 1);
            }
            return;
        }
    }

    let disposition = header(headers, "content-disposition").unwrap_or("");
    if disposition.to_ascii_lowercase().starts_with("attachment") {
        return;
    }

    let encoding = header(headers, "content-transfer-encoding")
        .unwrap_or("7bit")
        .trim()
        .to_ascii_lowercase();
    let charset = params
        .get("charset")
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or_else(|| "utf-8".to_string());

    let decoded = match encoding.as_str() {
        "base64" => decode_base64(body),
        "quoted-printable" => Some(decode_quoted_printable(body)),
        _ => None,
    };

    let body = match decoded {
        Some(bytes) => decode_charset(&bytes, &charset),
        None => decode_charset(body, &charset),
    };

    out.push(Leaf {
        content_type: mime,
        body: body.trim_end().to_string(),
    });
}

/// Split a multipart body on its boundary, dropping preamble and epilogue
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut offset: usize = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = trim_end_bytes(line);
        if trimmed.starts_with(delimiter) {
            if let Some(start) = current_start.take() {
                // Exclude the newline that precedes the delimiter
                let end = offset.saturating_sub(1).max(start);
                parts.push(&body[start..end]);
            }
            if trimmed[delimiter.len()..].starts_with(b"--") {
                break;
            }
            current_start = Some(offset + line.len());
        }
        offset += line.len();
    }

    // Unterminated final part
    if let Some(start) = current_start {
        if start < body.len() {
            parts.push(&body[start..]);
        }
    }

    parts
}

fn trim_end_bytes(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// Choose the part to show: plain text, then HTML, then anything
fn pick_body(leaves: Vec<Leaf>) -> Leaf {
    let index = leaves
        .iter()
        .position(|l| l.content_type == "text/plain")
        .or_else(|| leaves.iter().position(|l| l.content_type == "text/html"));

    match index {
        Some(i) => leaves.into_iter().nth(i).unwrap_or_else(empty_leaf),
        None => leaves.into_iter().next().unwrap_or_else(empty_leaf),
    }
}

fn empty_leaf() -> Leaf {
    Leaf {
        content_type: DEFAULT_CONTENT_TYPE.to_string(),
        body: String::new(),
    }
}

fn decode_base64(encoded: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD.decode(compact).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode quoted-printable, honouring soft line breaks
fn decode_quoted_printable(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            // Soft line break: "=" then optional trailing whitespace then newline
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'\n' {
                i = j + 1;
                continue;
            }
            if j == bytes.len() {
                break;
            }
            if i + 2 < bytes.len() {
                if let (Some(h), Some(l)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    out.push(h << 4 | l);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Decode bytes in the given charset
///
/// UTF-8 and ASCII decode lossily; the Latin-1 family maps bytes straight
/// to code points. Unknown charsets are treated as UTF-8.
fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset {
        "iso-8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
            bytes.iter().map(|&b| b as char).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decode RFC 2047 encoded words in a header value
///
/// Whitespace between two adjacent encoded words is dropped, as the RFC
/// requires.
pub fn decode_encoded_words(value: &str) -> String {
    let re = encoded_word_regex();
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for caps in re.captures_iter(value) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let gap = &value[last_end..whole.0];
        if !(previous_was_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }

        let charset = caps[1].to_ascii_lowercase();
        // Strip an RFC 2231 language suffix ("utf-8*en")
        let charset = charset.split('*').next().unwrap_or("utf-8");
        let payload = &caps[3];
        let decoded = match &caps[2] {
            "B" | "b" => decode_base64(payload.as_bytes()),
            _ => decode_q(payload),
        };

        match decoded {
            Some(bytes) => out.push_str(&decode_charset(&bytes, charset)),
            None => out.push_str(&caps[0]),
        }

        last_end = whole.1;
        previous_was_word = true;
    }

    out.push_str(&value[last_end..]);
    out
}

/// The "Q" encoding: quoted-printable with `_` for space
fn decode_q(payload: &str) -> Option<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let h = hex_value(bytes[i + 1])?;
                let l = hex_value(bytes[i + 2])?;
                out.push(h << 4 | l);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

/// Split an address list on commas outside quotes and angle brackets
pub fn split_addresses(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut angle_depth = 0usize;

    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                angle_depth += 1;
                current.push(c);
            }
            '>' if !in_quotes => {
                angle_depth = angle_depth.saturating_sub(1);
                current.push(c);
            }
            ',' if !in_quotes && angle_depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    out
}

/// Pull the bare address out of `Name <addr>` or `addr`
pub fn extract_address(value: &str) -> Option<String> {
    let candidate = match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    };
    let candidate = candidate.trim();
    validate_email_address(candidate).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_email() {
        let raw = b"From: Ada Lovelace <ada@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Engines\r\n\
Date: Mon, 1 Jan 2024 10:00:00 +0000\r\n\
\r\n\
Hello Bob,\r\nThe engine works.\r\n";

        let email = parse_email(raw);
        assert_eq!(email.subject, "Engines");
        assert_eq!(email.from, "Ada Lovelace <ada@example.com>");
        assert_eq!(email.from_address.as_deref(), Some("ada@example.com"));
        assert_eq!(email.to, vec!["bob@example.com"]);
        assert_eq!(email.date, "Mon, 1 Jan 2024 10:00:00 +0000");
        assert_eq!(email.body, "Hello Bob,\nThe engine works.");
        assert_eq!(email.content_type, "text/plain");
        assert_eq!(email.headers.get("subject").map(String::as_str), Some("Engines"));
    }

    #[test]
    fn test_folded_headers_are_unfolded() {
        let raw = b"Subject: a very\n  long subject\n\tline\nFrom: x@example.com\n\nbody";
        let email = parse_email(raw);
        assert_eq!(email.subject, "a very long subject line");
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let raw = b"Received: one\nReceived: two\nSubject: s\n\nbody";
        let email = parse_email(raw);
        assert_eq!(email.headers.get("received").unwrap(), "one, two");
    }

    #[test]
    fn test_missing_subject_defaults() {
        let email = parse_email(b"From: a@example.com\n\nbody");
        assert_eq!(email.subject, NO_SUBJECT);
        assert!(email.to.is_empty());
        assert_eq!(email.date, "");
    }

    #[test]
    fn test_headers_only_message() {
        let email = parse_email(b"Subject: only headers");
        assert_eq!(email.subject, "only headers");
        assert_eq!(email.body, "");
    }

    #[test]
    fn test_encoded_word_subjects() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SGVsbG8gV29ybGQ=?="), "Hello World");
        assert_eq!(
            decode_encoded_words("=?utf-8?Q?Caf=C3=A9_au_lait?="),
            "Café au lait"
        );
        assert_eq!(
            decode_encoded_words("=?utf-8?Q?a?= =?utf-8?Q?b?= tail"),
            "ab tail"
        );
        assert_eq!(decode_encoded_words("Re: =?iso-8859-1?Q?na=EFve?="), "Re: naïve");
        assert_eq!(decode_encoded_words("plain text"), "plain text");
    }

    #[test]
    fn test_split_addresses_respects_quotes() {
        let list = split_addresses(r#""Doe, Jane" <jane@example.com>, bob@example.com,  , <c@example.com>"#);
        assert_eq!(
            list,
            vec![
                r#""Doe, Jane" <jane@example.com>"#,
                "bob@example.com",
                "<c@example.com>"
            ]
        );
    }

    #[test]
    fn test_extract_address() {
        assert_eq!(
            extract_address("Ada <ada@example.com>").as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(extract_address("ada@example.com").as_deref(), Some("ada@example.com"));
        assert_eq!(extract_address("Mailer Daemon"), None);
    }

    #[test]
    fn test_multipart_prefers_plain_text() {
        let raw = b"Subject: multi\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\n\
\n\
preamble\n\
--XYZ\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>Hello</p>\n\
--XYZ\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Hello\n\
--XYZ--\n\
epilogue\n";

        let email = parse_email(raw);
        assert_eq!(email.body, "Hello");
        assert_eq!(email.content_type, "text/plain");
    }

    #[test]
    fn test_multipart_falls_back_to_html() {
        let raw = b"Content-Type: multipart/mixed; boundary=b1\n\
\n\
--b1\n\
Content-Type: text/html\n\
\n\
<b>hi</b>\n\
--b1\n\
Content-Type: application/pdf\n\
Content-Disposition: attachment; filename=x.pdf\n\
Content-Transfer-Encoding: base64\n\
\n\
JVBERi0=\n\
--b1--\n";

        let email = parse_email(raw);
        assert_eq!(email.body, "<b>hi</b>");
        assert_eq!(email.content_type, "text/html");
    }

    #[test]
    fn test_nested_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/plain\n\
\n\
nested plain\n\
--inner--\n\
--outer--\n";

        let email = parse_email(raw);
        assert_eq!(email.body, "nested plain");
    }

    #[test]
    fn test_base64_body() {
        let raw = b"Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: base64\n\
\n\
SGVsbG8g\nV29ybGQ=\n";
        let email = parse_email(raw);
        assert_eq!(email.body, "Hello World");
    }

    #[test]
    fn test_quoted_printable_body() {
        let raw = concat!(
            "Content-Type: text/plain; charset=utf-8\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "Caf=C3=A9 is a soft=\n",
            " break and =3D sign\n"
        )
        .as_bytes();
        let email = parse_email(raw);
        assert_eq!(email.body, "Café is a soft break and = sign");
    }

    #[test]
    fn test_invalid_base64_keeps_raw_text() {
        let raw = b"Content-Transfer-Encoding: base64\n\n!!not base64!!";
        let email = parse_email(raw);
        assert_eq!(email.body, "!!not base64!!");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let raw = b"Subject: bad \xff byte\n\nbody";
        let email = parse_email(raw);
        assert!(email.subject.contains('\u{FFFD}'));
    }

    #[test]
    fn test_latin1_part_uses_declared_charset() {
        let mut raw = b"Subject: accents\r\n\
Content-Type: multipart/alternative; boundary=\"L1\"\r\n\
\r\n\
--L1\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\
\r\n"
            .to_vec();
        raw.extend_from_slice(b"caf\xe9 cr\xe8me\r\n--L1--\r\n");

        let email = parse_email(&raw);
        assert_eq!(email.body, "caf\u{e9} cr\u{e8}me");
        assert!(!email.body.contains('\u{FFFD}'));
    }

    #[test]
    fn test_single_part_latin1_body() {
        let raw = b"Content-Type: text/plain; charset=\"ISO-8859-1\"\n\
Content-Transfer-Encoding: 7bit\n\
\n\
na\xefve";
        let email = parse_email(raw);
        assert_eq!(email.body, "na\u{ef}ve");
    }

    #[test]
    fn test_sample_multipart_message() {
        let email = parse_email(crate::test_utils::SAMPLE_EMAIL.as_bytes());
        assert_eq!(email.subject, "Hello, OASIS");
        assert_eq!(email.from_address.as_deref(), Some("wade@example.com"));
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.to[1], "\"Aech, H.\" <aech@example.com>");
        assert_eq!(email.body, "See you at the arcade.");
    }
}
