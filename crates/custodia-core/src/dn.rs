//! X.500 distinguished names in RFC 4514/2253 canonical form.
//!
//! Every DN comparison in the delegation engine goes through [`Dn`], which
//! parses the string representation once and stores a canonical rendering:
//!
//! - recognized attribute-type keywords uppercased (CN, O, OU, ...), OIDs
//!   passed through;
//! - values unescaped, case-folded, outer unescaped spaces stripped and
//!   internal whitespace runs collapsed;
//! - RDNs joined with `,` (no spaces), multi-valued RDNs sorted and joined
//!   with `+`, minimal re-escaping on output.
//!
//! Two input strings that differ only in non-canonical formatting therefore
//! compare equal: `"CN = Alice Smith,O=ACME "` == `"cn=alice smith, o=acme"`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Characters that must be re-escaped when rendering a canonical value.
const ESCAPED: &[char] = &[',', '+', '"', '\\', ';', '<', '>'];

/// DN syntax errors, carrying the byte position of the offending input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnError {
    #[error("empty distinguished name")]
    Empty,

    #[error("empty attribute type at byte {position}")]
    EmptyType { position: usize },

    #[error("expected '=' after attribute type at byte {position}")]
    MissingEquals { position: usize },

    #[error("unterminated escape sequence at byte {position}")]
    UnterminatedEscape { position: usize },

    #[error("invalid hex escape at byte {position}")]
    InvalidHexEscape { position: usize },

    #[error("hex escapes at byte {position} do not form valid UTF-8")]
    InvalidUtf8 { position: usize },

    #[error("unexpected character {found:?} at byte {position}")]
    Unexpected { position: usize, found: char },
}

/// A distinguished name held in canonical form.
///
/// Equality, ordering and hashing operate on the canonical rendering, so two
/// `Dn` values built from differently formatted strings of the same name
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dn {
    canonical: String,
}

impl Dn {
    /// Parse and canonicalize an RFC 4514 string representation.
    pub fn parse(input: &str) -> Result<Self, DnError> {
        let rdns = parse_rdns(input)?;
        Ok(Self {
            canonical: render(&rdns),
        })
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Dn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Dn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Dn::parse(&raw).map_err(de::Error::custom)
    }
}

/// One attribute-value assertion of an RDN, already canonicalized.
type Ava = (String, String);

/// A value character plus whether it came from an escape sequence.
///
/// Escaped spaces survive outer trimming; unescaped ones do not.
type ValueChar = (char, bool);

fn parse_rdns(input: &str) -> Result<Vec<Vec<Ava>>, DnError> {
    if input.trim().is_empty() {
        return Err(DnError::Empty);
    }

    let bytes = input.as_bytes();
    let mut pos = 0usize;
    let mut rdns: Vec<Vec<Ava>> = Vec::new();
    let mut current: Vec<Ava> = Vec::new();

    loop {
        skip_spaces(bytes, &mut pos);
        let (attr_type, value, terminator) = parse_ava(input, bytes, &mut pos)?;
        current.push((attr_type, value));

        match terminator {
            Some(b'+') => continue,
            Some(b',') | Some(b';') => {
                rdns.push(std::mem::take(&mut current));
            }
            None => {
                rdns.push(current);
                return Ok(rdns);
            }
            Some(other) => {
                return Err(DnError::Unexpected {
                    position: pos,
                    found: other as char,
                })
            }
        }
    }
}

fn parse_ava(
    input: &str,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<(String, String, Option<u8>), DnError> {
    let type_start = *pos;
    while *pos < bytes.len() {
        let b = bytes[*pos];
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            *pos += 1;
        } else {
            break;
        }
    }
    if *pos == type_start {
        return Err(DnError::EmptyType {
            position: type_start,
        });
    }
    let attr_type = canonicalize_type(&input[type_start..*pos]);

    skip_spaces(bytes, pos);
    if *pos >= bytes.len() || bytes[*pos] != b'=' {
        return Err(DnError::MissingEquals { position: *pos });
    }
    *pos += 1;

    let (value, terminator) = parse_value(input, bytes, pos)?;
    Ok((attr_type, value, terminator))
}

/// Parse a value up to an unescaped separator. Returns the canonicalized
/// value and the separator byte that ended it (consumed), if any.
fn parse_value(
    input: &str,
    bytes: &[u8],
    pos: &mut usize,
) -> Result<(String, Option<u8>), DnError> {
    let mut chars: Vec<ValueChar> = Vec::new();
    // Consecutive `\XX` pairs are buffered so multi-byte UTF-8 sequences
    // decode as a unit.
    let mut hex_run: Vec<u8> = Vec::new();
    let mut hex_run_start = *pos;
    let mut terminator: Option<u8> = None;

    while *pos < bytes.len() {
        let b = bytes[*pos];
        match b {
            b',' | b';' | b'+' => {
                *pos += 1;
                terminator = Some(b);
                break;
            }
            b'\\' => {
                if *pos + 1 >= bytes.len() {
                    return Err(DnError::UnterminatedEscape { position: *pos });
                }
                let next = bytes[*pos + 1];
                if next.is_ascii_hexdigit() {
                    if *pos + 2 >= bytes.len() || !bytes[*pos + 2].is_ascii_hexdigit() {
                        return Err(DnError::InvalidHexEscape { position: *pos });
                    }
                    if hex_run.is_empty() {
                        hex_run_start = *pos;
                    }
                    let hi = (bytes[*pos + 1] as char).to_digit(16).unwrap_or(0) as u8;
                    let lo = (bytes[*pos + 2] as char).to_digit(16).unwrap_or(0) as u8;
                    hex_run.push(hi << 4 | lo);
                    *pos += 3;
                } else {
                    flush_hex(&mut chars, &mut hex_run, hex_run_start)?;
                    // Any singly escaped character is taken literally.
                    let ch = char_at(input, *pos + 1);
                    chars.push((ch, true));
                    *pos += 1 + ch.len_utf8();
                }
            }
            _ => {
                flush_hex(&mut chars, &mut hex_run, hex_run_start)?;
                let ch = char_at(input, *pos);
                chars.push((ch, false));
                *pos += ch.len_utf8();
            }
        }
    }
    flush_hex(&mut chars, &mut hex_run, hex_run_start)?;

    Ok((canonicalize_value(&chars), terminator))
}

fn flush_hex(
    chars: &mut Vec<ValueChar>,
    hex_run: &mut Vec<u8>,
    start: usize,
) -> Result<(), DnError> {
    if hex_run.is_empty() {
        return Ok(());
    }
    let decoded = String::from_utf8(std::mem::take(hex_run))
        .map_err(|_| DnError::InvalidUtf8 { position: start })?;
    chars.extend(decoded.chars().map(|c| (c, true)));
    Ok(())
}

fn char_at(input: &str, byte_pos: usize) -> char {
    input[byte_pos..].chars().next().unwrap_or('\u{fffd}')
}

fn skip_spaces(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && (bytes[*pos] == b' ' || bytes[*pos] == b'\t') {
        *pos += 1;
    }
}

/// Recognized short keywords are uppercased; dotted-decimal OIDs pass
/// through unchanged; anything else is uppercased for case-insensitive
/// comparison.
fn canonicalize_type(raw: &str) -> String {
    if raw.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return raw.to_string();
    }
    raw.to_ascii_uppercase()
}

fn canonicalize_value(chars: &[ValueChar]) -> String {
    // Strip unescaped outer spaces.
    let start = chars
        .iter()
        .position(|&(c, esc)| esc || !matches!(c, ' ' | '\t'))
        .unwrap_or(chars.len());
    let end = chars
        .iter()
        .rposition(|&(c, esc)| esc || !matches!(c, ' ' | '\t'))
        .map_or(start, |i| i + 1);

    // Collapse whitespace runs and case-fold. A run kept by the trim bounds
    // (escaped outer space) still collapses to a single space, which keeps
    // re-parsing the canonical form idempotent.
    let mut out = String::new();
    let mut pending_space = false;
    for &(c, _) in &chars[start..end] {
        if matches!(c, ' ' | '\t') {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for folded in c.to_lowercase() {
            out.push(folded);
        }
    }
    if pending_space {
        out.push(' ');
    }
    out
}

fn render(rdns: &[Vec<Ava>]) -> String {
    let mut parts = Vec::with_capacity(rdns.len());
    for rdn in rdns {
        let mut avas = rdn.clone();
        // Multi-value order is arbitrary per RFC 4514; sort for stability.
        avas.sort();
        let rendered: Vec<String> = avas
            .iter()
            .map(|(t, v)| format!("{t}={}", escape_value(v)))
            .collect();
        parts.push(rendered.join("+"));
    }
    parts.join(",")
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let needs_escape = ESCAPED.contains(&c)
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
