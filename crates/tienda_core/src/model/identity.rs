//! Identity key normalization.
//!
//! # Invariants
//! - Keys are normalized before every read and write; two raw keys that
//!   normalize equal address the same record.
//! - Normalizers return `None` for blank input instead of an empty key.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static INNER_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Product codes compare case-insensitively and are stored uppercase.
pub fn normalize_product_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Category identity key: trimmed, inner whitespace collapsed, lowercase.
pub fn normalize_category_name(raw: &str) -> Option<String> {
    display_category_name(raw).map(|name| name.to_lowercase())
}

/// Category display form: trimmed with inner whitespace collapsed.
pub fn display_category_name(raw: &str) -> Option<String> {
    let collapsed = INNER_WS_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// User scopes are keyed by trimmed, lowercase email.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Cheap shape check for emails accepted at write boundaries.
pub fn is_plausible_email(normalized: &str) -> bool {
    EMAIL_RE.is_match(normalized)
}

/// Sort key approximating locale-aware, accent-insensitive ordering for
/// Spanish/Latin names: lowercase with common diacritics folded.
pub fn collation_key(text: &str) -> String {
    text.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        // Sorts right after `n`, as in Spanish collation.
        'ñ' => 'n',
        other => other,
    }
}

/// Generates a product code `<PREFIX>-<BASE36 millis>` that is absent from
/// `existing`.
///
/// The prefix is the first `prefix_len` ASCII alphanumerics of `name`,
/// uppercased, or `fallback_prefix` when the name has none. On collision the
/// timestamp component is bumped until the code is unused.
pub fn generate_product_code(
    name: &str,
    existing: &BTreeSet<String>,
    now_ms: i64,
    prefix_len: usize,
    fallback_prefix: &str,
) -> String {
    let mut prefix: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(prefix_len)
        .collect::<String>()
        .to_uppercase();
    if prefix.is_empty() {
        prefix = fallback_prefix.to_uppercase();
    }

    let mut stamp = now_ms.max(0) as u64;
    loop {
        let code = format!("{prefix}-{}", to_base36(stamp));
        if !existing.contains(&code) {
            return code;
        }
        stamp += 1;
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
