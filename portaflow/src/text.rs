//! Pure formatting helpers shared by the storage layer and the email
//! templates: filename sanitization, HTML escaping, label prettification and
//! display normalization of free-form submission values.

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Sanitize a user-supplied name for use inside a storage path.
///
/// Accented characters fold to their base letters (NFKD decomposition with
/// combining marks stripped), then everything outside word characters, dots,
/// dashes and spaces is dropped. Runs of whitespace collapse to a single `-`
/// and the result is lowercased, so `"José Pérez (1).PNG"` becomes
/// `"jose-perez-1.png"`.
pub fn sanitize(name: &str) -> String {
    let kept: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' '))
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase()
}

/// Escape `& < > " '` so user-supplied values can be interpolated into email
/// HTML without becoming live markup.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Turn a form key into a human label: underscores become spaces, camelCase
/// boundaries get a space, and the lowercased result is capitalized.
/// `"numeroPortar"` renders as `"Numero portar"`.
pub fn pretty_label(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c == '_' {
            spaced.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_ascii_lowercase();
        spaced.push(c);
    }

    let lowered = spaced.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => lowered,
    }
}

/// Render a free-form JSON value for display in the operations email.
///
/// Nulls render empty, booleans localize to `Sí`/`No`, arrays comma-join
/// their elements, nested objects fall back to their JSON form and scalars
/// render without surrounding quotes.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Sí".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(scalar_form).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn scalar_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract a submission field as display text, treating absent keys (or a
/// non-object payload) as empty.
pub fn field_text(data: &Value, key: &str) -> String {
    data.get(key).map(normalize_value).unwrap_or_default()
}
