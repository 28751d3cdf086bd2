//! JSON literals safe to embed in generated JavaScript.

use serde::Serialize;

/// Serialize a value as a JavaScript literal that can sit inside a
/// `<script>` element.
///
/// `<`, `>` and `&` are written as unicode escapes so the payload cannot
/// close the script element, and U+2028/U+2029 are escaped because older
/// engines reject them in string literals.
pub fn to_script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_script_terminators() {
        let out = to_script_json(&json!({ "html": "</script><b>&" })).unwrap();

        assert!(!out.contains("</script>"));
        assert!(out.contains("\\u003c/script\\u003e"));
        assert!(out.contains("\\u0026"));
    }

    #[test]
    fn output_is_still_valid_json() {
        let value = json!({ "text": "a < b && c > d\u{2028}" });
        let out = to_script_json(&value).unwrap();
        let back: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back, value);
    }
}
