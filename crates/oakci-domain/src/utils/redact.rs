//! Secret redaction applied at logging boundaries.

use std::sync::OnceLock;

use regex::Regex;

const REPLACEMENT: &str = "[REDACTED]";

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // key=value style secrets
            r#"(?i)(api[_-]?key|token|secret|password|authorization)["']?\s*[:=]\s*["']?[A-Za-z0-9_\-\.]{8,}"#,
            // bearer headers
            r"(?i)bearer\s+[A-Za-z0-9_\-\.=]{8,}",
            // provider-prefixed keys
            r"\b(sk|pk|rk)-[A-Za-z0-9_\-]{16,}\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Replaces recognizable secrets in a text with a redaction marker.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    let mut out = text.to_owned();
    for re in patterns() {
        out = re.replace_all(&out, REPLACEMENT).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_common_shapes() {
        let input = "api_key=abcd1234efgh5678 Bearer AAAA1111BBBB2222 sk-aaaaaaaaaaaaaaaaaaaa";
        let out = redact_secrets(input);
        assert!(!out.contains("abcd1234efgh5678"));
        assert!(!out.contains("AAAA1111BBBB2222"));
        assert!(!out.contains("sk-aaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn leaves_plain_text_alone() {
        let input = "indexed 42 files in src/";
        assert_eq!(redact_secrets(input), input);
    }
}
