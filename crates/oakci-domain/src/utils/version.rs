//! Version comparison for the update-available advisory.
//!
//! Versions here are PEP-440-ish strings (`1.0.10`, `1.0.10.dev0+gABC`),
//! not strict semver. Only the numeric base release participates in the
//! comparison so a local dev build never flags an update against its own
//! base release.

/// Numeric base release of a version string (`1.0.10.dev0+g1` -> [1,0,10]).
#[must_use]
pub fn base_release(version: &str) -> Vec<u64> {
    let mut parts = Vec::new();
    for segment in version.split('.') {
        let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() || digits.len() != segment.len() {
            // First non-numeric segment ends the base release; a partially
            // numeric segment ("10dev0") contributes its digits and stops.
            if !digits.is_empty() {
                if let Ok(n) = digits.parse() {
                    parts.push(n);
                }
            }
            break;
        }
        if let Ok(n) = digits.parse() {
            parts.push(n);
        }
    }
    parts
}

/// Whether `installed` is a strictly newer base release than `running`.
#[must_use]
pub fn update_available(running: &str, installed: &str) -> bool {
    let a = base_release(running);
    let b = base_release(installed);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    b > a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_newer_release_flags_update() {
        assert!(update_available("1.0.10", "1.0.11"));
        assert!(update_available("1.0.10", "1.1.0"));
        assert!(!update_available("1.0.10", "1.0.10"));
        assert!(!update_available("1.0.11", "1.0.10"));
    }

    #[test]
    fn dev_suffix_does_not_flag_update() {
        assert!(!update_available("1.0.10", "1.0.10.dev0+gABC.d20260101"));
        assert!(!update_available("1.0.10.dev0+gABC", "1.0.10"));
        assert!(update_available("1.0.10.dev0", "1.0.11"));
    }

    #[test]
    fn base_release_parses_segments() {
        assert_eq!(base_release("1.0.10"), vec![1, 0, 10]);
        assert_eq!(base_release("1.0.10.dev0"), vec![1, 0, 10]);
        assert_eq!(base_release("2.1"), vec![2, 1]);
        assert!(base_release("garbage").is_empty());
    }
}
