//! Image validator reply parsing
//!
//! Accepted shapes:
//! - JSON object `{"valid": bool, "reason": str}` (fences tolerated)
//! - a first line `VALID` or `INVALID`, optionally followed by `: reason`
//!
//! Anything else counts as a failed attempt.

use super::payload::{extract_json_object, FieldReader};

/// Classification verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

const DEFAULT_INVALID_REASON: &str = "image not suitable for roof analysis";

/// Parse a classification reply, `None` when it matches no accepted shape
pub fn parse_verdict(reply: &str) -> Option<Verdict> {
    if let Some(map) = extract_json_object(reply) {
        let reader = FieldReader::new(&map);
        if let Some(valid) = reader.boolean(&["valid", "is_valid"]) {
            if valid {
                return Some(Verdict::Valid);
            }
            let reason = reader
                .string(&["reason", "rejection_reason"])
                .unwrap_or(DEFAULT_INVALID_REASON);
            return Some(Verdict::Invalid(reason.to_string()));
        }
    }

    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '*' || c == '`' || c == '"');
    let upper = line.to_ascii_uppercase();

    if let Some(rest) = upper.strip_prefix("INVALID") {
        let reason = line[line.len() - rest.len()..]
            .trim_start_matches(|c: char| c == ':' || c == '-' || c == '*' || c.is_whitespace())
            .trim();
        let reason = if reason.is_empty() {
            DEFAULT_INVALID_REASON
        } else {
            reason
        };
        return Some(Verdict::Invalid(reason.to_string()));
    }

    let rest = upper.strip_prefix("VALID")?;
    let separated = rest
        .chars()
        .next()
        .map_or(true, |c| matches!(c, ':' | '-' | '.' | '!' | '*') || c.is_whitespace());
    separated.then_some(Verdict::Valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_verdicts() {
        assert_eq!(
            parse_verdict(r#"{"valid": true, "reason": "clear aerial photo"}"#),
            Some(Verdict::Valid)
        );
        assert_eq!(
            parse_verdict("```json\n{\"valid\": false, \"reason\": \"collage\"}\n```"),
            Some(Verdict::Invalid("collage".into()))
        );
        assert_eq!(
            parse_verdict(r#"{"valid": false}"#),
            Some(Verdict::Invalid(DEFAULT_INVALID_REASON.into()))
        );
    }

    #[test]
    fn test_text_verdicts() {
        assert_eq!(parse_verdict("VALID"), Some(Verdict::Valid));
        assert_eq!(parse_verdict("  valid.\n"), Some(Verdict::Valid));
        assert_eq!(
            parse_verdict("INVALID: screenshot of a map"),
            Some(Verdict::Invalid("screenshot of a map".into()))
        );
        assert_eq!(
            parse_verdict("**INVALID** - Collage of three houses"),
            Some(Verdict::Invalid("Collage of three houses".into()))
        );
        assert_eq!(
            parse_verdict("INVALID"),
            Some(Verdict::Invalid(DEFAULT_INVALID_REASON.into()))
        );
    }

    #[test]
    fn test_valid_with_reason() {
        assert_eq!(parse_verdict("VALID: clear roof photo"), Some(Verdict::Valid));
        assert_eq!(parse_verdict("VALID - single house"), Some(Verdict::Valid));
        assert_eq!(parse_verdict("**VALID** roof fills the frame"), Some(Verdict::Valid));
        assert_eq!(parse_verdict("Valid!"), Some(Verdict::Valid));
    }

    #[test]
    fn test_unrecognized_replies() {
        assert_eq!(parse_verdict("The image shows a house."), None);
        assert_eq!(parse_verdict(""), None);
        assert_eq!(parse_verdict(r#"{"answer": "yes"}"#), None);
        assert_eq!(parse_verdict("VALIDATION PENDING"), None);
    }
}
