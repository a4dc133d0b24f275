//! Untyped provider payload handling
//!
//! Providers answer with free text that should contain one JSON object,
//! sometimes wrapped in markdown fences or surrounded by chatter. This module
//! locates that object and offers lenient typed field readers over it.

use serde_json::{Map, Value};

/// Locate and parse the JSON object in a provider reply
///
/// Tries, in order: the whole reply, the first fenced code block, and the
/// span from the first `{` to the last `}`. Returns `None` when none of them
/// parse as a JSON object.
pub fn extract_json_object(reply: &str) -> Option<Map<String, Value>> {
    let trimmed = reply.trim();

    if let Some(map) = parse_object(trimmed) {
        return Some(map);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Some(map) = parse_object(block) {
            return Some(map);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&trimmed[start..=end])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Body of the first ```...``` block, language tag stripped
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Lenient typed reads over a provider JSON object
///
/// Numbers may arrive as JSON numbers or numeric strings ("120", "65%",
/// "35°"). Non-finite values read as absent.
pub struct FieldReader<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> FieldReader<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// First present key among `keys`
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.map.get(*key))
            .find(|value| !value.is_null())
    }

    pub fn has(&self, keys: &[&str]) -> bool {
        self.get(keys).is_some()
    }

    pub fn number(&self, keys: &[&str]) -> Option<f64> {
        let value = self.get(keys)?;
        let number = match value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => parse_loose_number(s)?,
            _ => return None,
        };
        number.is_finite().then_some(number)
    }

    pub fn boolean(&self, keys: &[&str]) -> Option<bool> {
        match self.get(keys)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }
    }

    pub fn string(&self, keys: &[&str]) -> Option<&'a str> {
        match self.get(keys)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// String items of an array; a single string reads as a one-item list
    pub fn string_list(&self, keys: &[&str]) -> Vec<String> {
        match self.get(keys) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    pub fn objects(&self, keys: &[&str]) -> Vec<&'a Map<String, Value>> {
        match self.get(keys) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        }
    }
}

/// Unit suffixes tolerated after a numeric string
const UNIT_SUFFIXES: [&str; 6] = ["", "%", "°", "m2", "m²", "m^2"];

/// Parse "65", " 65.5 % ", "35°", "1,200 m2", "1.2e2" as a number
///
/// `,` and `_` are read as thousands separators. Anything after the number
/// other than a unit suffix makes the value unreadable.
fn parse_loose_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    let bytes = cleaned.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if !bytes[digits_start..end].iter().any(u8::is_ascii_digit) {
        return None;
    }

    // Exponent only when digits follow it
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-' | b'+')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    let suffix = cleaned[end..].trim().to_lowercase();
    if !UNIT_SUFFIXES.contains(&suffix.as_str()) {
        return None;
    }
    cleaned[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        let map = extract_json_object(r#"{"valid": true}"#).unwrap();
        assert_eq!(map["valid"], json!(true));
    }

    #[test]
    fn test_fenced_object() {
        let reply = "Here you go:\n```json\n{\"roof_area_m2\": 120}\n```\nThanks";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["roof_area_m2"], json!(120));
    }

    #[test]
    fn test_object_inside_chatter() {
        let reply = "Sure! {\"confidence\": 80, \"nested\": {\"a\": 1}} Hope this helps.";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["confidence"], json!(80));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("I cannot analyze this image.").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("").is_none());
    }

    #[test]
    fn test_loose_numbers() {
        let map = json!({
            "a": "65%",
            "b": " 35° ",
            "c": 12.5,
            "d": "n/a",
            "e": "-4",
            "f": null,
        });
        let map = map.as_object().unwrap();
        let reader = FieldReader::new(map);
        assert_eq!(reader.number(&["a"]), Some(65.0));
        assert_eq!(reader.number(&["b"]), Some(35.0));
        assert_eq!(reader.number(&["c"]), Some(12.5));
        assert_eq!(reader.number(&["d"]), None);
        assert_eq!(reader.number(&["e"]), Some(-4.0));
        assert_eq!(reader.number(&["f", "c"]), Some(12.5));
        assert_eq!(reader.number(&["missing"]), None);
    }

    #[test]
    fn test_loose_numbers_keep_full_value() {
        let map = json!({
            "thousands": "1,200",
            "exponent": "1.2e2",
            "area": "1_050 m²",
            "unit": "120 M2",
            "range": "80-100",
            "words": "about 90",
            "trailing": "75 approx",
            "dangling_exponent": "12e",
        });
        let map = map.as_object().unwrap();
        let reader = FieldReader::new(map);
        assert_eq!(reader.number(&["thousands"]), Some(1200.0));
        assert_eq!(reader.number(&["exponent"]), Some(120.0));
        assert_eq!(reader.number(&["area"]), Some(1050.0));
        assert_eq!(reader.number(&["unit"]), Some(120.0));
        assert_eq!(reader.number(&["range"]), None);
        assert_eq!(reader.number(&["words"]), None);
        assert_eq!(reader.number(&["trailing"]), None);
        assert_eq!(reader.number(&["dangling_exponent"]), None);
    }

    #[test]
    fn test_loose_booleans_and_lists() {
        let map = json!({
            "is_rooftop": "yes",
            "panels": 0,
            "obstacles": ["chimney", "", 4, " vent "],
            "single": "skylight",
        });
        let map = map.as_object().unwrap();
        let reader = FieldReader::new(map);
        assert_eq!(reader.boolean(&["is_rooftop"]), Some(true));
        assert_eq!(reader.boolean(&["panels"]), Some(false));
        assert_eq!(reader.string_list(&["obstacles"]), vec!["chimney", "vent"]);
        assert_eq!(reader.string_list(&["single"]), vec!["skylight"]);
        assert!(reader.string_list(&["missing"]).is_empty());
    }
}
