//! PII masking applied before anything leaves the gateway boundary.
//!
//! Document numbers are reduced to their last four characters. Raw values
//! survive only inside the audit record.

use std::collections::HashMap;

/// Input keys whose values are document numbers or credentials.
const SENSITIVE_KEYS: &[&str] = &["id_number", "registration_number", "access_token"];

/// Input keys whose values are too large or too sensitive to retain at all.
const OMITTED_KEYS: &[&str] = &["image_base64"];

/// Mask a document number to its last four characters.
///
/// Values shorter than four characters are masked entirely.
#[must_use]
pub fn mask_last4(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() >= 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("*****{tail}")
    } else {
        "*****".to_string()
    }
}

/// Mask caller-supplied inputs for external exposure or logging.
///
/// Sensitive keys are masked to their last four characters; bulk payloads
/// (scanned images) are dropped and replaced with a marker.
#[must_use]
pub fn mask_inputs(inputs: &HashMap<String, String>) -> HashMap<String, String> {
    inputs
        .iter()
        .map(|(key, value)| {
            let masked = if OMITTED_KEYS.contains(&key.as_str()) {
                "<omitted>".to_string()
            } else if SENSITIVE_KEYS.contains(&key.as_str()) {
                mask_last4(value)
            } else {
                value.clone()
            };
            (key.clone(), masked)
        })
        .collect()
}
