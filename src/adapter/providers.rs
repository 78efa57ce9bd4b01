//! Concrete adapters, one per document type.
//!
//! Each adapter encodes the quirks of one upstream authority: inconsistent
//! field names, consent flags, nested `data` envelopes. Normalization
//! rules are deliberately tolerant - a missing field degrades the result,
//! it never panics.

use super::{Adapter, HttpMethod, Inputs, StandardResult};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::mask::mask_last4;
use serde_json::{json, Value};
use tracing::debug;

fn input(inputs: &Inputs, key: &str) -> String {
    inputs.get(key).cloned().unwrap_or_default()
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Tax identifier (PAN) verification.
pub struct TaxIdAdapter {
    endpoint: String,
}

impl TaxIdAdapter {
    /// Create the adapter against the configured provider base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/api/v2/pan/verify", config.base_url),
        }
    }
}

impl Adapter for TaxIdAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "Income Tax Department"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({ "pan": input(inputs, "id_number") })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        // The provider reports validity as either a status string or a
        // single-letter pan_status code.
        let is_valid = str_field(&raw, "status").as_deref() == Some("VALID")
            || str_field(&raw, "pan_status").as_deref() == Some("E");
        // Field naming is inconsistent between provider versions.
        let legal_name = str_field(&raw, "full_name").or_else(|| str_field(&raw, "pan_holder_name"));
        StandardResult {
            is_valid,
            legal_name,
            dob: None,
            address: None,
            raw_response: raw,
            error: None,
        }
    }
}

/// Driving license verification. The stricter of the registries: it
/// requires the date of birth alongside the license number.
pub struct DrivingLicenseAdapter {
    endpoint: String,
}

impl DrivingLicenseAdapter {
    /// Create the adapter against the configured provider base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/api/v2/dl/verify", config.base_url),
        }
    }
}

impl Adapter for DrivingLicenseAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "Ministry of Road Transport"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "dl_no": input(inputs, "id_number"),
            "dob": input(inputs, "dob"),
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        let is_valid = str_field(&raw, "status").as_deref() == Some("ACTIVE");
        StandardResult {
            is_valid,
            legal_name: str_field(&raw, "holder_name"),
            dob: str_field(&raw, "dob"),
            address: None,
            raw_response: raw,
            error: None,
        }
    }
}

/// Business registration (GST) verification.
pub struct BusinessRegistryAdapter {
    endpoint: String,
}

impl BusinessRegistryAdapter {
    /// Create the adapter against the configured provider base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/verification/gst", config.base_url),
        }
    }
}

impl Adapter for BusinessRegistryAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "GST Network"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "gstin": input(inputs, "registration_number"),
            "consent": "Y",
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        let data = raw.get("data").cloned().unwrap_or_else(|| json!({}));
        let is_valid = str_field(&raw, "status").as_deref() == Some("SUCCESS")
            && str_field(&data, "status").as_deref() == Some("Active");
        let legal_name = str_field(&data, "legal_name").or_else(|| Some("Unknown".to_string()));
        StandardResult {
            is_valid,
            legal_name,
            dob: None,
            address: None,
            raw_response: raw,
            error: None,
        }
    }
}

/// Voter roll (EPIC) verification.
pub struct VoterRollAdapter {
    endpoint: String,
}

impl VoterRollAdapter {
    /// Create the adapter against the configured provider base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/verification/voter", config.base_url),
        }
    }
}

impl Adapter for VoterRollAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "Election Commission"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "epic_number": input(inputs, "id_number"),
            "consent": "Y",
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        let data = raw.get("data").cloned().unwrap_or_else(|| json!({}));
        // Presence of the echoed EPIC number is the provider's only
        // positive confirmation signal.
        let is_valid = str_field(&raw, "status").as_deref() == Some("SUCCESS")
            && str_field(&data, "epic_number").is_some();
        let legal_name = str_field(&data, "full_name").or_else(|| Some("Unknown".to_string()));
        StandardResult {
            is_valid,
            legal_name,
            dob: None,
            address: None,
            raw_response: raw,
            error: None,
        }
    }
}

/// Cloud document locker pull. A successful token exchange is itself the
/// proof of validity: the locker only releases documents it has verified.
pub struct DocumentLockerAdapter {
    endpoint: String,
}

impl DocumentLockerAdapter {
    /// Create the adapter against the configured locker token URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: config.locker_token_url.clone(),
        }
    }
}

impl Adapter for DocumentLockerAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "National Document Locker"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({ "access_token": input(inputs, "access_token") })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        StandardResult {
            is_valid: true,
            legal_name: str_field(&raw, "name"),
            dob: str_field(&raw, "dob"),
            address: None,
            raw_response: raw,
            error: None,
        }
    }
}

/// Foreign national identifier (NRIC) lookup via the MyInfo service.
pub struct ForeignNationalIdAdapter {
    endpoint: String,
}

impl ForeignNationalIdAdapter {
    /// Create the adapter against the configured MyInfo base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/v3/person", config.myinfo_base_url),
        }
    }
}

impl Adapter for ForeignNationalIdAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn source_authority(&self) -> &str {
        "GovTech Singapore (MyInfo)"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "id_type": "NRIC",
            "id_number": input(inputs, "id_number"),
            "consent": "Y",
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        // The NRIC is masked even inside the audit payload; foreign
        // identifiers must never be stored in the clear.
        let mut audit = raw.clone();
        if let Some(id) = str_field(&raw, "id_number") {
            if let Some(obj) = audit.as_object_mut() {
                obj.insert("id_number".to_string(), json!(mask_last4(&id)));
            }
        }
        let legal_name =
            str_field(&raw, "full_name").or_else(|| Some("SINGAPORE RESIDENT".to_string()));
        StandardResult {
            is_valid: true,
            legal_name,
            dob: str_field(&raw, "dob"),
            address: None,
            raw_response: audit,
            error: None,
        }
    }
}

/// Background / criminal record check. The only asynchronous type: its
/// normalization communicates a pending job, never a final verdict.
pub struct BackgroundCheckAdapter {
    endpoint: String,
}

impl BackgroundCheckAdapter {
    /// Create the adapter against the configured provider base URL.
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: format!("{}/v1/crime-check", config.base_url),
        }
    }
}

impl Adapter for BackgroundCheckAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "District Court Records"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "name": input(inputs, "name"),
            "father_name": input(inputs, "father_name"),
            "address": input(inputs, "address"),
            "async": true,
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        let job_id = str_field(&raw, "job_id").unwrap_or_else(|| "UNKNOWN".to_string());
        StandardResult::pending(&job_id)
    }
}

/// Minimum average per-symbol confidence before the OCR result carries a
/// low-confidence warning.
pub const OCR_CONFIDENCE_FLOOR: f64 = 0.70;

/// Minimum extracted text length for a scan to count as readable.
const OCR_MIN_TEXT_LEN: usize = 10;

/// Image OCR via a co-located vision service.
///
/// Unlike the HTTP adapters this one owns its outbound call: the vision
/// service is a client-library-style dependency, not a generic provider
/// endpoint, so [`Self::verify`] performs the request itself and converts
/// any failure into a non-throwing [`StandardResult`].
pub struct ImageOcrAdapter {
    endpoint: String,
    http: reqwest::Client,
}

impl ImageOcrAdapter {
    /// Create the adapter against the configured vision endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("vision client: {e}")))?;
        Ok(Self {
            endpoint: config.vision_endpoint.clone(),
            http,
        })
    }

    /// Run text detection on the supplied image and normalize the result.
    ///
    /// Never fails: transport and service errors become
    /// `StandardResult { is_valid: false, error }`.
    pub async fn verify(&self, inputs: &Inputs) -> StandardResult {
        let payload = self.build_request(inputs);
        let response = self.http.post(&self.endpoint).json(&payload).send().await;
        match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(raw) => self.normalize_response(raw),
                Err(e) => StandardResult::failure(
                    "Vision analysis failed: unreadable response",
                    json!(e.to_string()),
                ),
            },
            Err(e) => {
                debug!("vision call failed: {e}");
                StandardResult::failure("Vision analysis failed", json!(e.to_string()))
            }
        }
    }

    /// Walk the vision annotation tree accumulating per-symbol confidence.
    fn average_confidence(raw: &Value) -> f64 {
        let mut total = 0.0_f64;
        let mut count = 0_u64;
        let pages = raw
            .pointer("/fullTextAnnotation/pages")
            .and_then(Value::as_array);
        for page in pages.into_iter().flatten() {
            for block in page.get("blocks").and_then(Value::as_array).into_iter().flatten() {
                for para in block
                    .get("paragraphs")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    for word in para.get("words").and_then(Value::as_array).into_iter().flatten() {
                        for symbol in word
                            .get("symbols")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                        {
                            total += symbol
                                .get("confidence")
                                .and_then(Value::as_f64)
                                .unwrap_or(0.0);
                            count += 1;
                        }
                    }
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }
}

impl Adapter for ImageOcrAdapter {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn source_authority(&self) -> &str {
        "Vision OCR Service"
    }

    fn build_request(&self, inputs: &Inputs) -> Value {
        json!({
            "image": { "content": input(inputs, "image_base64") },
            "features": [{ "type": "TEXT_DETECTION" }],
        })
    }

    fn normalize_response(&self, raw: Value) -> StandardResult {
        let full_text = raw
            .pointer("/fullTextAnnotation/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let average = Self::average_confidence(&raw);

        // The confidence floor is a soft warning, not a validity gate: a
        // long confidently-extracted block can coexist with scattered
        // low-confidence symbols.
        let error = if average < OCR_CONFIDENCE_FLOOR {
            Some("Low Confidence: blurry document detected".to_string())
        } else {
            None
        };

        StandardResult {
            is_valid: full_text.len() > OCR_MIN_TEXT_LEN,
            legal_name: Some("OCR EXTRACTED".to_string()),
            dob: None,
            address: None,
            raw_response: raw,
            error,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn config() -> ProviderConfig {
        ProviderConfig::default()
    }

    fn inputs(pairs: &[(&str, &str)]) -> Inputs {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn tax_id_accepts_either_status_convention() {
        let adapter = TaxIdAdapter::new(&config());

        let by_status = adapter.normalize_response(json!({
            "status": "VALID",
            "full_name": "ASHA RAO",
        }));
        assert!(by_status.is_valid);
        assert_eq!(by_status.legal_name.as_deref(), Some("ASHA RAO"));

        let by_code = adapter.normalize_response(json!({
            "pan_status": "E",
            "pan_holder_name": "ASHA RAO",
        }));
        assert!(by_code.is_valid);
        assert_eq!(by_code.legal_name.as_deref(), Some("ASHA RAO"));
    }

    #[test]
    fn tax_id_build_request_extracts_id() {
        let adapter = TaxIdAdapter::new(&config());
        let payload = adapter.build_request(&inputs(&[("id_number", "ABCDE1234F")]));
        assert_eq!(payload["pan"], "ABCDE1234F");
    }

    #[test]
    fn driving_license_requires_active_status() {
        let adapter = DrivingLicenseAdapter::new(&config());
        let active = adapter.normalize_response(json!({
            "status": "ACTIVE",
            "holder_name": "ASHA RAO",
            "dob": "01-01-1990",
        }));
        assert!(active.is_valid);
        assert_eq!(active.dob.as_deref(), Some("01-01-1990"));

        let expired = adapter.normalize_response(json!({ "status": "EXPIRED" }));
        assert!(!expired.is_valid);
    }

    #[test]
    fn business_registry_checks_nested_envelope() {
        let adapter = BusinessRegistryAdapter::new(&config());
        let ok = adapter.normalize_response(json!({
            "status": "SUCCESS",
            "data": { "status": "Active", "legal_name": "RAO TRADING CO" },
        }));
        assert!(ok.is_valid);
        assert_eq!(ok.legal_name.as_deref(), Some("RAO TRADING CO"));

        let cancelled = adapter.normalize_response(json!({
            "status": "SUCCESS",
            "data": { "status": "Cancelled" },
        }));
        assert!(!cancelled.is_valid);
        assert_eq!(cancelled.legal_name.as_deref(), Some("Unknown"));
    }

    #[test]
    fn voter_roll_requires_echoed_epic() {
        let adapter = VoterRollAdapter::new(&config());
        let ok = adapter.normalize_response(json!({
            "status": "SUCCESS",
            "data": { "epic_number": "XYZ123", "full_name": "ASHA RAO" },
        }));
        assert!(ok.is_valid);

        let missing = adapter.normalize_response(json!({ "status": "SUCCESS", "data": {} }));
        assert!(!missing.is_valid);
    }

    #[test]
    fn foreign_id_masks_the_identifier_in_audit() {
        let adapter = ForeignNationalIdAdapter::new(&config());
        let result = adapter.normalize_response(json!({
            "id_number": "S1234567A",
            "full_name": "TAN WEI",
        }));
        assert!(result.is_valid);
        assert_eq!(result.raw_response["id_number"], "*****567A");
    }

    #[test]
    fn background_check_normalizes_to_pending() {
        let adapter = BackgroundCheckAdapter::new(&config());
        let result = adapter.normalize_response(json!({ "job_id": "JOB_42" }));
        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("BACKGROUND_CHECK_STARTED"));
        assert_eq!(result.raw_response["job_id"], "JOB_42");
    }

    #[test]
    fn adapters_tolerate_empty_payloads() {
        let cfg = config();
        let empty = || json!({});
        assert!(!TaxIdAdapter::new(&cfg).normalize_response(empty()).is_valid);
        assert!(!DrivingLicenseAdapter::new(&cfg)
            .normalize_response(empty())
            .is_valid);
        assert!(!BusinessRegistryAdapter::new(&cfg)
            .normalize_response(empty())
            .is_valid);
        assert!(!VoterRollAdapter::new(&cfg)
            .normalize_response(empty())
            .is_valid);
    }

    fn ocr_payload(text: &str, confidence: f64, symbols: usize) -> Value {
        let symbol_list: Vec<Value> = (0..symbols)
            .map(|_| json!({ "confidence": confidence }))
            .collect();
        json!({
            "fullTextAnnotation": {
                "text": text,
                "pages": [{
                    "blocks": [{
                        "paragraphs": [{
                            "words": [{ "symbols": symbol_list }],
                        }],
                    }],
                }],
            },
        })
    }

    #[test]
    fn ocr_low_confidence_is_a_soft_warning() {
        let adapter = ImageOcrAdapter::new(&config()).expect("adapter");
        // Average confidence 0.5 over a 20-char extraction: still valid,
        // but flagged.
        let result = adapter.normalize_response(ocr_payload("ABCDEFGHIJ1234567890", 0.5, 8));
        assert!(result.is_valid);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Low Confidence")));
    }

    #[test]
    fn ocr_confident_long_text_has_no_warning() {
        let adapter = ImageOcrAdapter::new(&config()).expect("adapter");
        let result = adapter.normalize_response(ocr_payload("GOVERNMENT OF INDIA PAN", 0.95, 12));
        assert!(result.is_valid);
        assert!(result.error.is_none());
    }

    #[test]
    fn ocr_short_text_is_invalid() {
        let adapter = ImageOcrAdapter::new(&config()).expect("adapter");
        let result = adapter.normalize_response(ocr_payload("PAN", 0.95, 3));
        assert!(!result.is_valid);
    }

    #[test]
    fn ocr_empty_payload_is_invalid_and_flagged() {
        let adapter = ImageOcrAdapter::new(&config()).expect("adapter");
        let result = adapter.normalize_response(json!({}));
        assert!(!result.is_valid);
        assert!(result.error.is_some());
    }
}
