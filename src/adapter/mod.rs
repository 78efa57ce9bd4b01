//! Provider adapters - per-document-type translators between generic
//! verification inputs and each provider's request/response shape.
//!
//! Adapters are pure: `build_request` performs no I/O and never fails for
//! well-formed inputs, and `normalize_response` degrades to an invalid
//! result with a populated error rather than panicking on a partial
//! payload. The one exception is the OCR adapter, which owns its own
//! outbound call (see [`providers::ImageOcrAdapter`]).

pub mod providers;
pub mod registry;

pub use registry::Registry;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Caller-supplied verification inputs, keyed by field name.
///
/// Well-known keys: `id_number`, `registration_number`, `dob`, `name`,
/// `father_name`, `address`, `access_token`, `image_base64`.
pub type Inputs = HashMap<String, String>;

/// The closed set of document types the gateway can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// National tax identifier (PAN).
    TaxId,
    /// Driving license.
    DrivingLicense,
    /// Business registration (GST).
    BusinessRegistry,
    /// Voter roll entry (EPIC).
    VoterRoll,
    /// Cloud document locker pull.
    DocumentLocker,
    /// Foreign national identifier (NRIC via MyInfo).
    ForeignNationalId,
    /// OCR scan of a physical document image.
    ImageOcr,
    /// Background / criminal record check. Completes asynchronously.
    BackgroundCheck,
}

impl DocumentType {
    /// Wire name used by callers and stored in records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaxId => "TAX_ID",
            Self::DrivingLicense => "DRIVING_LICENSE",
            Self::BusinessRegistry => "BUSINESS_REGISTRY",
            Self::VoterRoll => "VOTER_ROLL",
            Self::DocumentLocker => "DOCUMENT_LOCKER",
            Self::ForeignNationalId => "FOREIGN_NATIONAL_ID",
            Self::ImageOcr => "IMAGE_OCR",
            Self::BackgroundCheck => "BACKGROUND_CHECK",
        }
    }

    /// True when the provider cannot answer within the request lifetime
    /// and the gateway must defer to a background job.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::BackgroundCheck)
    }

    /// All supported document types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::TaxId,
            Self::DrivingLicense,
            Self::BusinessRegistry,
            Self::VoterRoll,
            Self::DocumentLocker,
            Self::ForeignNationalId,
            Self::ImageOcr,
            Self::BackgroundCheck,
        ]
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    /// Parse a caller-supplied type string. Unknown types fail fast with a
    /// client-error classification.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnsupportedType(s.to_string()))
    }
}

/// HTTP method a provider endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    /// Payload sent as query parameters.
    Get,
    /// Payload sent as a JSON body.
    Post,
}

/// The normalized, provider-agnostic verification outcome.
///
/// Every adapter reduces its provider's response to this shape. The raw
/// payload is retained for audit only and is stripped by
/// [`Self::redacted`] before the result leaves the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardResult {
    /// Whether the provider confirmed the document.
    pub is_valid: bool,
    /// Legal name on record with the authority, when returned.
    pub legal_name: Option<String>,
    /// Date of birth on record, when returned.
    pub dob: Option<String>,
    /// Address on record, when returned.
    pub address: Option<String>,
    /// Opaque provider payload, retained for the audit trail.
    pub raw_response: Value,
    /// Failure or warning reason. A populated error with `is_valid: true`
    /// is a soft warning, not a rejection.
    pub error: Option<String>,
}

impl StandardResult {
    /// A non-throwing failure result. Used wherever a transport or
    /// provider error must become data instead of propagating.
    #[must_use]
    pub fn failure(error: impl Into<String>, raw_response: Value) -> Self {
        Self {
            is_valid: false,
            legal_name: None,
            dob: None,
            address: None,
            raw_response,
            error: Some(error.into()),
        }
    }

    /// The immediate answer for an asynchronous document type: not valid
    /// yet, carrying the job id the caller can poll.
    #[must_use]
    pub fn pending(job_id: &str) -> Self {
        Self {
            is_valid: false,
            legal_name: Some("Pending Verification".to_string()),
            dob: None,
            address: None,
            raw_response: serde_json::json!({
                "status": "PENDING_BACKGROUND_CHECK",
                "job_id": job_id,
                "message": "This check completes out of band. You will be notified.",
            }),
            error: Some("BACKGROUND_CHECK_STARTED".to_string()),
        }
    }

    /// Copy with the raw provider payload removed, safe to return to
    /// callers. The audit record keeps the unredacted original.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.raw_response = Value::Null;
        copy
    }
}

/// A type-specific translator between generic verification inputs and a
/// provider's request/response shape.
pub trait Adapter: Send + Sync {
    /// Provider endpoint URL.
    fn endpoint(&self) -> &str;

    /// HTTP method the endpoint expects.
    fn method(&self) -> HttpMethod;

    /// Human-readable label of the answering authority, for audit.
    fn source_authority(&self) -> &str;

    /// Build the provider-specific request payload. Pure; must not
    /// perform I/O or fail for well-formed inputs.
    fn build_request(&self, inputs: &Inputs) -> Value;

    /// Normalize the provider's response. Pure; must tolerate partially
    /// populated payloads and degrade to `is_valid: false` with an error
    /// rather than panicking.
    fn normalize_response(&self, raw: Value) -> StandardResult;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types() {
        for doc_type in DocumentType::all() {
            let parsed: DocumentType = doc_type
                .as_str()
                .parse()
                .unwrap_or_else(|_| panic!("{doc_type} should round-trip"));
            assert_eq!(parsed, *doc_type);
        }
    }

    #[test]
    fn unknown_type_is_a_client_error() {
        let err = "PASSPORT".parse::<DocumentType>().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn only_background_check_is_async() {
        for doc_type in DocumentType::all() {
            assert_eq!(
                doc_type.is_async(),
                *doc_type == DocumentType::BackgroundCheck
            );
        }
    }

    #[test]
    fn pending_result_carries_job_id() {
        let result = StandardResult::pending("JOB_1");
        assert!(!result.is_valid);
        assert_eq!(result.raw_response["job_id"], "JOB_1");
        assert_eq!(result.error.as_deref(), Some("BACKGROUND_CHECK_STARTED"));
    }

    #[test]
    fn redacted_drops_raw_payload() {
        let result = StandardResult::failure("x", serde_json::json!({"pii": "value"}));
        assert!(result.redacted().raw_response.is_null());
        assert!(!result.raw_response.is_null());
    }
}
