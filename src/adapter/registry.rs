//! Static adapter registry, built once at process start.

use super::providers::{
    BackgroundCheckAdapter, BusinessRegistryAdapter, DocumentLockerAdapter, DrivingLicenseAdapter,
    ForeignNationalIdAdapter, ImageOcrAdapter, TaxIdAdapter, VoterRollAdapter,
};
use super::{Adapter, DocumentType};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Lookup table from document type to its adapter instance.
///
/// The mapping is closed over [`DocumentType`]: every variant resolves,
/// and unknown caller strings are rejected earlier, when parsing the type.
pub struct Registry {
    adapters: HashMap<DocumentType, Box<dyn Adapter>>,
    // The OCR adapter owns its outbound call and is held concretely so the
    // gateway can invoke its combined verify path.
    ocr: ImageOcrAdapter,
}

impl Registry {
    /// Build the registry from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the OCR adapter's HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut adapters: HashMap<DocumentType, Box<dyn Adapter>> = HashMap::new();
        adapters.insert(DocumentType::TaxId, Box::new(TaxIdAdapter::new(config)));
        adapters.insert(
            DocumentType::DrivingLicense,
            Box::new(DrivingLicenseAdapter::new(config)),
        );
        adapters.insert(
            DocumentType::BusinessRegistry,
            Box::new(BusinessRegistryAdapter::new(config)),
        );
        adapters.insert(
            DocumentType::VoterRoll,
            Box::new(VoterRollAdapter::new(config)),
        );
        adapters.insert(
            DocumentType::DocumentLocker,
            Box::new(DocumentLockerAdapter::new(config)),
        );
        adapters.insert(
            DocumentType::ForeignNationalId,
            Box::new(ForeignNationalIdAdapter::new(config)),
        );
        adapters.insert(
            DocumentType::BackgroundCheck,
            Box::new(BackgroundCheckAdapter::new(config)),
        );
        let ocr = ImageOcrAdapter::new(config)?;
        Ok(Self { adapters, ocr })
    }

    /// Resolve the adapter for a document type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] if no adapter is registered.
    /// With the current closed mapping this cannot happen, but the
    /// contract is kept explicit: resolution never silently no-ops.
    pub fn resolve(&self, doc_type: DocumentType) -> Result<&dyn Adapter> {
        if doc_type == DocumentType::ImageOcr {
            return Ok(&self.ocr);
        }
        self.adapters
            .get(&doc_type)
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::UnsupportedType(doc_type.to_string()))
    }

    /// Concrete handle for the OCR adapter's combined verify path.
    #[must_use]
    pub fn ocr(&self) -> &ImageOcrAdapter {
        &self.ocr
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn every_document_type_resolves() {
        let registry = Registry::new(&ProviderConfig::default()).expect("registry");
        for doc_type in DocumentType::all() {
            let adapter = registry.resolve(*doc_type).expect("adapter");
            assert!(!adapter.endpoint().is_empty(), "{doc_type} has an endpoint");
            assert!(!adapter.source_authority().is_empty());
        }
    }
}
