//! The in-memory description of one signing job.

use crate::error::{Error, Result};
use crate::signatures::SignatureOptions;
use zeroize::Zeroizing;

/// A validated-on-demand signing request: document, credential bundle and options.
///
/// Bundle bytes and passwords are wiped when the request is dropped.
#[derive(Clone)]
pub struct SignatureRequest {
    /// Raw PDF bytes
    pub document: Vec<u8>,
    /// Open password of the document (empty for none)
    pub document_password: Zeroizing<String>,
    /// PKCS#12 bundle bytes
    pub bundle: Zeroizing<Vec<u8>>,
    /// Bundle password
    pub bundle_password: Zeroizing<String>,
    /// Placement, appearance, certification and timestamp options
    pub options: SignatureOptions,
}

impl std::fmt::Debug for SignatureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureRequest")
            .field("document", &format!("{} bytes", self.document.len()))
            .field("document_password", &"[REDACTED]")
            .field("bundle", &format!("{} bytes", self.bundle.len()))
            .field("bundle_password", &"[REDACTED]")
            .field("options", &self.options)
            .finish()
    }
}

impl SignatureRequest {
    /// Request with default options.
    pub fn new(document: Vec<u8>, bundle: Vec<u8>, bundle_password: impl Into<String>) -> Self {
        Self {
            document,
            document_password: Zeroizing::new(String::new()),
            bundle: Zeroizing::new(bundle),
            bundle_password: Zeroizing::new(bundle_password.into()),
            options: SignatureOptions::default(),
        }
    }

    pub fn with_document_password(mut self, password: impl Into<String>) -> Self {
        self.document_password = Zeroizing::new(password.into());
        self
    }

    pub fn with_options(mut self, options: SignatureOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the request without parsing the document or the bundle.
    ///
    /// Options are checked before any document byte is looked at.
    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;

        if self.document.is_empty() {
            return Err(Error::InvalidRequest("document is empty".to_string()));
        }
        if !self.document.starts_with(b"%PDF-") {
            return Err(Error::InvalidRequest(
                "document does not start with a %PDF- header".to_string(),
            ));
        }
        if self.bundle.is_empty() {
            return Err(Error::InvalidRequest("certificate bundle is empty".to_string()));
        }
        Ok(())
    }
}
