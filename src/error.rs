//! Error types for the signing pipeline.
//!
//! Every failure is terminal for a job. Variants carry the context needed to act
//! on them (page selector, alias, serial number, URL or byte offset) so callers
//! never need access to internal state.

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading credentials, reading PDFs and signing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The PKCS#12 bundle could not be decoded (wrong password or malformed bytes)
    #[error("Invalid credential bundle: {0}")]
    CredentialFormat(String),

    /// No key entry in the bundle holds an end-entity certificate
    #[error("User certificate not found")]
    CertificateNotFound,

    /// The selected end-entity certificate is past its notAfter date
    #[error("Certificate with serial number '{serial}' (alias '{alias}') has expired.")]
    CertificateExpired {
        /// Uppercase hex serial number
        serial: String,
        /// Alias of the bundle entry
        alias: String,
    },

    /// The selected end-entity certificate is before its notBefore date
    #[error("Certificate with serial number '{serial}' (alias '{alias}') is not yet valid.")]
    CertificateNotYetValid {
        /// Uppercase hex serial number
        serial: String,
        /// Alias of the bundle entry
        alias: String,
    },

    /// Page selector is malformed or outside the document
    #[error("Invalid page '{selector}': document has {total_pages} page(s)")]
    InvalidPage {
        /// The selector as supplied
        selector: String,
        /// Page count of the document
        total_pages: u32,
    },

    /// The requested combination of options or document state cannot be signed
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Timestamp authority request failed after timestamping was requested
    #[error("Timestamp authority '{url}' failed: {reason}")]
    TimestampAuthority {
        /// Authority URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic or container assembly failure
    #[error("Signature construction failed: {0}")]
    SignatureConstruction(String),

    /// A job option failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// JSON payload error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 payload error
    #[error("Encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
}

impl Error {
    /// Stable name of the error kind, used in machine-readable responses.
    pub fn category(&self) -> &'static str {
        match self {
            Error::CredentialFormat(_) => "CredentialFormatError",
            Error::CertificateNotFound => "CertificateNotFoundError",
            Error::CertificateExpired { .. } => "CertificateExpiredError",
            Error::CertificateNotYetValid { .. } => "CertificateNotYetValidError",
            Error::InvalidPage { .. } => "InvalidPageError",
            Error::UnsupportedConfiguration(_) => "UnsupportedConfigurationError",
            Error::TimestampAuthority { .. } => "TimestampAuthorityError",
            Error::Io(_) => "IOError",
            Error::SignatureConstruction(_) => "SignatureConstructionError",
            Error::InvalidRequest(_) | Error::Serialization(_) | Error::Encoding(_) => {
                "InvalidRequestError"
            },
            Error::InvalidPdf(_)
            | Error::ParseError { .. }
            | Error::ObjectNotFound(..)
            | Error::Decode(_)
            | Error::UnsupportedFilter(_) => "InvalidPdfError",
        }
    }

    /// The error message followed by every message in its `source()` chain.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            messages.push(cause.to_string());
            source = cause.source();
        }
        messages
    }
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::SignatureConstruction(format!("DER encoding failed: {}", e))
    }
}
