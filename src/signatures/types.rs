//! Digital signature types and data structures.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::ObjectRef;
use crate::signatures::pages::PageSelector;
use crate::signatures::timestamp::TimestampConfig;
use der::asn1::ObjectIdentifier;
use sha2::Digest;

/// Maximum length of the reason string.
pub const MAX_REASON_LEN: usize = 25;
/// Maximum length of the location string.
pub const MAX_LOCATION_LEN: usize = 40;
/// Maximum length of the custom appearance text.
pub const MAX_CUSTOM_TEXT_LEN: usize = 60;

/// Digest algorithm of a signature.
///
/// New signatures always use SHA-256; the others are recognised when reading
/// signatures produced elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-1 (legacy)
    Sha1,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Object identifier of the algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => ObjectIdentifier::new_unwrap("1.3.14.3.2.26"),
            DigestAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            DigestAlgorithm::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            DigestAlgorithm::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
        }
    }

    /// Algorithm for an object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Hash `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of `parts`.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            DigestAlgorithm::Sha1 => run::<sha1::Sha1>(parts),
            DigestAlgorithm::Sha256 => run::<sha2::Sha256>(parts),
            DigestAlgorithm::Sha384 => run::<sha2::Sha384>(parts),
            DigestAlgorithm::Sha512 => run::<sha2::Sha512>(parts),
        }
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    #[default]
    CadesDetached,
    /// ETSI.RFC3161 - Document timestamp
    Rfc3161,
}

impl SignatureSubFilter {
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }
}

/// Whether a signature certifies the document or merely approves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificationLevel {
    /// Approval signature; later incremental updates remain permitted
    Approval,
    /// Certifying signature with DocMDP P=1; no later changes permitted
    NoChangesAllowed,
}

impl CertificationLevel {
    /// Level implied by the `changesAllowed` option.
    pub fn from_changes_allowed(changes_allowed: bool) -> Self {
        if changes_allowed {
            CertificationLevel::Approval
        } else {
            CertificationLevel::NoChangesAllowed
        }
    }

    /// DocMDP `/P` value written for this level, if any.
    pub fn docmdp_permission(&self) -> Option<i64> {
        match self {
            CertificationLevel::Approval => None,
            CertificationLevel::NoChangesAllowed => Some(1),
        }
    }
}

/// Human-readable summary of an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Subject common name (empty when absent)
    pub common_name: String,
    /// Full subject distinguished name
    pub subject: String,
    /// Serial number as uppercase hex
    pub serial_number: String,
    /// Start of validity (RFC 3339)
    pub not_before: String,
    /// End of validity (RFC 3339)
    pub not_after: String,
    /// Full issuer distinguished name
    pub issuer: String,
}

/// Options controlling one signing job.
#[derive(Debug, Clone)]
pub struct SignatureOptions {
    /// Which page(s) receive a signature
    pub page: PageSelector,
    /// Widget rectangle; zero area means an invisible signature
    pub rect: Rect,
    /// Reason shown in the signature dictionary and appearance
    pub reason: String,
    /// Location shown in the signature dictionary and appearance
    pub location: String,
    /// Extra line of appearance text
    pub custom_text: String,
    /// False makes the (single) signature certifying with no changes allowed
    pub changes_allowed: bool,
    /// Simplified rendering without the legacy validity layers
    pub green_tick: bool,
    /// Timestamp authority settings
    pub timestamp: TimestampConfig,
    /// Accepted for compatibility; long-term validation data is never embedded
    pub enable_ltv: bool,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            page: PageSelector::Last,
            rect: Rect::default(),
            reason: String::new(),
            location: String::new(),
            custom_text: String::new(),
            changes_allowed: true,
            green_tick: false,
            timestamp: TimestampConfig::default(),
            enable_ltv: false,
        }
    }
}

impl SignatureOptions {
    /// Place the signature on the given page(s).
    pub fn with_page(mut self, page: PageSelector) -> Self {
        self.page = page;
        self
    }

    /// Visible rectangle from two corners.
    pub fn with_rect(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.rect = Rect::from_points(x0, y0, x1, y1);
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_custom_text(mut self, text: impl Into<String>) -> Self {
        self.custom_text = text.into();
        self
    }

    pub fn with_changes_allowed(mut self, allowed: bool) -> Self {
        self.changes_allowed = allowed;
        self
    }

    pub fn with_green_tick(mut self, green_tick: bool) -> Self {
        self.green_tick = green_tick;
        self
    }

    /// Enable timestamping.
    pub fn with_timestamp(mut self, timestamp: TimestampConfig) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the option combination, length limits and the timestamp settings.
    ///
    /// Signing every page with no changes allowed is refused first, ahead of
    /// every other check.
    pub fn validate(&self) -> Result<()> {
        if self.page == PageSelector::All && !self.changes_allowed {
            return Err(Error::UnsupportedConfiguration(
                "signing all pages requires changesAllowed=true; a certifying signature on one page \
                 would invalidate every later signing pass"
                    .to_string(),
            ));
        }

        check_len("reason", &self.reason, MAX_REASON_LEN)?;
        check_len("location", &self.location, MAX_LOCATION_LEN)?;
        check_len("customText", &self.custom_text, MAX_CUSTOM_TEXT_LEN)?;
        self.timestamp.validate()
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::InvalidRequest(format!(
            "{} is {} characters long; at most {} allowed",
            field, len, max
        )));
    }
    Ok(())
}

/// A signature field found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureField {
    /// Fully qualified field name
    pub name: String,
    /// 1-based page of the widget, when it could be located
    pub page: Option<u32>,
    /// Widget rectangle; `None` or empty for invisible signatures
    pub rect: Option<Rect>,
    /// Widget annotation object
    pub widget: Option<ObjectRef>,
    /// Signature dictionary object (`/V`); `None` for unsigned fields
    pub signature: Option<ObjectRef>,
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Field name
    pub field_name: String,
    /// 1-based page of the widget
    pub page: Option<u32>,
    /// `/Name` entry
    pub signer_name: Option<String>,
    /// `/M` entry
    pub signing_time: Option<String>,
    /// `/Reason` entry
    pub reason: Option<String>,
    /// `/Location` entry
    pub location: Option<String>,
    /// `/ContactInfo` entry
    pub contact_info: Option<String>,
    /// Signature format
    pub sub_filter: Option<SignatureSubFilter>,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Whether the signature covers the whole file
    pub covers_whole_document: bool,
    /// DocMDP `/P` of a certifying signature
    pub certification: Option<i64>,
    /// Signer certificate
    pub certificate: Option<CertificateSummary>,
}

/// Result of signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Overall verification status
    pub status: VerificationStatus,
    /// Signature information
    pub signature_info: SignatureInfo,
    /// Verification messages (errors, warnings)
    pub messages: Vec<String>,
    /// Byte range starts at 0, skips exactly `/Contents` and ends at a revision end
    pub byte_range_valid: bool,
    /// Digest over the byte range equals the signed message-digest attribute
    pub digest_matches: bool,
    /// Signature value verifies against the signer certificate
    pub signature_valid: bool,
    /// Whether the document was modified after signing
    pub document_modified: bool,
    /// A no-changes certification was followed by another revision
    pub docmdp_violation: bool,
    /// Whether the certificate chains to a trusted root
    pub certificate_trusted: bool,
    /// Whether the certificate has expired
    pub certificate_expired: bool,
    /// Timestamp imprint check, if a token is present
    pub timestamp_valid: Option<bool>,
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self {
            status: VerificationStatus::Unknown,
            signature_info: SignatureInfo::default(),
            messages: Vec::new(),
            byte_range_valid: false,
            digest_matches: false,
            signature_valid: false,
            document_modified: false,
            docmdp_violation: false,
            certificate_trusted: false,
            certificate_expired: false,
            timestamp_valid: None,
        }
    }
}

/// Verification status of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Signature is valid
    Valid,
    /// Signature is invalid (cryptographically or structurally)
    Invalid,
    /// Signature could not be evaluated
    Unknown,
    /// Signature is valid but something about it deserves attention
    ValidWithWarnings,
}

impl VerificationStatus {
    /// Check if the status indicates a valid signature.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationStatus::Valid)
    }

    /// Check if the status indicates any form of validity (including warnings).
    pub fn is_ok(&self) -> bool {
        matches!(self, VerificationStatus::Valid | VerificationStatus::ValidWithWarnings)
    }
}
