//! PDF signature verification.
//!
//! Reads every signature field of a document back and checks it against the
//! bytes it claims to cover: byte range shape, digest, signature value, the
//! optional timestamp token, and the DocMDP rules of a certifying signature.

use super::byterange::ByteRangeCalculator;
use super::cms::{check_signer, parse_container};
use super::credential::summarize_certificate;
use super::types::{SignatureInfo, SignatureSubFilter, VerificationResult, VerificationStatus};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use der::Encode;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Verifier for PDF digital signatures.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    /// Trusted root certificates (DER-encoded)
    trusted_roots: Vec<Vec<u8>>,
    /// Time at which certificate validity is judged; now when unset
    at: Option<DateTime<Utc>>,
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted root certificate.
    pub fn add_trusted_root(&mut self, cert_der: Vec<u8>) {
        self.trusted_roots.push(cert_der);
    }

    /// Add multiple trusted root certificates.
    pub fn add_trusted_roots(&mut self, certs: Vec<Vec<u8>>) {
        self.trusted_roots.extend(certs);
    }

    /// Judge certificate expiry at `time` instead of now.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.at = Some(time);
        self
    }

    /// Verify every signed signature field of a document, in form order.
    pub fn verify_document(&self, pdf_data: &[u8]) -> Result<Vec<VerificationResult>> {
        let mut doc = PdfDocument::open(pdf_data, "")?;
        let fields = doc.signature_fields()?;
        let mut results = Vec::with_capacity(fields.len());

        for field in fields {
            let Some(sig_ref) = field.signature else {
                log::debug!("Field '{}' is not signed", field.name);
                continue;
            };
            let sig = doc.resolve_dict(&Object::Reference(sig_ref))?;
            let mut result = self.verify(pdf_data, &sig);
            result.signature_info.field_name = field.name;
            result.signature_info.page = field.page;
            result.signature_info.certification = doc.docmdp_permission_of(&sig)?;

            if result.signature_info.certification == Some(1) && result.document_modified {
                result.docmdp_violation = true;
                result.status = VerificationStatus::Invalid;
                result
                    .messages
                    .push("Document was changed after a certification that allows no changes".to_string());
            }
            log::debug!(
                "Signature '{}' on page {:?}: {:?}",
                result.signature_info.field_name,
                result.signature_info.page,
                result.status
            );
            results.push(result);
        }
        Ok(results)
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = sig_dict
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Signature must be a dictionary".to_string()))?;

        let text = |key: &str| dict.get(key).and_then(Object::as_text);
        let byte_range = dict
            .get("ByteRange")
            .and_then(Object::as_array)
            .map(|items| items.iter().filter_map(Object::as_integer).collect())
            .unwrap_or_default();

        Ok(SignatureInfo {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range,
            ..SignatureInfo::default()
        })
    }

    /// Verify one signature dictionary against the document bytes.
    pub fn verify(&self, pdf_data: &[u8], sig: &Dict) -> VerificationResult {
        let mut result = VerificationResult::default();
        match self.extract_signature_info(&Object::Dictionary(sig.clone())) {
            Ok(info) => result.signature_info = info,
            Err(e) => {
                result.messages.push(e.to_string());
                return result;
            },
        }

        let range = result.signature_info.byte_range.clone();
        if range.len() != 4 {
            result.status = VerificationStatus::Invalid;
            result
                .messages
                .push("Invalid ByteRange: expected 4 elements".to_string());
            return result;
        }
        if let Err(e) = ByteRangeCalculator::validate_byte_range(&range, pdf_data) {
            result.status = VerificationStatus::Invalid;
            result.messages.push(format!("ByteRange validation failed: {}", e));
            return result;
        }
        result.byte_range_valid = true;
        result.signature_info.covers_whole_document = (range[2] + range[3]) as usize == pdf_data.len();
        result.document_modified = !result.signature_info.covers_whole_document;
        if result.document_modified {
            result
                .messages
                .push("Document has revisions after this signature".to_string());
        }

        let Some(contents) = sig.get("Contents").and_then(Object::as_string) else {
            result.status = VerificationStatus::Invalid;
            result.messages.push("Signature has no /Contents".to_string());
            return result;
        };
        let signed_data = match parse_container(contents) {
            Ok(signed_data) => signed_data,
            Err(e) => {
                result.status = VerificationStatus::Invalid;
                result.messages.push(format!("Malformed signature container: {}", e));
                return result;
            },
        };
        let check = match ByteRangeCalculator::signed_parts(pdf_data, &range)
            .and_then(|parts| check_signer(&signed_data, &parts))
        {
            Ok(check) => check,
            Err(e) => {
                result.status = VerificationStatus::Unknown;
                result.messages.push(format!("Signature could not be evaluated: {}", e));
                return result;
            },
        };
        result.digest_matches = check.digest_matches;
        result.signature_valid = check.signature_valid;
        result.timestamp_valid = check.timestamp_valid;

        let embedded: Vec<Vec<u8>> = signed_data
            .certificates
            .iter()
            .flat_map(|set| set.0.iter())
            .filter_map(|choice| match choice {
                CertificateChoices::Certificate(cert) => cert.to_der().ok(),
                _ => None,
            })
            .collect();

        match &check.certificate {
            Some(cert_der) => {
                match summarize_certificate(cert_der) {
                    Ok(summary) => result.signature_info.certificate = Some(summary),
                    Err(e) => result.messages.push(format!("Signer certificate unreadable: {}", e)),
                }
                result.certificate_expired = self.is_expired(cert_der);
                if result.certificate_expired {
                    result.messages.push("Certificate has expired".to_string());
                }
            },
            None => result
                .messages
                .push("Signer certificate not found in the container".to_string()),
        }

        if !self.trusted_roots.is_empty() {
            result.certificate_trusted = embedded.iter().any(|cert| self.is_certificate_trusted(cert));
            if !result.certificate_trusted {
                result
                    .messages
                    .push("Certificate chain does not reach a trusted root".to_string());
            }
        }

        if !result.digest_matches {
            result.messages.push("Digest of the signed bytes does not match".to_string());
        }
        if !result.signature_valid {
            result.messages.push("Signature value does not verify".to_string());
        }
        if result.timestamp_valid == Some(false) {
            result.messages.push("Timestamp token does not match the signature".to_string());
        }

        result.status = if !result.digest_matches || !result.signature_valid {
            VerificationStatus::Invalid
        } else if result.certificate_expired
            || result.timestamp_valid == Some(false)
            || (!self.trusted_roots.is_empty() && !result.certificate_trusted)
        {
            VerificationStatus::ValidWithWarnings
        } else {
            VerificationStatus::Valid
        };
        result
    }

    /// Check if a certificate is in the trusted roots.
    fn is_certificate_trusted(&self, cert_der: &[u8]) -> bool {
        self.trusted_roots.iter().any(|root| root == cert_der)
    }

    fn is_expired(&self, cert_der: &[u8]) -> bool {
        let now = self.at.unwrap_or_else(Utc::now).timestamp();
        X509Certificate::from_der(cert_der)
            .map(|(_, cert)| now > cert.validity().not_after.timestamp())
            .unwrap_or(false)
    }
}
