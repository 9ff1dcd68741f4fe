//! PDF digital signatures.
//!
//! Creates detached CAdES signatures over PDF documents and reads them back.
//!
//! ## Features
//!
//! - **Credential selection**: decode a PKCS#12 bundle and pick its end-entity certificate
//! - **Signature creation**: sign one page or every page as chained incremental updates
//! - **Certification**: DocMDP "no changes allowed" signatures
//! - **Timestamps**: RFC 3161 tokens embedded as unsigned attributes (CAdES-T)
//! - **Verification**: byte range, digest, signature value and DocMDP checks
//!
//! ## Example
//!
//! ```ignore
//! use pdf_seal::config::SigningContext;
//! use pdf_seal::signatures::{CredentialStore, PageResolver, PdfRevision, SignatureEngine, SignatureOptions};
//!
//! let ctx = SigningContext::default();
//! let store = CredentialStore::open(&ctx, &bundle, "secret")?;
//! let engine = SignatureEngine::from_store(&ctx, &store)?;
//! let options = SignatureOptions::default().with_reason("Approved");
//! let target = PageResolver::resolve("L", page_count)?;
//! let signed = engine.sign_pages(PdfRevision::new(pdf_bytes), &target, &options)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ETSI EN 319 142 - PAdES
//! - RFC 3161 - Time-Stamp Protocol

mod byterange;
mod cms;
mod credential;
mod keys;
mod pages;
mod signer;
mod timestamp;
mod types;
mod verifier;

pub use byterange::ByteRangeCalculator;
pub use self::cms::{check_signer, parse_container, CadesBuilder, SignerCheck};
pub use credential::{
    decode_pkcs12, select_end_entity, summarize_certificate, CredentialEntry, CredentialStore,
    SelectedCertificate,
};
pub use keys::{SigningKey, VerifyingKey};
pub use pages::{PageResolver, PageSelector, PageTarget};
pub use signer::{pdf_date, unique_field_name, PdfRevision, SignatureEngine};
pub use timestamp::{TimestampClient, TimestampConfig, TimestampSource};
pub use types::{
    CertificateSummary, CertificationLevel, DigestAlgorithm, SignatureField, SignatureInfo,
    SignatureOptions, SignatureSubFilter, VerificationResult, VerificationStatus,
    MAX_CUSTOM_TEXT_LEN, MAX_LOCATION_LEN, MAX_REASON_LEN,
};
pub use verifier::SignatureVerifier;
