// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Seal
//!
//! Detached CAdES signatures for PDF documents.
//!
//! ## Core Features
//!
//! - **Credential selection**: the end-entity certificate of a PKCS#12 bundle, checked
//!   against its validity window
//! - **Signing**: SHA-256 byte-range digests, RSA and ECDSA keys, full chain embedded
//! - **Certification**: DocMDP "no changes allowed" on single-page signatures
//! - **All-pages mode**: one signature per page, each pass an incremental update of the last
//! - **Timestamps**: RFC 3161 tokens from a configured authority (CAdES-T)
//! - **Visible widgets**: name and description rendered into the widget appearance
//! - **Read-back**: every signature of a document verified against its own revision
//!
//! ## Architecture
//!
//! - [`document`] reads just enough of a PDF to find pages, forms and existing signatures
//! - [`writer`] appends incremental updates and builds widget appearances
//! - [`signatures`] holds credential loading, the CAdES container, the signature engine
//!   and the verifier
//! - [`api`] runs a whole job from request to output file
//! - [`payload`] is the JSON surface of the `pdfseal` binary
//!
//! No process-wide state is kept: the clock and tunables travel in a
//! [`config::SigningContext`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_seal::api::{SignatureRequest, SigningJob};
//! use pdf_seal::config::SigningContext;
//! use pdf_seal::signatures::{PageSelector, SignatureOptions, SignatureVerifier};
//!
//! # fn main() -> pdf_seal::Result<()> {
//! let ctx = SigningContext::default();
//! let options = SignatureOptions::default()
//!     .with_page(PageSelector::First)
//!     .with_rect(50.0, 50.0, 250.0, 110.0)
//!     .with_reason("Approved");
//! let request = SignatureRequest::new(std::fs::read("in.pdf")?, std::fs::read("me.p12")?, "secret")
//!     .with_options(options);
//! let signed = SigningJob::new(request).sign(&ctx)?;
//!
//! for result in SignatureVerifier::new().verify_document(signed.as_bytes())? {
//!     println!("{}: {:?}", result.signature_info.field_name, result.status);
//! }
//! # Ok(())
//! # }
//! ```

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Geometry primitives
pub mod geometry;

// Document reading
pub mod document;

// Incremental updates and appearances
pub mod writer;

// Digital signatures
pub mod signatures;

// High-level API
pub mod api;

// Command-line payloads and responses
pub mod payload;

// Re-exports
pub use document::PdfDocument;
pub use error::{Error, Result};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
