//! High-level signing API.
//!
//! A [`SignatureRequest`] holds the document, the credential bundle and the
//! options; a [`SigningJob`] runs it and writes the result with [`finalize`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_seal::api::{SignatureRequest, SigningJob};
//! use pdf_seal::config::SigningContext;
//! use pdf_seal::signatures::SignatureOptions;
//!
//! let ctx = SigningContext::default();
//! let request = SignatureRequest::new(pdf_bytes, p12_bytes, "secret")
//!     .with_options(SignatureOptions::default().with_reason("Approved"));
//! let output = SigningJob::new(request).run(&ctx, Path::new("signed"))?;
//! println!("{}", output.file_path.display());
//! ```

mod job;
mod output;
mod request;

pub use job::{inspect_credential, SigningJob};
pub use output::{finalize, SignedOutput, FILE_NAME_FORMAT};
pub use request::SignatureRequest;
