//! Running a signing job end to end.

use super::output::{finalize, SignedOutput};
use super::request::SignatureRequest;
use crate::config::SigningContext;
use crate::document::PdfDocument;
use crate::error::Result;
use crate::signatures::{
    CertificateSummary, CredentialStore, PdfRevision, SignatureEngine, TimestampClient,
    TimestampSource,
};
use std::path::Path;

/// One signing job: a request plus, optionally, a preconfigured timestamp source.
pub struct SigningJob {
    request: SignatureRequest,
    timestamp_source: Option<Box<dyn TimestampSource>>,
}

impl std::fmt::Debug for SigningJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningJob")
            .field("request", &self.request)
            .field("timestamp_source", &self.timestamp_source.is_some())
            .finish()
    }
}

impl SigningJob {
    pub fn new(request: SignatureRequest) -> Self {
        Self {
            request,
            timestamp_source: None,
        }
    }

    /// Use `source` for tokens instead of an HTTP client built from the
    /// request's timestamp settings. Only consulted when timestamping is enabled.
    pub fn with_timestamp_source(mut self, source: Box<dyn TimestampSource>) -> Self {
        self.timestamp_source = Some(source);
        self
    }

    pub fn request(&self) -> &SignatureRequest {
        &self.request
    }

    /// Sign and write the result into `output_dir`.
    ///
    /// Either the signed file exists afterwards or nothing was written.
    pub fn run(self, ctx: &SigningContext, output_dir: &Path) -> Result<SignedOutput> {
        let signed = self.sign(ctx)?;
        finalize(ctx, signed.as_bytes(), output_dir)
    }

    /// Produce the signed revision without writing it anywhere.
    pub fn sign(self, ctx: &SigningContext) -> Result<PdfRevision> {
        let SigningJob {
            request,
            timestamp_source,
        } = self;
        let options = &request.options;

        request.validate()?;
        if options.enable_ltv {
            log::warn!("Long-term validation was requested but is not supported; ignoring");
        }

        let store = CredentialStore::open(ctx, &request.bundle, &request.bundle_password)?;

        let page_count = PdfDocument::open(&request.document, &request.document_password)?.page_count()?;
        let target = options.page.resolve(page_count)?;
        log::debug!("Document has {} page(s), signing {:?}", page_count, target.pages());

        let mut engine = SignatureEngine::from_store(ctx, &store)?;
        drop(store);
        if options.timestamp.is_active() {
            let source = match timestamp_source {
                Some(source) => source,
                None => Box::new(TimestampClient::new(options.timestamp.clone(), ctx)?),
            };
            engine = engine.with_timestamp(source);
        }

        let signed = engine.sign_pages(PdfRevision::new(request.document.clone()), &target, options)?;
        drop(engine);

        log::info!("Signed {} page(s), {} bytes", target.pages().len(), signed.len());
        Ok(signed)
    }
}

/// Decode a bundle and describe the certificate a signing job would use.
pub fn inspect_credential(ctx: &SigningContext, bundle: &[u8], password: &str) -> Result<CertificateSummary> {
    let store = CredentialStore::open(ctx, bundle, password)?;
    Ok(store.selected().summary.clone())
}
