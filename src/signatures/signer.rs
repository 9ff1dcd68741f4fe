//! PDF signing implementation.
//!
//! Each signing pass turns one [`PdfRevision`] into the next: the signature
//! field, its widget and the form/catalog changes are appended as an
//! incremental update with fixed-width placeholders, the byte range around
//! the `/Contents` placeholder is digested, and the CAdES container is written
//! into the placeholder without moving any byte.

use super::byterange::{ByteRangeCalculator, BYTE_RANGE_WIDTH};
use super::cms::CadesBuilder;
use super::credential::CredentialStore;
use super::keys::SigningKey;
use super::pages::PageTarget;
use super::timestamp::TimestampSource;
use super::types::{CertificationLevel, DigestAlgorithm, SignatureOptions, SignatureSubFilter};
use crate::config::SigningContext;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{IncrementalWriter, ObjectSerializer, SignatureAppearance};
use crate::xref::CrossRefTable;
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;

/// Overhead reserved around a timestamp token inside the unsigned attributes.
const TIMESTAMP_ATTRIBUTE_OVERHEAD: usize = 96;

/// Widget flags: Print | Locked.
const WIDGET_FLAGS: i64 = 132;

/// AcroForm flags: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// One state of a document: the original bytes or the output of a signing pass.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfRevision {
    bytes: Vec<u8>,
}

impl PdfRevision {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the revision, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for PdfRevision {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl std::fmt::Debug for PdfRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfRevision").field("len", &self.bytes.len()).finish()
    }
}

/// Where the widget reference has to be added on the page.
#[derive(Debug, Clone)]
enum AnnotsSlot {
    /// `/Annots` is missing or direct: rewrite the page
    Direct(Vec<Object>),
    /// `/Annots` is an indirect array: rewrite the array object
    Indirect(ObjectRef, Vec<Object>),
}

/// Everything read from the previous revision that the update needs.
#[derive(Debug)]
struct UpdatePlan {
    xref: CrossRefTable,
    next_object_number: u32,
    page_ref: ObjectRef,
    page: Dict,
    annots: AnnotsSlot,
    catalog_ref: ObjectRef,
    catalog: Dict,
    perms: Dict,
    extensions: Dict,
    acroform_ref: Option<ObjectRef>,
    acroform: Dict,
    fields: Vec<Object>,
    field_name: String,
}

/// Creates signatures with one credential.
///
/// The engine owns the parsed private key for the duration of a job; dropping
/// it releases (and zeroizes) the key.
pub struct SignatureEngine<'ctx> {
    ctx: &'ctx SigningContext,
    key: SigningKey,
    chain: Vec<Vec<u8>>,
    signer_name: String,
    timestamp: Option<Box<dyn TimestampSource>>,
}

impl std::fmt::Debug for SignatureEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("key", &self.key)
            .field("chain", &format!("{} certificates", self.chain.len()))
            .field("signer_name", &self.signer_name)
            .field("timestamped", &self.timestamp.is_some())
            .finish()
    }
}

impl<'ctx> SignatureEngine<'ctx> {
    /// Engine for `key` and its certificate chain (end-entity first).
    pub fn new(
        ctx: &'ctx SigningContext,
        key: SigningKey,
        chain: Vec<Vec<u8>>,
        signer_name: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            key,
            chain,
            signer_name: signer_name.into(),
            timestamp: None,
        }
    }

    /// Engine for the certificate selected in `store`.
    pub fn from_store(ctx: &'ctx SigningContext, store: &CredentialStore) -> Result<Self> {
        Ok(Self::new(
            ctx,
            store.private_key()?,
            store.certificate_chain().to_vec(),
            store.selected().summary.common_name.clone(),
        ))
    }

    /// Counter-stamp every signature with tokens from `source`.
    pub fn with_timestamp(mut self, source: Box<dyn TimestampSource>) -> Self {
        self.timestamp = Some(source);
        self
    }

    /// Container bytes reserved in each `/Contents` placeholder.
    pub fn reserved_size(&self) -> usize {
        let base = self.ctx.config().signature_size;
        match &self.timestamp {
            Some(source) => base + source.token_size_estimate() + TIMESTAMP_ATTRIBUTE_OVERHEAD,
            None => base,
        }
    }

    /// Sign every page of `target` in order, threading each output revision
    /// into the next pass.
    ///
    /// Multi-page signing always permits changes; asking for a certifying
    /// signature on every page is refused before the first pass.
    pub fn sign_pages(
        &self,
        revision: PdfRevision,
        target: &PageTarget,
        options: &SignatureOptions,
    ) -> Result<PdfRevision> {
        if target.is_all() && !options.changes_allowed {
            return Err(Error::UnsupportedConfiguration(
                "signing all pages requires changesAllowed=true".to_string(),
            ));
        }
        let changes_allowed = target.is_all() || options.changes_allowed;
        let pages = target.pages();

        let mut current = revision;
        for (pass, &page) in pages.iter().enumerate() {
            current = self.sign_page(current, page, options, changes_allowed)?;
            log::info!("Signed page {} ({} of {})", page, pass + 1, pages.len());
        }
        Ok(current)
    }

    /// One signing pass over `page` (1-based).
    ///
    /// With `changes_allowed == false` the signature certifies the document
    /// with DocMDP P=1.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPage`] when the page does not exist
    /// - [`Error::UnsupportedConfiguration`] when the document is already
    ///   certified with no changes allowed, or when certifying a document
    ///   that already carries signatures
    /// - [`Error::TimestampAuthority`] when timestamping fails
    /// - [`Error::SignatureConstruction`] when the container does not fit the
    ///   placeholder or cannot be built
    pub fn sign_page(
        &self,
        revision: PdfRevision,
        page: u32,
        options: &SignatureOptions,
        changes_allowed: bool,
    ) -> Result<PdfRevision> {
        let level = CertificationLevel::from_changes_allowed(changes_allowed);
        let plan = plan_update(revision.as_bytes(), page, level)?;
        let signing_time = self.ctx.now();
        let calculator = ByteRangeCalculator::new(self.reserved_size());

        let mut writer = IncrementalWriter::new(revision.into_bytes(), &plan.xref, plan.next_object_number);
        let sig_ref = writer.allocate();
        let widget_ref = writer.allocate();

        let (body, byte_range_at, contents_at) =
            self.signature_dictionary(&calculator, options, level, &signing_time);
        let body_offset = writer.write_raw_object(sig_ref, &body);
        let byte_range_offset = body_offset + byte_range_at;
        let contents_offset = body_offset + contents_at;

        let rect = options.rect;
        let appearance = if rect.is_empty() {
            None
        } else {
            let appearance = SignatureAppearance {
                signer_name: self.signer_name.clone(),
                signing_time,
                reason: options.reason.clone(),
                location: options.location.clone(),
                custom_text: options.custom_text.clone(),
                layered: !options.green_tick,
            };
            Some(appearance.write(&mut writer, &rect))
        };

        let mut widget = ObjectSerializer::dict(vec![
            ("Type", Object::name("Annot")),
            ("Subtype", Object::name("Widget")),
            ("FT", Object::name("Sig")),
            ("F", Object::Integer(WIDGET_FLAGS)),
            ("T", Object::text(&plan.field_name)),
            ("V", Object::Reference(sig_ref)),
            ("P", Object::Reference(plan.page_ref)),
        ]);
        if let Object::Dictionary(dict) = &mut widget {
            match appearance {
                Some(normal) => {
                    dict.insert("Rect".to_string(), rect.to_pdf_array());
                    dict.insert(
                        "AP".to_string(),
                        ObjectSerializer::dict(vec![("N", Object::Reference(normal))]),
                    );
                },
                None => {
                    dict.insert("Rect".to_string(), Rect::default().to_pdf_array());
                },
            }
        }
        writer.write_object(widget_ref, &widget);

        let mut page_dict = plan.page;
        match plan.annots {
            AnnotsSlot::Direct(mut annots) => {
                annots.push(Object::Reference(widget_ref));
                page_dict.insert("Annots".to_string(), Object::Array(annots));
                writer.write_object(plan.page_ref, &Object::Dictionary(page_dict));
            },
            AnnotsSlot::Indirect(array_ref, mut annots) => {
                annots.push(Object::Reference(widget_ref));
                writer.write_object(array_ref, &Object::Array(annots));
            },
        }

        let mut fields = plan.fields;
        fields.push(Object::Reference(widget_ref));
        let mut acroform = plan.acroform;
        acroform.insert("Fields".to_string(), Object::Array(fields));
        acroform.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
        let acroform_ref = plan.acroform_ref.unwrap_or_else(|| writer.allocate());
        writer.write_object(acroform_ref, &Object::Dictionary(acroform));

        let mut catalog = plan.catalog;
        catalog.insert("AcroForm".to_string(), Object::Reference(acroform_ref));
        if level.docmdp_permission().is_some() {
            let mut perms = plan.perms;
            perms.insert("DocMDP".to_string(), Object::Reference(sig_ref));
            catalog.insert("Perms".to_string(), Object::Dictionary(perms));
        }
        let mut extensions = plan.extensions;
        extensions.insert(
            "ESIC".to_string(),
            ObjectSerializer::dict(vec![
                ("BaseVersion", Object::name("1.7")),
                ("ExtensionLevel", Object::Integer(2)),
            ]),
        );
        catalog.insert("Extensions".to_string(), Object::Dictionary(extensions));
        writer.write_object(plan.catalog_ref, &Object::Dictionary(catalog));

        let mut data = writer.finish()?;
        let byte_range = calculator.calculate_byte_range(data.len(), contents_offset);
        ByteRangeCalculator::patch_byte_range(&mut data, byte_range_offset, &byte_range)?;
        log::debug!(
            "Field '{}' on page {}: ByteRange {:?}, {} bytes reserved",
            plan.field_name,
            page,
            byte_range,
            calculator.capacity()
        );

        let digest = {
            let parts = ByteRangeCalculator::signed_parts(&data, &byte_range)?;
            DigestAlgorithm::Sha256.digest_parts(&parts)
        };
        let container = CadesBuilder::new(&self.key, &self.chain)?.build(&digest, self.timestamp.as_deref())?;
        calculator.insert_signature(&mut data, contents_offset, &container)?;

        log::info!(
            "Signed field '{}' on page {} ({}, {} byte container)",
            plan.field_name,
            page,
            match level {
                CertificationLevel::Approval => "approval",
                CertificationLevel::NoChangesAllowed => "certifying",
            },
            container.len()
        );
        Ok(PdfRevision::new(data))
    }

    /// Serialized signature dictionary with the offsets (relative to its
    /// first byte) of the `/ByteRange` array and the `/Contents` string.
    fn signature_dictionary(
        &self,
        calculator: &ByteRangeCalculator,
        options: &SignatureOptions,
        level: CertificationLevel,
        signing_time: &DateTime<FixedOffset>,
    ) -> (Vec<u8>, usize, usize) {
        let serializer = ObjectSerializer::compact();
        let mut entries = vec![
            ("Type", Object::name("Sig")),
            ("Filter", Object::name("Adobe.PPKLite")),
            ("SubFilter", Object::name(SignatureSubFilter::CadesDetached.as_pdf_name())),
            ("M", Object::String(pdf_date(signing_time).into_bytes())),
            ("Name", Object::text(&self.signer_name)),
        ];
        if !options.reason.is_empty() {
            entries.push(("Reason", Object::text(&options.reason)));
        }
        if !options.location.is_empty() {
            entries.push(("Location", Object::text(&options.location)));
        }
        if let Some(permission) = level.docmdp_permission() {
            let reference = ObjectSerializer::dict(vec![
                ("Type", Object::name("SigRef")),
                ("TransformMethod", Object::name("DocMDP")),
                (
                    "TransformParams",
                    ObjectSerializer::dict(vec![
                        ("Type", Object::name("TransformParams")),
                        ("P", Object::Integer(permission)),
                        ("V", Object::name("1.2")),
                    ]),
                ),
            ]);
            entries.push(("Reference", Object::Array(vec![reference])));
        }

        let mut body = serializer.serialize(&ObjectSerializer::dict(entries));
        // reopen the dictionary to append the fixed-width placeholders
        body.truncate(body.len() - 2);
        body.extend_from_slice(b"/ByteRange ");
        let byte_range_at = body.len();
        body.extend_from_slice(ByteRangeCalculator::byte_range_placeholder().as_bytes());
        body.extend_from_slice(b"/Contents ");
        let contents_at = body.len();
        body.extend_from_slice(calculator.contents_placeholder().as_bytes());
        body.extend_from_slice(b">>");
        debug_assert_eq!(&body[byte_range_at..byte_range_at + 2], b"[0");
        debug_assert!(byte_range_at + BYTE_RANGE_WIDTH < contents_at);
        (body, byte_range_at, contents_at)
    }
}

/// Read what the update needs from the previous revision and enforce the
/// certification rules.
fn plan_update(data: &[u8], page: u32, level: CertificationLevel) -> Result<UpdatePlan> {
    let mut doc = PdfDocument::open(data, "")?;

    if doc.certification_permission()? == Some(1) {
        return Err(Error::UnsupportedConfiguration(
            "document is certified with no changes allowed and cannot be signed again".to_string(),
        ));
    }
    let signed = doc
        .signature_fields()?
        .iter()
        .filter(|f| f.signature.is_some())
        .count();
    if level == CertificationLevel::NoChangesAllowed && signed > 0 {
        return Err(Error::UnsupportedConfiguration(format!(
            "cannot certify a document that already carries {} signature(s)",
            signed
        )));
    }

    let page_ref = doc.page_ref(page)?;
    let page_dict = doc.resolve_dict(&Object::Reference(page_ref))?;
    let annots = match page_dict.get("Annots") {
        Some(Object::Reference(array_ref)) => match doc.resolve(&Object::Reference(*array_ref))? {
            Object::Array(items) => AnnotsSlot::Indirect(*array_ref, items),
            other => {
                log::warn!("Page {} /Annots resolves to {}, replacing it", page, other.type_name());
                AnnotsSlot::Direct(Vec::new())
            },
        },
        Some(Object::Array(items)) => AnnotsSlot::Direct(items.clone()),
        _ => AnnotsSlot::Direct(Vec::new()),
    };

    let catalog_ref = doc.catalog_ref()?;
    let catalog = doc.catalog()?;
    let perms = catalog_subdict(&mut doc, &catalog, "Perms")?;
    let extensions = catalog_subdict(&mut doc, &catalog, "Extensions")?;
    let (acroform_ref, acroform) = match doc.acroform()? {
        Some((form_ref, form)) => (form_ref, form),
        None => (None, Dict::new()),
    };
    let fields = match acroform.get("Fields") {
        Some(obj) => doc.resolve(obj)?.as_array().cloned().unwrap_or_default(),
        None => Vec::new(),
    };
    let field_name = unique_field_name(page, &doc.field_names()?);

    Ok(UpdatePlan {
        xref: doc.xref().clone(),
        next_object_number: doc.next_object_number(),
        page_ref,
        page: page_dict,
        annots,
        catalog_ref,
        catalog,
        perms,
        extensions,
        acroform_ref,
        acroform,
        fields,
        field_name,
    })
}

/// Current entries of a catalog dictionary such as `/Perms`, direct or indirect.
fn catalog_subdict(doc: &mut PdfDocument, catalog: &Dict, key: &str) -> Result<Dict> {
    match catalog.get(key) {
        None | Some(Object::Null) => Ok(Dict::new()),
        Some(obj) => match doc.resolve(obj)? {
            Object::Dictionary(dict) => Ok(dict),
            Object::Null => Ok(Dict::new()),
            other => {
                log::warn!("Catalog /{} is {}, replacing it", key, other.type_name());
                Ok(Dict::new())
            },
        },
    }
}

/// `Signature<page>`, or `Signature<page>_<k>` when already taken.
pub fn unique_field_name(page: u32, taken: &HashSet<String>) -> String {
    let base = format!("Signature{}", page);
    if !taken.contains(&base) {
        return base;
    }
    let mut k = 2;
    loop {
        let candidate = format!("{}_{}", base, k);
        if !taken.contains(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

/// PDF date string `D:YYYYMMDDHHmmSS+HH'mm'`.
pub fn pdf_date(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        time.format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedClock, SigningConfig};
    use crate::signatures::cms::{check_signer, parse_container};
    use crate::signatures::pages::PageSelector;
    use chrono::TimeZone;
    use rcgen::{CertificateParams, DnType, KeyPair};

    fn context() -> SigningContext {
        let now = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();
        SigningContext::new(SigningConfig::new()).with_clock(FixedClock(now))
    }

    fn engine(ctx: &SigningContext) -> SignatureEngine<'_> {
        let mut params = CertificateParams::new(vec![]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "Alice");
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        SignatureEngine::new(
            ctx,
            SigningKey::from_pkcs8_der(&key.serialize_der()).unwrap(),
            vec![cert.der().to_vec()],
            "Alice",
        )
    }

    fn pdf(pages: usize) -> PdfRevision {
        pdf_with(pages, "", &[])
    }

    /// `catalog_extra` goes into the catalog; `extra` objects are numbered
    /// after the pages.
    fn pdf_with(pages: usize, catalog_extra: &str, extra: &[&str]) -> PdfRevision {
        let mut objects = vec![
            format!("<< /Type /Catalog /Pages 2 0 R {}>>", catalog_extra),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..pages).map(|i| format!("{} 0 R", i + 3)).collect::<Vec<_>>().join(" "),
                pages
            ),
        ];
        for _ in 0..pages {
            objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
        }
        objects.extend(extra.iter().map(|body| body.to_string()));
        let mut out = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());
        for o in offsets {
            out.extend_from_slice(format!("{:010} 00000 n\r\n", o).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        PdfRevision::new(out)
    }

    #[test]
    fn test_pdf_date() {
        let time = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap();
        assert_eq!(pdf_date(&time), "D:20240102030405-04'00'");
    }

    #[test]
    fn test_unique_field_name() {
        let mut taken = HashSet::new();
        assert_eq!(unique_field_name(1, &taken), "Signature1");
        taken.insert("Signature1".to_string());
        taken.insert("Signature1_2".to_string());
        assert_eq!(unique_field_name(1, &taken), "Signature1_3");
    }

    #[test]
    fn test_sign_single_page() {
        let ctx = context();
        let engine = engine(&ctx);
        let original = pdf(2);
        let options = SignatureOptions::default().with_rect(50.0, 50.0, 250.0, 110.0).with_reason("Approved");
        let signed = engine.sign_page(original.clone(), 2, &options, true).unwrap();

        let data = signed.as_bytes();
        assert!(data.starts_with(original.as_bytes()));
        let mut doc = PdfDocument::open(data, "").unwrap();
        assert_eq!(doc.page_count().unwrap(), 2);
        let fields = doc.signature_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Signature2");
        assert_eq!(fields[0].page, Some(2));
        assert_eq!(doc.certification_permission().unwrap(), None);

        let sig = doc.resolve_dict(&Object::Reference(fields[0].signature.unwrap())).unwrap();
        assert_eq!(sig.get("Reason").and_then(Object::as_text).as_deref(), Some("Approved"));
        assert_eq!(sig.get("M").and_then(Object::as_text).as_deref(), Some("D:20240601120000+01'00'"));
        let range: Vec<i64> = sig
            .get("ByteRange")
            .and_then(Object::as_array)
            .unwrap()
            .iter()
            .filter_map(Object::as_integer)
            .collect();
        ByteRangeCalculator::validate_byte_range(&range, data).unwrap();
        assert_eq!((range[2] + range[3]) as usize, data.len());

        let contents = sig.get("Contents").and_then(Object::as_string).unwrap();
        let signed_data = parse_container(contents).unwrap();
        let parts = ByteRangeCalculator::signed_parts(data, &range).unwrap();
        let check = check_signer(&signed_data, &parts).unwrap();
        assert!(check.digest_matches);
        assert!(check.signature_valid);
    }

    #[test]
    fn test_invisible_signature_has_no_appearance() {
        let ctx = context();
        let engine = engine(&ctx);
        let signed = engine
            .sign_page(pdf(1), 1, &SignatureOptions::default(), true)
            .unwrap();
        let mut doc = PdfDocument::open(signed.as_bytes(), "").unwrap();
        let field = &doc.signature_fields().unwrap()[0];
        let widget = doc.resolve_dict(&Object::Reference(field.widget.unwrap())).unwrap();
        assert!(!widget.contains_key("AP"));
        assert_eq!(field.rect.map(|r| r.is_empty()), Some(true));
    }

    #[test]
    fn test_certified_document_refuses_more_signatures() {
        let ctx = context();
        let engine = engine(&ctx);
        let certified = engine
            .sign_page(pdf(1), 1, &SignatureOptions::default(), false)
            .unwrap();
        let mut doc = PdfDocument::open(certified.as_bytes(), "").unwrap();
        assert_eq!(doc.certification_permission().unwrap(), Some(1));

        let again = engine.sign_page(certified, 1, &SignatureOptions::default(), true);
        assert!(matches!(again, Err(Error::UnsupportedConfiguration(_))));
    }

    #[test]
    fn test_cannot_certify_signed_document() {
        let ctx = context();
        let engine = engine(&ctx);
        let signed = engine
            .sign_page(pdf(1), 1, &SignatureOptions::default(), true)
            .unwrap();
        let certify = engine.sign_page(signed, 1, &SignatureOptions::default(), false);
        assert!(matches!(certify, Err(Error::UnsupportedConfiguration(_))));
    }

    #[test]
    fn test_sign_all_pages() {
        let ctx = context();
        let engine = engine(&ctx);
        let target = PageSelector::All.resolve(3).unwrap();
        let options = SignatureOptions::default().with_page(PageSelector::All);
        let signed = engine.sign_pages(pdf(3), &target, &options).unwrap();

        let mut doc = PdfDocument::open(signed.as_bytes(), "").unwrap();
        let fields = doc.signature_fields().unwrap();
        let pages: Vec<Option<u32>> = fields.iter().map(|f| f.page).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(doc.certification_permission().unwrap(), None);
    }

    #[test]
    fn test_all_pages_without_changes_refused() {
        let ctx = context();
        let engine = engine(&ctx);
        let target = PageSelector::All.resolve(2).unwrap();
        let options = SignatureOptions::default().with_changes_allowed(false);
        assert!(matches!(
            engine.sign_pages(pdf(2), &target, &options),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_indirect_catalog_entries_are_merged() {
        let ctx = context();
        let engine = engine(&ctx);
        let original = pdf_with(
            1,
            "/Extensions 4 0 R /Perms 5 0 R ",
            &[
                "<< /ADBE << /BaseVersion /1.7 /ExtensionLevel 3 >> >>",
                "<< /UR3 << /Type /Sig >> >>",
            ],
        );
        let options = SignatureOptions::default().with_rect(10.0, 10.0, 200.0, 60.0);
        let certified = engine.sign_page(original, 1, &options, false).unwrap();

        let mut doc = PdfDocument::open(certified.as_bytes(), "").unwrap();
        let catalog = doc.catalog().unwrap();
        let extensions = doc.resolve_dict(catalog.get("Extensions").unwrap()).unwrap();
        assert!(extensions.contains_key("ADBE"));
        assert!(extensions.contains_key("ESIC"));
        let perms = doc.resolve_dict(catalog.get("Perms").unwrap()).unwrap();
        assert!(perms.contains_key("UR3"));
        assert!(perms.contains_key("DocMDP"));
        assert_eq!(doc.certification_permission().unwrap(), Some(1));
    }

    #[test]
    fn test_certify_refusal_counts_signed_fields_only() {
        let ctx = context();
        let engine = engine(&ctx);
        let original = pdf_with(
            1,
            "/AcroForm 4 0 R ",
            &["<< /Fields [5 0 R] >>", "<< /FT /Sig /T (Empty) >>"],
        );
        let signed = engine
            .sign_page(original, 1, &SignatureOptions::default(), true)
            .unwrap();
        match engine.sign_page(signed, 1, &SignatureOptions::default(), false) {
            Err(Error::UnsupportedConfiguration(msg)) => assert!(msg.contains("carries 1 signature")),
            other => panic!("unexpected: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_container_too_large_for_placeholder() {
        let ctx = SigningContext::new(SigningConfig::new().with_signature_size(16));
        let engine = engine(&ctx);
        assert!(matches!(
            engine.sign_page(pdf(1), 1, &SignatureOptions::default(), true),
            Err(Error::SignatureConstruction(_))
        ));
    }
}
