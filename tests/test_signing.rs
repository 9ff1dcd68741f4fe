//! Integration tests for signing jobs: credential selection, single-page,
//! certifying and all-pages signatures, timestamping and output files.

mod common;

use common::{
    bundle, classic_pdf, context, root_ca, signer_bundle, user, xref_stream_pdf, Entry, LocalAuthority, PASSWORD,
};
use pdf_seal::api::{inspect_credential, SignatureRequest, SigningJob};
use pdf_seal::config::{SigningConfig, SigningContext};
use pdf_seal::object::Object;
use pdf_seal::signatures::{
    CredentialStore, PageResolver, PageSelector, SignatureOptions, SignatureVerifier, TimestampConfig,
    TimestampSource, VerificationStatus,
};
use pdf_seal::writer::{IncrementalWriter, ObjectSerializer};
use pdf_seal::{Error, PdfDocument, Result};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

fn job(pdf: Vec<u8>, options: SignatureOptions) -> SigningJob {
    SigningJob::new(SignatureRequest::new(pdf, signer_bundle("Alice Example"), PASSWORD).with_options(options))
}

mod credential_tests {
    use super::*;

    #[test]
    fn test_user_certificate_selected_over_ca() {
        let ca = root_ca("Root");
        let alice = user("Alice", &ca, 2022, 2030);
        let data = bundle(&[Entry {
            alias: "alice",
            owner: &alice,
            chain: vec![&ca],
        }]);

        let store = CredentialStore::open(&context(), &data, PASSWORD).unwrap();
        assert_eq!(store.selected().alias, "alice");
        assert_eq!(store.selected().summary.common_name, "Alice");
        assert_eq!(store.certificate_chain().len(), 2);
    }

    #[test]
    fn test_only_ca_entries() {
        let ca = root_ca("Root");
        let data = bundle(&[Entry {
            alias: "root",
            owner: &ca,
            chain: vec![],
        }]);
        assert!(matches!(
            CredentialStore::open(&context(), &data, PASSWORD),
            Err(Error::CertificateNotFound)
        ));
    }

    #[test]
    fn test_expired_certificate() {
        let ca = root_ca("Root");
        let old = user("Old", &ca, 2020, 2023);
        let data = bundle(&[Entry {
            alias: "old",
            owner: &old,
            chain: vec![&ca],
        }]);
        match CredentialStore::open(&context(), &data, PASSWORD) {
            Err(Error::CertificateExpired { alias, .. }) => assert_eq!(alias, "old"),
            other => panic!("expected expiry, got {:?}", other.map(|s| s.selected().alias.clone())),
        }
    }

    #[test]
    fn test_not_yet_valid_certificate() {
        let ca = root_ca("Root");
        let future = user("Future", &ca, 2025, 2030);
        let data = bundle(&[Entry {
            alias: "future",
            owner: &future,
            chain: vec![&ca],
        }]);
        assert!(matches!(
            CredentialStore::open(&context(), &data, PASSWORD),
            Err(Error::CertificateNotYetValid { .. })
        ));
    }

    #[test]
    fn test_wrong_password() {
        let err = CredentialStore::open(&context(), &signer_bundle("Alice"), "wrong").unwrap_err();
        assert_eq!(err.category(), "CredentialFormatError");
    }

    #[test]
    fn test_inspect() {
        let summary = inspect_credential(&context(), &signer_bundle("Carol"), PASSWORD).unwrap();
        assert_eq!(summary.common_name, "Carol");
        assert!(summary.subject.contains("Carol"));
        assert!(summary.issuer.contains("Seal Test Root"));
        assert!(!summary.serial_number.is_empty());
    }
}

mod single_page_tests {
    use super::*;

    #[test]
    fn test_sign_last_page_and_verify() {
        let original = classic_pdf(3);
        let signed = job(original.clone(), SignatureOptions::default().with_changes_allowed(true))
            .sign(&context())
            .unwrap();
        let data = signed.as_bytes();
        assert!(data.starts_with(&original));

        let results = SignatureVerifier::new().verify_document(data).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        assert_eq!(result.signature_info.page, Some(3));
        assert!(result.signature_info.covers_whole_document);
        assert!(result.byte_range_valid);
        assert_eq!(result.signature_info.certification, None);
        assert_eq!(
            result.signature_info.certificate.as_ref().map(|c| c.common_name.as_str()),
            Some("Alice Example")
        );
        assert_eq!(result.signature_info.signer_name.as_deref(), Some("Alice Example"));
    }

    #[test]
    fn test_visible_signature_on_xref_stream_document() {
        let options = SignatureOptions::default()
            .with_page(PageSelector::First)
            .with_rect(36.0, 36.0, 236.0, 96.0)
            .with_reason("Approved")
            .with_location("Lalitpur")
            .with_changes_allowed(true);
        let signed = job(xref_stream_pdf(2), options).sign(&context()).unwrap();

        let mut doc = PdfDocument::open(signed.as_bytes(), "").unwrap();
        assert_eq!(doc.page_count().unwrap(), 2);
        let fields = doc.signature_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].page, Some(1));
        let widget = doc.resolve_dict(&Object::Reference(fields[0].widget.unwrap())).unwrap();
        assert!(widget.contains_key("AP"));

        let result = &SignatureVerifier::new().verify_document(signed.as_bytes()).unwrap()[0];
        assert!(result.status.is_valid());
        assert_eq!(result.signature_info.reason.as_deref(), Some("Approved"));
        assert_eq!(result.signature_info.location.as_deref(), Some("Lalitpur"));
    }

    #[test]
    fn test_page_out_of_range() {
        let err = job(classic_pdf(2), SignatureOptions::default().with_page(PageSelector::Page(5)))
            .sign(&context())
            .unwrap_err();
        match err {
            Error::InvalidPage { total_pages, .. } => assert_eq!(total_pages, 2),
            other => panic!("expected InvalidPage, got {:?}", other),
        }
    }

    #[test]
    fn test_tampering_breaks_the_signature() {
        let signed = job(classic_pdf(1), SignatureOptions::default())
            .sign(&context())
            .unwrap();
        let mut data = signed.into_bytes();
        // Flip a byte inside the original page dictionary
        let at = data.windows(9).position(|w| w == b"MediaBox ").unwrap();
        data[at] = b'N';

        let result = &SignatureVerifier::new().verify_document(&data).unwrap()[0];
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert!(!result.digest_matches);
    }
}

mod certification_tests {
    use super::*;

    #[test]
    fn test_certifying_signature() {
        let signed = job(classic_pdf(1), SignatureOptions::default().with_changes_allowed(false))
            .sign(&context())
            .unwrap();
        let mut doc = PdfDocument::open(signed.as_bytes(), "").unwrap();
        assert_eq!(doc.certification_permission().unwrap(), Some(1));

        let result = &SignatureVerifier::new().verify_document(signed.as_bytes()).unwrap()[0];
        assert_eq!(result.status, VerificationStatus::Valid);
        assert_eq!(result.signature_info.certification, Some(1));
        assert!(!result.docmdp_violation);
    }

    #[test]
    fn test_update_after_certification_is_a_violation() {
        let signed = job(classic_pdf(1), SignatureOptions::default().with_changes_allowed(false))
            .sign(&context())
            .unwrap()
            .into_bytes();

        let doc = PdfDocument::open(&signed, "").unwrap();
        let mut writer = IncrementalWriter::new(signed.clone(), doc.xref(), doc.next_object_number());
        let info = writer.allocate();
        writer.write_object(info, &ObjectSerializer::dict(vec![("Title", Object::text("Changed"))]));
        let modified = writer.finish().unwrap();

        let result = &SignatureVerifier::new().verify_document(&modified).unwrap()[0];
        assert!(result.docmdp_violation);
        assert!(result.document_modified);
        assert_eq!(result.status, VerificationStatus::Invalid);
        // The signed revision itself is intact
        assert!(result.digest_matches);
        assert!(result.signature_valid);
    }

    #[test]
    fn test_further_signing_refused() {
        let ctx = context();
        let certified = job(classic_pdf(1), SignatureOptions::default().with_changes_allowed(false))
            .sign(&ctx)
            .unwrap()
            .into_bytes();
        let again = job(certified, SignatureOptions::default().with_changes_allowed(true)).sign(&ctx);
        assert!(matches!(again, Err(Error::UnsupportedConfiguration(_))));
    }
}

mod all_pages_tests {
    use super::*;

    #[test]
    fn test_one_signature_per_page() {
        let options = SignatureOptions::default()
            .with_page(PageSelector::All)
            .with_rect(400.0, 20.0, 580.0, 70.0)
            .with_changes_allowed(true);
        let signed = job(classic_pdf(3), options).sign(&context()).unwrap();

        let results = SignatureVerifier::new().verify_document(signed.as_bytes()).unwrap();
        assert_eq!(results.len(), 3);
        let pages: Vec<_> = results.iter().map(|r| r.signature_info.page).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
        for (i, result) in results.iter().enumerate() {
            assert!(result.digest_matches && result.signature_valid, "signature {}", i + 1);
            assert!(result.status.is_valid());
            assert_eq!(result.signature_info.certification, None);
            assert_eq!(result.signature_info.covers_whole_document, i == 2);
        }

        let names: std::collections::HashSet<_> =
            results.iter().map(|r| r.signature_info.field_name.clone()).collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_all_pages_forces_approval_signatures() {
        // changesAllowed defaults to true, and every pass is an approval signature
        let options = SignatureOptions::default().with_page(PageSelector::All);
        let signed = job(xref_stream_pdf(2), options).sign(&context()).unwrap();
        let mut doc = PdfDocument::open(signed.as_bytes(), "").unwrap();
        assert_eq!(doc.certification_permission().unwrap(), None);
        assert_eq!(doc.signature_fields().unwrap().len(), 2);
    }

    #[test]
    fn test_no_changes_refused_before_reading_anything() {
        // Neither the document nor the bundle is valid; validation must fail first
        for document in [Vec::new(), b"not a pdf".to_vec(), b"%PDF-garbage".to_vec()] {
            let request = SignatureRequest::new(document, vec![1, 2, 3], "pw").with_options(
                SignatureOptions::default()
                    .with_page(PageSelector::All)
                    .with_changes_allowed(false)
                    .with_reason("x".repeat(40)),
            );
            let dir = tempdir().unwrap();
            let err = SigningJob::new(request).run(&context(), dir.path()).unwrap_err();
            assert_eq!(err.category(), "UnsupportedConfigurationError");
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }
}

mod timestamp_tests {
    use super::*;

    struct Unreachable;

    impl TimestampSource for Unreachable {
        fn timestamp(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Err(Error::TimestampAuthority {
                url: "http://tsa.invalid/".to_string(),
                reason: "connection refused".to_string(),
            })
        }

        fn token_size_estimate(&self) -> usize {
            4096
        }
    }

    #[test]
    fn test_unreachable_authority_writes_nothing() {
        let ctx = SigningContext::new(SigningConfig::new().with_tsa_timeout(Duration::from_secs(2)));
        let options = SignatureOptions::default().with_timestamp(TimestampConfig::new("http://127.0.0.1:9/tsr"));

        let dir = tempdir().unwrap();
        let err = job(classic_pdf(1), options).run(&ctx, dir.path()).unwrap_err();
        match err {
            Error::TimestampAuthority { url, .. } => assert_eq!(url, "http://127.0.0.1:9/tsr"),
            other => panic!("expected TimestampAuthority, got {:?}", other),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_injected_source_failure_aborts_job() {
        let options = SignatureOptions::default()
            .with_page(PageSelector::All)
            .with_timestamp(TimestampConfig::new("http://tsa.invalid/"));
        let dir = tempdir().unwrap();
        let err = job(classic_pdf(2), options)
            .with_timestamp_source(Box::new(Unreachable))
            .run(&context(), dir.path())
            .unwrap_err();
        assert_eq!(err.category(), "TimestampAuthorityError");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_timestamped_signatures_verify() {
        let options = SignatureOptions::default()
            .with_page(PageSelector::All)
            .with_rect(20.0, 20.0, 220.0, 80.0)
            .with_timestamp(TimestampConfig::new("http://tsa.invalid/"));
        let signed = job(classic_pdf(2), options)
            .with_timestamp_source(Box::new(LocalAuthority))
            .sign(&context())
            .unwrap();

        let results = SignatureVerifier::new().verify_document(signed.as_bytes()).unwrap();
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.timestamp_valid, Some(true));
            assert_eq!(result.status, VerificationStatus::Valid, "{:?}", result.messages);
        }
    }

    #[test]
    fn test_disabled_timestamp_never_calls_source() {
        let options = SignatureOptions::default();
        let signed = job(classic_pdf(1), options)
            .with_timestamp_source(Box::new(Unreachable))
            .sign(&context())
            .unwrap();
        let result = &SignatureVerifier::new().verify_document(signed.as_bytes()).unwrap()[0];
        assert_eq!(result.timestamp_valid, None);
    }
}

mod output_tests {
    use super::*;

    #[test]
    fn test_run_writes_named_file() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("signed");
        let output = job(classic_pdf(1), SignatureOptions::default())
            .run(&context(), &out_dir)
            .unwrap();

        assert_eq!(output.file_name, "01-06-2024T12-00-00.pdf");
        assert!(output.file_path.is_absolute());
        let written = fs::read(&output.file_path).unwrap();
        assert_eq!(SignatureVerifier::new().verify_document(&written).unwrap().len(), 1);
    }

    #[test]
    fn test_round_trip_recovers_pages_and_signatures() {
        let dir = tempdir().unwrap();
        let options = SignatureOptions::default().with_page(PageSelector::All);
        let output = job(classic_pdf(4), options).run(&context(), dir.path()).unwrap();
        let written = fs::read(&output.file_path).unwrap();

        let mut doc = PdfDocument::open(&written, "").unwrap();
        let total = doc.page_count().unwrap();
        assert_eq!(total, 4);
        assert_eq!(PageResolver::resolve("A", total).unwrap().pages(), &[1, 2, 3, 4]);
        let results = SignatureVerifier::new().verify_document(&written).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.status.is_valid()));
    }
}
