//! Shared fixtures: small PDFs and throw-away PKCS#12 bundles.

#![allow(dead_code)]

use chrono::{FixedOffset, TimeZone};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{EncapsulatedContentInfo, SignedData, SignerInfos};
use der::asn1::{GeneralizedTime, Int, ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Encode, Tag};
use p12_keystore::{KeyStore, KeyStoreEntry, PrivateKeyChain};
use pdf_seal::config::{FixedClock, SigningConfig, SigningContext};
use pdf_seal::signatures::TimestampSource;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use x509_tsp::{MessageImprint, TspVersion, TstInfo};

pub const PASSWORD: &str = "changeit";

/// Context frozen at 2024-06-01 12:00 +01:00.
pub fn context() -> SigningContext {
    let now = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap();
    SigningContext::new(SigningConfig::new()).with_clock(FixedClock(now))
}

fn page_objects(pages: usize) -> Vec<String> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages).map(|i| format!("{} 0 R", i + 3)).collect::<Vec<_>>().join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }
    objects
}

fn write_objects(out: &mut Vec<u8>, objects: &[String]) -> Vec<usize> {
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    offsets
}

/// An N-page document with a classic xref table.
pub fn classic_pdf(pages: usize) -> Vec<u8> {
    let objects = page_objects(pages);
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let offsets = write_objects(&mut out, &objects);

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n\r\n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// An N-page document whose cross-reference data is an (unfiltered) xref stream.
pub fn xref_stream_pdf(pages: usize) -> Vec<u8> {
    let objects = page_objects(pages);
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let offsets = write_objects(&mut out, &objects);

    let xref_id = objects.len() + 1;
    let xref_offset = out.len();
    let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    for offset in offsets.iter().chain(std::iter::once(&xref_offset)) {
        rows.push(1);
        rows.extend_from_slice(&(*offset as u32).to_be_bytes());
        rows.extend_from_slice(&[0, 0]);
    }
    out.extend_from_slice(
        format!(
            "{} 0 obj\n<< /Type /XRef /Size {} /Root 1 0 R /W [1 4 2] /Length {} >>\nstream\n",
            xref_id,
            xref_id + 1,
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// A certificate with its key pair.
pub struct Identity {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl Identity {
    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn key_der(&self) -> Vec<u8> {
        self.key.serialize_der()
    }
}

fn params(cn: &str, ca: bool, from: i32, to: i32) -> CertificateParams {
    let mut params = CertificateParams::new(vec![]).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params.distinguished_name.push(DnType::OrganizationName, "Seal Test");
    params.not_before = rcgen::date_time_ymd(from, 1, 1);
    params.not_after = rcgen::date_time_ymd(to, 1, 1);
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    params
}

/// Self-signed CA valid `from..to`.
pub fn root_ca(cn: &str) -> Identity {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, true, 2020, 2040).self_signed(&key).unwrap();
    Identity { cert, key }
}

/// End-entity certificate issued by `issuer`, valid `from..to` (years).
pub fn user(cn: &str, issuer: &Identity, from: i32, to: i32) -> Identity {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, false, from, to)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    Identity { cert, key }
}

/// One bundle entry: alias, key owner, and the rest of its chain.
pub struct Entry<'a> {
    pub alias: &'a str,
    pub owner: &'a Identity,
    pub chain: Vec<&'a Identity>,
}

/// Pack key entries into a PKCS#12 bundle protected by [`PASSWORD`].
pub fn bundle(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut store = KeyStore::new();
    for entry in entries {
        let chain = std::iter::once(entry.owner)
            .chain(entry.chain.iter().copied())
            .map(|id| p12_keystore::Certificate::from_der(&id.der()).unwrap())
            .collect::<Vec<_>>();
        let key_chain = PrivateKeyChain::new(entry.owner.key_der(), entry.alias.as_bytes(), chain);
        store.add_entry(entry.alias, KeyStoreEntry::PrivateKeyChain(key_chain));
    }
    store.writer(PASSWORD).write().unwrap()
}

/// Bundle holding a single valid user certificate issued by a fresh CA.
pub fn signer_bundle(cn: &str) -> Vec<u8> {
    let ca = root_ca("Seal Test Root");
    let signer = user(cn, &ca, 2022, 2030);
    bundle(&[Entry {
        alias: "signer",
        owner: &signer,
        chain: vec![&ca],
    }])
}

/// In-process timestamp authority issuing unsigned RFC 3161 tokens.
pub struct LocalAuthority;

impl LocalAuthority {
    fn token(message: &[u8]) -> der::Result<Vec<u8>> {
        let tst_info = TstInfo {
            version: TspVersion::V1,
            policy: ObjectIdentifier::new_unwrap("1.2.3.4.1"),
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
                    parameters: None,
                },
                hashed_message: OctetString::new(Sha256::digest(message).to_vec())?,
            },
            serial_number: Int::new(&[1])?,
            gen_time: GeneralizedTime::from_unix_duration(std::time::Duration::from_secs(1_717_239_600))?,
            accuracy: None,
            ordering: false,
            nonce: None,
            tsa: None,
            extensions: None,
        };
        let signed_data = SignedData {
            version: CmsVersion::V3,
            digest_algorithms: SetOfVec::new(),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4"),
                econtent: Some(Any::new(Tag::OctetString, tst_info.to_der()?)?),
            },
            certificates: None,
            crls: None,
            signer_infos: SignerInfos(SetOfVec::new()),
        };
        ContentInfo {
            content_type: ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2"),
            content: Any::encode_from(&signed_data)?,
        }
        .to_der()
    }
}

impl TimestampSource for LocalAuthority {
    fn timestamp(&self, message: &[u8]) -> pdf_seal::Result<Vec<u8>> {
        Ok(Self::token(message)?)
    }

    fn token_size_estimate(&self) -> usize {
        1024
    }
}
