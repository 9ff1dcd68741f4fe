//! CAdES detached signature containers.
//!
//! The container is a CMS `SignedData` with no encapsulated content. Its single
//! SignerInfo signs `contentType`, `messageDigest` and `signingCertificateV2`;
//! the signing time lives in the PDF signature dictionary, not in the container.

use crate::error::{Error, Result};
use crate::signatures::keys::{SigningKey, VerifyingKey};
use crate::signatures::timestamp::TimestampSource;
use crate::signatures::types::DigestAlgorithm;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Decode, Encode, Reader, Sequence, SliceReader};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

/// id-data
pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// id-signedData
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
/// id-contentType
pub const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
/// id-messageDigest
pub const ID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
/// id-aa-signingCertificateV2
pub const ID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");
/// id-aa-signatureTimeStampToken
pub const ID_SIGNATURE_TIMESTAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");

/// `ESSCertIDv2` with the default (SHA-256) hash algorithm and no issuerSerial.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EssCertIdV2 {
    pub cert_hash: OctetString,
}

/// `SigningCertificateV2` without policies.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SigningCertificateV2 {
    pub certs: Vec<EssCertIdV2>,
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    let mut values = SetOfVec::new();
    values.insert(value)?;
    Ok(Attribute { oid, values })
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: DigestAlgorithm::Sha256.oid(),
        parameters: None,
    }
}

/// Builds CAdES detached containers for one signer.
pub struct CadesBuilder<'a> {
    key: &'a SigningKey,
    signer: Certificate,
    signer_der: &'a [u8],
    chain: Vec<Certificate>,
}

impl<'a> CadesBuilder<'a> {
    /// `chain` is end-entity first; duplicates are embedded once.
    pub fn new(key: &'a SigningKey, chain: &'a [Vec<u8>]) -> Result<Self> {
        let signer_der = chain
            .first()
            .ok_or_else(|| Error::SignatureConstruction("empty certificate chain".to_string()))?;
        let mut seen: Vec<&[u8]> = Vec::new();
        let mut certificates = Vec::new();
        for der in chain {
            if seen.contains(&der.as_slice()) {
                continue;
            }
            seen.push(der);
            certificates.push(Certificate::from_der(der)?);
        }
        Ok(Self {
            key,
            signer: certificates[0].clone(),
            signer_der,
            chain: certificates,
        })
    }

    fn signed_attributes(&self, content_digest: &[u8]) -> Result<SignedAttributes> {
        let cert_hash = DigestAlgorithm::Sha256.digest(self.signer_der);
        let signing_certificate = SigningCertificateV2 {
            certs: vec![EssCertIdV2 {
                cert_hash: OctetString::new(cert_hash)?,
            }],
        };

        let mut attrs = SetOfVec::new();
        attrs.insert(attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?)?;
        attrs.insert(attribute(
            ID_MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(content_digest)?)?,
        )?)?;
        attrs.insert(attribute(ID_SIGNING_CERTIFICATE_V2, Any::encode_from(&signing_certificate)?)?)?;
        Ok(attrs)
    }

    /// DER `ContentInfo` signing `content_digest` (SHA-256 of the byte ranges).
    ///
    /// When `tsa` is given, the signature value is timestamped and the token is
    /// embedded as an unsigned attribute; its failures propagate unchanged.
    pub fn build(&self, content_digest: &[u8], tsa: Option<&dyn TimestampSource>) -> Result<Vec<u8>> {
        let signed_attrs = self.signed_attributes(content_digest)?;
        let attrs_digest = DigestAlgorithm::Sha256.digest(&signed_attrs.to_der()?);
        let signature = self.key.sign_digest(&attrs_digest)?;

        let unsigned_attrs = match tsa {
            Some(source) => {
                let token = source.timestamp(&signature)?;
                let mut attrs = SetOfVec::new();
                attrs.insert(attribute(ID_SIGNATURE_TIMESTAMP_TOKEN, Any::from_der(&token)?)?)?;
                Some(attrs)
            },
            None => None,
        };

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: self.signer.tbs_certificate.issuer.clone(),
                serial_number: self.signer.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: sha256_algorithm(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: self.key.signature_algorithm()?,
            signature: OctetString::new(signature)?,
            unsigned_attrs,
        };

        let mut digest_algorithms = SetOfVec::new();
        digest_algorithms.insert(sha256_algorithm())?;
        let mut certificates = SetOfVec::new();
        for cert in &self.chain {
            certificates.insert(CertificateChoices::Certificate(cert.clone()))?;
        }
        let mut signer_infos = SetOfVec::new();
        signer_infos.insert(signer_info)?;

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(certificates)),
            crls: None,
            signer_infos: SignerInfos(signer_infos),
        };
        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data)?,
        };
        let der = content_info.to_der()?;
        log::debug!(
            "Built CAdES container: {} bytes, {} certificate(s), timestamped={}",
            der.len(),
            self.chain.len(),
            tsa.is_some()
        );
        Ok(der)
    }
}

/// Decode the `SignedData` of a `/Contents` value, ignoring trailing padding.
pub fn parse_container(contents: &[u8]) -> Result<SignedData> {
    let mut reader = SliceReader::new(contents)?;
    let content_info = ContentInfo::decode(&mut reader)?;
    let consumed = usize::try_from(reader.position())?;
    if contents[consumed..].iter().any(|&b| b != 0) {
        log::warn!("Signature container is followed by non-zero bytes");
    }
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::SignatureConstruction(format!(
            "container content type is {}, expected signedData",
            content_info.content_type
        )));
    }
    Ok(content_info.content.decode_as::<SignedData>()?)
}

/// First value of an attribute in a set.
pub fn find_attribute(attrs: &SetOfVec<Attribute>, oid: ObjectIdentifier) -> Option<&Any> {
    attrs
        .iter()
        .find(|attr| attr.oid == oid)
        .and_then(|attr| attr.values.iter().next())
}

/// Facts established about one SignerInfo.
#[derive(Debug, Clone, Default)]
pub struct SignerCheck {
    /// `messageDigest` equals the supplied content digest
    pub digest_matches: bool,
    /// Signature over the signed attributes verifies
    pub signature_valid: bool,
    /// Signer certificate (DER), when found among the embedded certificates
    pub certificate: Option<Vec<u8>>,
    /// Timestamp token imprint matches the signature value
    pub timestamp_valid: Option<bool>,
}

/// Check the first SignerInfo of `signed_data` against `content` parts.
pub fn check_signer(signed_data: &SignedData, content: &[&[u8]]) -> Result<SignerCheck> {
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::SignatureConstruction("container has no SignerInfo".to_string()))?;
    let algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        Error::SignatureConstruction(format!("unsupported digest {}", signer_info.digest_alg.oid))
    })?;
    let mut check = SignerCheck::default();

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| Error::SignatureConstruction("SignerInfo has no signed attributes".to_string()))?;
    if let Some(value) = find_attribute(signed_attrs, ID_MESSAGE_DIGEST) {
        let claimed = value.decode_as::<OctetString>()?;
        check.digest_matches = claimed.as_bytes() == algorithm.digest_parts(content).as_slice();
    }

    let certificate = signed_data.certificates.as_ref().and_then(|set| {
        set.0.iter().find_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => match &signer_info.sid {
                SignerIdentifier::IssuerAndSerialNumber(id)
                    if cert.tbs_certificate.issuer == id.issuer
                        && cert.tbs_certificate.serial_number == id.serial_number =>
                {
                    Some(cert)
                },
                _ => None,
            },
            _ => None,
        })
    });

    if let Some(cert) = certificate {
        let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
        let attrs_digest = algorithm.digest(&signed_attrs.to_der()?);
        check.signature_valid = VerifyingKey::from_spki_der(&spki)
            .map(|key| key.verify_digest(&attrs_digest, signer_info.signature.as_bytes()))
            .unwrap_or(false);
        check.certificate = Some(cert.to_der()?);
    }

    if let Some(token) = signer_info
        .unsigned_attrs
        .as_ref()
        .and_then(|attrs| find_attribute(attrs, ID_SIGNATURE_TIMESTAMP_TOKEN))
    {
        check.timestamp_valid = Some(timestamp_imprint_matches(token, signer_info.signature.as_bytes()));
    }
    Ok(check)
}

fn timestamp_imprint_matches(token: &Any, signature: &[u8]) -> bool {
    let imprint = || -> Result<Vec<u8>> {
        let token = token.decode_as::<ContentInfo>()?;
        let signed_data = token.content.decode_as::<SignedData>()?;
        let econtent = signed_data
            .encap_content_info
            .econtent
            .ok_or_else(|| Error::SignatureConstruction("token has no TSTInfo".to_string()))?;
        let tst_info = x509_tsp::TstInfo::from_der(econtent.value())?;
        Ok(tst_info.message_imprint.hashed_message.as_bytes().to_vec())
    };
    imprint()
        .map(|hash| hash == DigestAlgorithm::Sha256.digest(signature))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::timestamp::tests::token;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    struct Fixture {
        key: SigningKey,
        chain: Vec<Vec<u8>>,
    }

    fn fixture() -> Fixture {
        let mut ca_params = CertificateParams::new(vec![]).unwrap();
        ca_params.distinguished_name.push(DnType::CommonName, "Test CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_key = KeyPair::generate().unwrap();
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let mut params = CertificateParams::new(vec![]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "Alice");
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &ca, &ca_key).unwrap();

        Fixture {
            key: SigningKey::from_pkcs8_der(&key.serialize_der()).unwrap(),
            chain: vec![cert.der().to_vec(), ca.der().to_vec(), ca.der().to_vec()],
        }
    }

    /// Stamps whatever it is given.
    struct LocalAuthority;

    impl TimestampSource for LocalAuthority {
        fn timestamp(&self, message: &[u8]) -> Result<Vec<u8>> {
            Ok(token(&DigestAlgorithm::Sha256.digest(message), None))
        }

        fn token_size_estimate(&self) -> usize {
            512
        }
    }

    /// Stamps an unrelated message.
    struct MisdirectedAuthority;

    impl TimestampSource for MisdirectedAuthority {
        fn timestamp(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Ok(token(&DigestAlgorithm::Sha256.digest(b"another signature"), None))
        }

        fn token_size_estimate(&self) -> usize {
            512
        }
    }

    struct FailingToken;

    impl TimestampSource for FailingToken {
        fn timestamp(&self, _message: &[u8]) -> Result<Vec<u8>> {
            Err(Error::TimestampAuthority {
                url: "http://tsa.invalid".into(),
                reason: "down".into(),
            })
        }

        fn token_size_estimate(&self) -> usize {
            64
        }
    }

    #[test]
    fn test_container_structure() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let content: &[&[u8]] = &[b"first part", b"second part"];
        let digest = DigestAlgorithm::Sha256.digest_parts(content);
        let der = builder.build(&digest, None).unwrap();

        let signed_data = parse_container(&der).unwrap();
        assert_eq!(signed_data.version, CmsVersion::V1);
        assert_eq!(signed_data.encap_content_info.econtent_type, ID_DATA);
        assert!(signed_data.encap_content_info.econtent.is_none());
        // duplicate CA certificate embedded once
        assert_eq!(signed_data.certificates.as_ref().unwrap().0.len(), 2);

        let signer = signed_data.signer_infos.0.iter().next().unwrap();
        let attrs = signer.signed_attrs.as_ref().unwrap();
        assert_eq!(attrs.len(), 3);
        assert!(find_attribute(attrs, ID_SIGNING_CERTIFICATE_V2).is_some());
        assert!(signer.unsigned_attrs.is_none());

        let check = check_signer(&signed_data, content).unwrap();
        assert!(check.digest_matches);
        assert!(check.signature_valid);
        assert_eq!(check.certificate.as_deref(), Some(fx.chain[0].as_slice()));
        assert_eq!(check.timestamp_valid, None);
    }

    #[test]
    fn test_signing_certificate_hash() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let der = builder.build(&[0u8; 32], None).unwrap();
        let signed_data = parse_container(&der).unwrap();
        let signer = signed_data.signer_infos.0.iter().next().unwrap();
        let value = find_attribute(signer.signed_attrs.as_ref().unwrap(), ID_SIGNING_CERTIFICATE_V2).unwrap();
        let decoded = value.decode_as::<SigningCertificateV2>().unwrap();
        assert_eq!(
            decoded.certs[0].cert_hash.as_bytes(),
            DigestAlgorithm::Sha256.digest(&fx.chain[0]).as_slice()
        );
    }

    #[test]
    fn test_tampered_content_detected() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let der = builder.build(&DigestAlgorithm::Sha256.digest(b"original"), None).unwrap();
        let check = check_signer(&parse_container(&der).unwrap(), &[b"tampered"]).unwrap();
        assert!(!check.digest_matches);
        assert!(check.signature_valid);
    }

    #[test]
    fn test_padding_ignored() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let mut der = builder.build(&[1u8; 32], None).unwrap();
        der.resize(der.len() + 500, 0);
        assert!(parse_container(&der).is_ok());
    }

    #[test]
    fn test_timestamp_token_embedded_unsigned() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let content: &[&[u8]] = &[b"signed bytes"];
        let digest = DigestAlgorithm::Sha256.digest_parts(content);
        let der = builder.build(&digest, Some(&LocalAuthority)).unwrap();
        let signed_data = parse_container(&der).unwrap();
        let signer = signed_data.signer_infos.0.iter().next().unwrap();
        let unsigned = signer.unsigned_attrs.as_ref().unwrap();
        assert!(find_attribute(unsigned, ID_SIGNATURE_TIMESTAMP_TOKEN).is_some());
        // signed attributes are unaffected by the token
        assert_eq!(signer.signed_attrs.as_ref().unwrap().len(), 3);

        let check = check_signer(&signed_data, content).unwrap();
        assert!(check.signature_valid);
        assert_eq!(check.timestamp_valid, Some(true));
    }

    #[test]
    fn test_timestamp_over_other_signature_detected() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        let content: &[&[u8]] = &[b"signed bytes"];
        let digest = DigestAlgorithm::Sha256.digest_parts(content);
        let der = builder.build(&digest, Some(&MisdirectedAuthority)).unwrap();
        let check = check_signer(&parse_container(&der).unwrap(), content).unwrap();
        assert!(check.digest_matches);
        assert_eq!(check.timestamp_valid, Some(false));
    }

    #[test]
    fn test_timestamp_failure_propagates() {
        let fx = fixture();
        let builder = CadesBuilder::new(&fx.key, &fx.chain).unwrap();
        assert!(matches!(
            builder.build(&[1u8; 32], Some(&FailingToken)),
            Err(Error::TimestampAuthority { .. })
        ));
    }

    #[test]
    fn test_empty_chain_rejected() {
        let fx = fixture();
        assert!(CadesBuilder::new(&fx.key, &[]).is_err());
    }
}
