//! Private keys and the signature algorithms they imply.
//!
//! All variants wipe their secret material on drop.

use crate::error::{Error, Result};
use der::asn1::ObjectIdentifier;
use der::{Any, Decode, Encode};
use pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use spki::{AlgorithmIdentifierOwned, DecodePublicKey, SubjectPublicKeyInfoRef};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// sha256WithRSAEncryption
pub const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
/// ecdsa-with-SHA256
pub const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// A private key able to sign a SHA-256 digest.
pub enum SigningKey {
    /// RSA, PKCS#1 v1.5 padding
    Rsa(RsaPrivateKey),
    /// ECDSA over NIST P-256
    EcdsaP256(p256::ecdsa::SigningKey),
    /// ECDSA over NIST P-384
    EcdsaP384(p384::ecdsa::SigningKey),
}

impl SigningKey {
    /// Parse an unencrypted PKCS#8 private key, detecting its type.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| Error::SignatureConstruction(format!("private key is not PKCS#8: {}", e)))?;
        let algorithm = info.algorithm.oid;

        let key = if algorithm == RSA_ENCRYPTION {
            RsaPrivateKey::from_pkcs8_der(der).map(SigningKey::Rsa).map_err(key_error)?
        } else if algorithm == EC_PUBLIC_KEY {
            let curve = info
                .algorithm
                .parameters_oid()
                .map_err(|_| Error::SignatureConstruction("EC key without named curve".into()))?;
            if curve == SECP256R1 {
                p256::ecdsa::SigningKey::from_pkcs8_der(der)
                    .map(SigningKey::EcdsaP256)
                    .map_err(key_error)?
            } else if curve == SECP384R1 {
                p384::ecdsa::SigningKey::from_pkcs8_der(der)
                    .map(SigningKey::EcdsaP384)
                    .map_err(key_error)?
            } else {
                return Err(Error::SignatureConstruction(format!(
                    "unsupported elliptic curve {}",
                    curve
                )));
            }
        } else {
            return Err(Error::SignatureConstruction(format!(
                "unsupported private key algorithm {}",
                algorithm
            )));
        };
        log::debug!("Loaded {} signing key", key.kind());
        Ok(key)
    }

    /// Short description of the key type.
    pub fn kind(&self) -> &'static str {
        match self {
            SigningKey::Rsa(_) => "RSA",
            SigningKey::EcdsaP256(_) => "ECDSA P-256",
            SigningKey::EcdsaP384(_) => "ECDSA P-384",
        }
    }

    /// `signatureAlgorithm` to record in the SignerInfo.
    pub fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        Ok(match self {
            SigningKey::Rsa(_) => AlgorithmIdentifierOwned {
                oid: SHA256_WITH_RSA,
                parameters: Some(Any::from_der(&der::asn1::Null.to_der()?)?),
            },
            SigningKey::EcdsaP256(_) | SigningKey::EcdsaP384(_) => AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
        })
    }

    /// Sign a SHA-256 digest. ECDSA signatures are DER-encoded.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningKey::Rsa(key) => key
                .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
                .map_err(|e| Error::SignatureConstruction(format!("RSA signing failed: {}", e))),
            SigningKey::EcdsaP256(key) => {
                let sig: p256::ecdsa::Signature = key.sign_prehash(digest).map_err(ecdsa_error)?;
                Ok(sig.to_der().as_bytes().to_vec())
            },
            SigningKey::EcdsaP384(key) => {
                let sig: p384::ecdsa::Signature = key.sign_prehash(digest).map_err(ecdsa_error)?;
                Ok(sig.to_der().as_bytes().to_vec())
            },
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey({}, [REDACTED])", self.kind())
    }
}

/// A public key able to check a SHA-256 digest signature.
pub enum VerifyingKey {
    /// RSA, PKCS#1 v1.5 padding
    Rsa(rsa::RsaPublicKey),
    /// ECDSA over NIST P-256
    EcdsaP256(p256::ecdsa::VerifyingKey),
    /// ECDSA over NIST P-384
    EcdsaP384(p384::ecdsa::VerifyingKey),
}

impl VerifyingKey {
    /// Parse a DER `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| Error::SignatureConstruction(format!("bad public key: {}", e)))?;
        let algorithm = spki.algorithm.oid;
        let unsupported = || Error::SignatureConstruction(format!("unsupported public key algorithm {}", algorithm));

        if algorithm == RSA_ENCRYPTION {
            return rsa::RsaPublicKey::from_public_key_der(der)
                .map(VerifyingKey::Rsa)
                .map_err(|e| Error::SignatureConstruction(format!("bad RSA public key: {}", e)));
        }
        if algorithm != EC_PUBLIC_KEY {
            return Err(unsupported());
        }
        let curve = spki.algorithm.parameters_oid().map_err(|_| unsupported())?;
        let ec_error = |e: spki::Error| Error::SignatureConstruction(format!("bad EC public key: {}", e));
        if curve == SECP256R1 {
            p256::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(VerifyingKey::EcdsaP256)
                .map_err(ec_error)
        } else if curve == SECP384R1 {
            p384::ecdsa::VerifyingKey::from_public_key_der(der)
                .map(VerifyingKey::EcdsaP384)
                .map_err(ec_error)
        } else {
            Err(unsupported())
        }
    }

    /// Whether `signature` is valid for the SHA-256 `digest`.
    pub fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> bool {
        match self {
            VerifyingKey::Rsa(key) => key.verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature).is_ok(),
            VerifyingKey::EcdsaP256(key) => p256::ecdsa::Signature::from_der(signature)
                .map(|sig| key.verify_prehash(digest, &sig).is_ok())
                .unwrap_or(false),
            VerifyingKey::EcdsaP384(key) => p384::ecdsa::Signature::from_der(signature)
                .map(|sig| key.verify_prehash(digest, &sig).is_ok())
                .unwrap_or(false),
        }
    }
}

fn key_error(e: pkcs8::Error) -> Error {
    Error::SignatureConstruction(format!("private key could not be decoded: {}", e))
}

fn ecdsa_error(e: signature::Error) -> Error {
    Error::SignatureConstruction(format!("ECDSA signing failed: {}", e))
}
