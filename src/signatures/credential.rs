//! PKCS#12 credential loading and end-entity certificate selection.
//!
//! The bundle is decoded once per job. Entries are scanned in store order and
//! the first key entry whose certificate is not a CA is authoritative: if it is
//! outside its validity window the job fails, even when a later entry would
//! have been usable.

use crate::config::SigningContext;
use crate::error::{Error, Result};
use crate::signatures::keys::SigningKey;
use crate::signatures::types::CertificateSummary;
use chrono::{DateTime, FixedOffset};
use p12_keystore::{KeyStore, KeyStoreEntry};
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

/// One aliased bundle entry.
pub struct CredentialEntry {
    /// Alias (friendly name) of the entry
    pub alias: String,
    /// PKCS#8 private key; `None` for certificate-only entries
    pub private_key: Option<Zeroizing<Vec<u8>>>,
    /// Certificate chain, entry certificate first (DER)
    pub chain: Vec<Vec<u8>>,
}

impl CredentialEntry {
    /// Whether this is a key entry.
    pub fn is_key_entry(&self) -> bool {
        self.private_key.is_some()
    }
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("alias", &self.alias)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

/// The chosen end-entity certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCertificate {
    /// Alias of the bundle entry
    pub alias: String,
    /// DER-encoded certificate
    pub certificate: Vec<u8>,
    /// Printable certificate details
    pub summary: CertificateSummary,
}

/// A decoded credential bundle with its selected end-entity entry.
#[derive(Debug)]
pub struct CredentialStore {
    entries: Vec<CredentialEntry>,
    index: usize,
    selected: SelectedCertificate,
}

impl CredentialStore {
    /// Decode a PKCS#12 bundle and select its end-entity certificate.
    ///
    /// # Errors
    ///
    /// - [`Error::CredentialFormat`] for a wrong password or malformed bundle
    /// - [`Error::CertificateNotFound`] when no key entry holds a non-CA certificate
    /// - [`Error::CertificateExpired`] / [`Error::CertificateNotYetValid`] when the
    ///   first such certificate is outside its validity window
    pub fn open(ctx: &SigningContext, bundle: &[u8], password: &str) -> Result<Self> {
        let entries = decode_pkcs12(bundle, password)?;
        Self::from_entries(entries, ctx.now())
    }

    /// Select from already-decoded entries at time `now`.
    pub fn from_entries(entries: Vec<CredentialEntry>, now: DateTime<FixedOffset>) -> Result<Self> {
        let index = select_end_entity(&entries, now)?;
        let entry = &entries[index];
        let certificate = entry.chain[0].clone();
        let selected = SelectedCertificate {
            alias: entry.alias.clone(),
            summary: summarize_certificate(&certificate)?,
            certificate,
        };
        log::info!(
            "Selected certificate '{}' (serial {}) from alias '{}'",
            selected.summary.common_name,
            selected.summary.serial_number,
            selected.alias
        );
        Ok(Self {
            entries,
            index,
            selected,
        })
    }

    /// The selected end-entity certificate.
    pub fn selected(&self) -> &SelectedCertificate {
        &self.selected
    }

    /// Full chain of the selected entry, end-entity first.
    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.entries[self.index].chain
    }

    /// Parse the selected entry's private key.
    pub fn private_key(&self) -> Result<SigningKey> {
        let der = self.entries[self.index]
            .private_key
            .as_ref()
            .ok_or(Error::CertificateNotFound)?;
        SigningKey::from_pkcs8_der(der)
    }
}

/// Decode every entry of a PKCS#12 bundle.
pub fn decode_pkcs12(bundle: &[u8], password: &str) -> Result<Vec<CredentialEntry>> {
    let keystore = KeyStore::from_pkcs12(bundle, password)
        .map_err(|e| Error::CredentialFormat(e.to_string()))?;

    let mut entries = Vec::new();
    for (alias, entry) in keystore.entries() {
        if let KeyStoreEntry::PrivateKeyChain(key_chain) = entry {
            entries.push(CredentialEntry {
                alias: alias.clone(),
                private_key: Some(Zeroizing::new(key_chain.key().to_vec())),
                chain: key_chain.chain().iter().map(|c| c.as_der().to_vec()).collect(),
            });
        } else if let KeyStoreEntry::Certificate(cert) = entry {
            entries.push(CredentialEntry {
                alias: alias.clone(),
                private_key: None,
                chain: vec![cert.as_der().to_vec()],
            });
        }
    }
    log::debug!("Credential bundle holds {} entries", entries.len());
    Ok(entries)
}

fn parse_certificate<'a>(der: &'a [u8], alias: &str) -> Result<X509Certificate<'a>> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| {
            Error::CredentialFormat(format!("certificate of alias '{}' is not valid X.509: {}", alias, e))
        })
}

/// True when the certificate may issue others (`basicConstraints` cA=true).
fn is_ca(cert: &X509Certificate<'_>) -> bool {
    cert.basic_constraints()
        .ok()
        .flatten()
        .map(|ext| ext.value.ca)
        .unwrap_or(false)
}

/// Index of the authoritative end-entity key entry.
pub fn select_end_entity(entries: &[CredentialEntry], now: DateTime<FixedOffset>) -> Result<usize> {
    let now = now.timestamp();
    let mut chosen: Option<usize> = None;

    for (i, entry) in entries.iter().enumerate() {
        if !entry.is_key_entry() {
            continue;
        }
        let Some(der) = entry.chain.first() else {
            log::warn!("Key entry '{}' has no certificate; skipping", entry.alias);
            continue;
        };
        let cert = match parse_certificate(der, &entry.alias) {
            Ok(cert) => cert,
            Err(e) if chosen.is_some() => {
                log::warn!("Skipping unreadable key entry '{}': {}", entry.alias, e);
                continue;
            },
            Err(e) => return Err(e),
        };
        if is_ca(&cert) {
            continue;
        }

        if let Some(first) = chosen {
            log::warn!(
                "Ignoring additional end-entity key entry '{}'; '{}' was found first",
                entry.alias,
                entries[first].alias
            );
            continue;
        }

        let serial = serial_hex(&cert);
        let validity = cert.validity();
        if now > validity.not_after.timestamp() {
            return Err(Error::CertificateExpired {
                serial,
                alias: entry.alias.clone(),
            });
        }
        if now < validity.not_before.timestamp() {
            return Err(Error::CertificateNotYetValid {
                serial,
                alias: entry.alias.clone(),
            });
        }
        chosen = Some(i);
    }

    chosen.ok_or(Error::CertificateNotFound)
}

fn serial_hex(cert: &X509Certificate<'_>) -> String {
    cert.tbs_certificate.serial.to_str_radix(16).to_uppercase()
}

fn rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Printable details of a DER certificate.
pub fn summarize_certificate(der: &[u8]) -> Result<CertificateSummary> {
    let cert = parse_certificate(der, "")?;
    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string();
    Ok(CertificateSummary {
        common_name,
        subject: cert.subject().to_string(),
        serial_number: serial_hex(&cert),
        not_before: rfc3339(cert.validity().not_before.timestamp()),
        not_after: rfc3339(cert.validity().not_after.timestamp()),
        issuer: cert.issuer().to_string(),
    })
}
