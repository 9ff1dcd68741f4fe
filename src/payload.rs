//! JSON job descriptors and responses of the command-line tool.
//!
//! A signing payload looks like:
//!
//! ```json
//! {
//!   "certInfo": { "pfxPath": "signer.p12", "password": "secret" },
//!   "options": {
//!     "page": "L",
//!     "coord": [50, 50, 250, 110],
//!     "reason": "Approved",
//!     "location": "Kathmandu",
//!     "customText": "",
//!     "greenTick": false,
//!     "changesAllowed": true,
//!     "enableLtv": false,
//!     "timestamp": { "enabled": false, "url": "" }
//!   },
//!   "pdf": { "base64Content": "JVBERi0xLjcK...", "password": "" }
//! }
//! ```

use crate::api::SignatureRequest;
use crate::error::{Error, Result};
use crate::signatures::{PageSelector, SignatureOptions, TimestampConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Location of and password for a PKCS#12 bundle.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertInfo {
    pub pfx_path: PathBuf,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for CertInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertInfo")
            .field("pfx_path", &self.pfx_path)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl CertInfo {
    /// Read the bundle; relative paths are taken from `base_dir`.
    pub fn read_bundle(&self, base_dir: &Path) -> Result<Vec<u8>> {
        let path = if self.pfx_path.is_absolute() {
            self.pfx_path.clone()
        } else {
            base_dir.join(&self.pfx_path)
        };
        fs::read(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("PFX file {} could not be read: {}", path.display(), e),
            ))
        })
    }
}

/// Timestamp settings as sent in a payload.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampPayload {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for TimestampPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampPayload")
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl From<TimestampPayload> for TimestampConfig {
    fn from(payload: TimestampPayload) -> Self {
        TimestampConfig {
            enabled: payload.enabled,
            url: payload.url,
            username: payload.username.filter(|u| !u.is_empty()),
            password: payload.password.filter(|p| !p.is_empty()),
        }
    }
}

/// Signature options as sent in a payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsPayload {
    #[serde(default = "default_page")]
    pub page: String,
    /// x0, y0, x1, y1
    #[serde(default)]
    pub coord: [i64; 4],
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub custom_text: String,
    #[serde(default)]
    pub green_tick: bool,
    #[serde(default)]
    pub changes_allowed: bool,
    #[serde(default)]
    pub enable_ltv: bool,
    #[serde(default)]
    pub timestamp: TimestampPayload,
}

fn default_page() -> String {
    "L".to_string()
}

impl Default for OptionsPayload {
    fn default() -> Self {
        Self {
            page: default_page(),
            coord: [0; 4],
            reason: String::new(),
            location: String::new(),
            custom_text: String::new(),
            green_tick: false,
            changes_allowed: false,
            enable_ltv: false,
            timestamp: TimestampPayload::default(),
        }
    }
}

impl TryFrom<OptionsPayload> for SignatureOptions {
    type Error = Error;

    fn try_from(payload: OptionsPayload) -> Result<Self> {
        let page = payload.page.trim().parse::<PageSelector>()?;
        let [x0, y0, x1, y1] = payload.coord;
        let options = SignatureOptions {
            page,
            reason: payload.reason,
            location: payload.location,
            custom_text: payload.custom_text,
            changes_allowed: payload.changes_allowed,
            green_tick: payload.green_tick,
            timestamp: payload.timestamp.into(),
            enable_ltv: payload.enable_ltv,
            ..SignatureOptions::default()
        }
        .with_rect(x0 as f32, y0 as f32, x1 as f32, y1 as f32);
        options.validate()?;
        Ok(options)
    }
}

/// The document as sent in a payload.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfPayload {
    pub base64_content: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for PdfPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfPayload")
            .field("base64_content", &format!("{} chars", self.base64_content.len()))
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PdfPayload {
    /// Decode the document bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let compact: String = self
            .base64_content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(Error::InvalidRequest("base64Content cannot be empty".to_string()));
        }
        Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
    }
}

/// A complete signing job descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    pub cert_info: CertInfo,
    #[serde(default)]
    pub options: OptionsPayload,
    pub pdf: PdfPayload,
}

impl SignaturePayload {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a payload file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Resolve the payload into a request; `base_dir` anchors a relative `pfxPath`.
    pub fn into_request(self, base_dir: &Path) -> Result<SignatureRequest> {
        let options = SignatureOptions::try_from(self.options)?;
        let document = self.pdf.decode()?;
        let bundle = self.cert_info.read_bundle(base_dir)?;
        let request = SignatureRequest::new(document, bundle, self.cert_info.password)
            .with_document_password(self.pdf.password)
            .with_options(options);
        request.validate()?;
        Ok(request)
    }
}

/// A descriptor naming only a credential bundle, for inspection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    pub cert_info: CertInfo,
}

impl CredentialPayload {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// `{"status": ..., "data": ...}` response envelope.
#[derive(Debug, Serialize)]
pub struct Response<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

/// Data of a failed response.
#[derive(Debug, Serialize)]
pub struct Failure {
    pub message: String,
    pub category: &'static str,
    pub cause: Vec<String>,
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "SUCCESS",
            data,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Response<Failure> {
    pub fn failure(error: &Error) -> Self {
        let mut chain = error.chain();
        let message = chain.remove(0);
        Self {
            status: "FAILED",
            data: Failure {
                message,
                category: error.category(),
                cause: chain,
            },
        }
    }
}
