//! RFC 3161 timestamp authority client.
//!
//! A token is requested over the SHA-256 of the CMS signature value and
//! embedded as the `signatureTimeStampToken` unsigned attribute. Any failure
//! after timestamping was requested is fatal for the job.

use crate::config::SigningContext;
use crate::error::{Error, Result};
use crate::signatures::types::DigestAlgorithm;
use cmpv2::status::PkiStatus;
use der::asn1::{Int, OctetString};
use der::{Decode, Encode};
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use spki::AlgorithmIdentifierOwned;
use std::io::Read;
use x509_tsp::{MessageImprint, TimeStampReq, TimeStampResp, TspVersion, TstInfo};

/// id-ct-TSTInfo
const ID_CT_TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";

/// Timestamp authority settings of a job.
#[derive(Clone, Default)]
pub struct TimestampConfig {
    /// Whether a timestamp is requested at all
    pub enabled: bool,
    /// Authority URL (http or https)
    pub url: String,
    /// Optional basic-auth user
    pub username: Option<String>,
    /// Optional basic-auth password
    pub password: Option<String>,
}

impl std::fmt::Debug for TimestampConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampConfig")
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TimestampConfig {
    /// Timestamping against `url` without credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Add basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Whether a token will be requested.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }

    /// An enabled configuration needs an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "timestamping is enabled but no authority URL was given".to_string(),
            ));
        }
        let url = reqwest::Url::parse(self.url.trim())
            .map_err(|e| Error::InvalidRequest(format!("invalid timestamp URL '{}': {}", self.url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(Error::InvalidRequest(format!(
                "timestamp URL must be http or https, got '{}'",
                other
            ))),
        }
    }
}

/// Anything able to produce an RFC 3161 token for a message.
pub trait TimestampSource {
    /// DER `TimeStampToken` (a CMS ContentInfo) over SHA-256 of `message`.
    fn timestamp(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Bytes to reserve in the signature placeholder for one token.
    fn token_size_estimate(&self) -> usize;
}

/// Blocking HTTP client for one timestamp authority.
pub struct TimestampClient {
    config: TimestampConfig,
    http: reqwest::blocking::Client,
    token_size: usize,
    max_response_size: usize,
}

impl std::fmt::Debug for TimestampClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampClient")
            .field("config", &self.config)
            .field("token_size", &self.token_size)
            .field("max_response_size", &self.max_response_size)
            .finish()
    }
}

impl TimestampClient {
    /// Build a client using the timeout and user agent of `ctx`.
    pub fn new(config: TimestampConfig, ctx: &SigningContext) -> Result<Self> {
        config.validate()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(ctx.config().tsa_timeout)
            .user_agent(ctx.config().user_agent.clone())
            .build()
            .map_err(|e| Error::TimestampAuthority {
                url: config.url.clone(),
                reason: format!("HTTP client could not be created: {}", e),
            })?;
        Ok(Self {
            token_size: ctx.config().timestamp_token_size,
            max_response_size: ctx.config().max_response_size,
            config,
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn failure(&self, reason: impl Into<String>) -> Error {
        Error::TimestampAuthority {
            url: self.config.url.clone(),
            reason: reason.into(),
        }
    }

    fn post(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let mut builder = self
            .http
            .post(self.config.url.trim())
            .header(CONTENT_TYPE, "application/timestamp-query")
            .body(request);
        if let Some(user) = &self.config.username {
            builder = builder.basic_auth(user, self.config.password.as_ref());
        }

        let response = builder
            .send()
            .map_err(|e| self.failure(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(self.failure(format!("HTTP status {}", response.status())));
        }
        read_bounded(response, self.max_response_size).map_err(|reason| self.failure(reason))
    }
}

impl TimestampSource for TimestampClient {
    fn timestamp(&self, message: &[u8]) -> Result<Vec<u8>> {
        let digest = DigestAlgorithm::Sha256.digest(message);
        let nonce = positive_nonce().map_err(|e| self.failure(e.to_string()))?;
        let request = build_request(&digest, nonce.clone())
            .and_then(|req| req.to_der())
            .map_err(|e| self.failure(format!("request could not be encoded: {}", e)))?;

        log::info!("Requesting timestamp from {}", self.config.url);
        let body = self.post(request)?;
        let token = extract_token(&body, &digest, &nonce).map_err(|reason| self.failure(reason))?;
        log::debug!("Received {} byte timestamp token", token.len());
        Ok(token)
    }

    fn token_size_estimate(&self) -> usize {
        self.token_size
    }
}

/// Read at most `limit` bytes; a longer body is an error, not a truncation.
fn read_bounded(reader: impl Read, limit: usize) -> std::result::Result<Vec<u8>, String> {
    let mut body = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| format!("failed to read response: {}", e))?;
    if body.len() > limit {
        return Err(format!("response exceeds the {} byte limit", limit));
    }
    Ok(body)
}

fn positive_nonce() -> der::Result<Int> {
    let mut bytes: [u8; 8] = rand::thread_rng().gen();
    bytes[0] &= 0x7F;
    if bytes[0] == 0 {
        bytes[0] = 1;
    }
    Int::new(&bytes)
}

/// `TimeStampReq` for a SHA-256 imprint, asking for the TSA certificate.
pub fn build_request(digest: &[u8], nonce: Int) -> der::Result<TimeStampReq> {
    Ok(TimeStampReq {
        version: TspVersion::V1,
        message_imprint: MessageImprint {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: DigestAlgorithm::Sha256.oid(),
                parameters: None,
            },
            hashed_message: OctetString::new(digest)?,
        },
        req_policy: None,
        nonce: Some(nonce),
        cert_req: true,
        extensions: None,
    })
}

/// Check a `TimeStampResp` and return the DER token it carries.
///
/// The status must be granted, and the token's imprint and nonce must echo the
/// request.
pub fn extract_token(body: &[u8], digest: &[u8], nonce: &Int) -> std::result::Result<Vec<u8>, String> {
    let response =
        TimeStampResp::from_der(body).map_err(|e| format!("malformed TimeStampResp: {}", e))?;
    match response.status.status {
        PkiStatus::Accepted | PkiStatus::GrantedWithMods => {},
        other => return Err(format!("authority refused the request ({:?})", other)),
    }
    let token = response
        .time_stamp_token
        .ok_or_else(|| "response carries no TimeStampToken".to_string())?;

    let signed_data = cms::signed_data::SignedData::from_der(
        &token
            .content
            .to_der()
            .map_err(|e| format!("token content could not be re-encoded: {}", e))?,
    )
    .map_err(|e| format!("token is not SignedData: {}", e))?;
    let encap = &signed_data.encap_content_info;
    if encap.econtent_type.to_string() != ID_CT_TST_INFO {
        return Err(format!("token content type is {}", encap.econtent_type));
    }
    let econtent = encap
        .econtent
        .as_ref()
        .ok_or_else(|| "token has no TSTInfo".to_string())?;
    let tst_info =
        TstInfo::from_der(econtent.value()).map_err(|e| format!("malformed TSTInfo: {}", e))?;

    if tst_info.message_imprint.hashed_message.as_bytes() != digest {
        return Err("token imprint does not match the signature".to_string());
    }
    if tst_info.nonce.as_ref() != Some(nonce) {
        return Err("token nonce does not match the request".to_string());
    }

    token
        .to_der()
        .map_err(|e| format!("token could not be re-encoded: {}", e))
}
