//! Amazon S3 object store.
//!
//! Implements [`ObjectStore`] on top of the S3 REST API with AWS Signature
//! V4 authentication: `HEAD` for the size lookup and `GET` for content.
//!
//! Uses only pure-Rust dependencies (`hmac`, `sha2`) for AWS signing.
//!
//! # Configuration
//!
//! ```toml
//! [object_store]
//! provider = "s3"
//! region = "us-east-1"
//! # endpoint_url = "http://localhost:4566"   # LocalStack
//! ```
//!
//! With no `endpoint_url`, requests go to the virtual-hosted AWS endpoint
//! `<bucket>.s3.<region>.amazonaws.com`. With a custom endpoint, requests use
//! path-style URLs (`<endpoint>/<bucket>/<key>`) and the endpoint's scheme.
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` (required)
//! - `AWS_SECRET_ACCESS_KEY` (required)
//! - `AWS_SESSION_TOKEN` (optional)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::{Digest, Sha256};

use crate::config::ObjectStoreConfig;
use crate::models::FileLocator;
use crate::traits::ObjectStore;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of an empty payload; every request here is body-less.
const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self::new(access_key_id, secret_access_key, session_token))
    }
}

/// A custom endpoint split into scheme and `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: String,
    host: String,
}

impl Endpoint {
    fn parse(url: &str) -> Self {
        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => ("https".to_string(), url),
        };
        Self {
            scheme,
            host: rest.trim_end_matches('/').to_string(),
        }
    }
}

/// Where to send a request for one object, and what to sign.
#[derive(Debug, PartialEq, Eq)]
struct ObjectTarget {
    url: String,
    host: String,
    canonical_uri: String,
}

/// [`ObjectStore`] backed by S3 (or an S3-compatible service).
pub struct S3ObjectStore {
    region: String,
    endpoint: Option<Endpoint>,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3ObjectStore {
    pub fn new(config: &ObjectStoreConfig, creds: AwsCredentials) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint_url.as_deref().map(Endpoint::parse),
            creds,
            client: reqwest::Client::new(),
        }
    }

    /// Build a store using credentials from the environment.
    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self> {
        Ok(Self::new(config, AwsCredentials::from_env()?))
    }

    fn target(&self, locator: &FileLocator) -> ObjectTarget {
        let encoded_key = locator
            .key
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");

        match &self.endpoint {
            Some(endpoint) => {
                let canonical_uri = format!("/{}/{}", uri_encode(&locator.bucket), encoded_key);
                ObjectTarget {
                    url: format!("{}://{}{}", endpoint.scheme, endpoint.host, canonical_uri),
                    host: endpoint.host.clone(),
                    canonical_uri,
                }
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", locator.bucket, self.region);
                let canonical_uri = format!("/{}", encoded_key);
                ObjectTarget {
                    url: format!("https://{}{}", host, canonical_uri),
                    host,
                    canonical_uri,
                }
            }
        }
    }

    async fn send(&self, method: Method, locator: &FileLocator) -> Result<reqwest::Response> {
        let target = self.target(locator);
        let headers = sign_request(
            method.as_str(),
            &target.host,
            &target.canonical_uri,
            &self.region,
            &self.creds,
            Utc::now(),
        );

        let mut req = self.client.request(method.clone(), &target.url);
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }

        req.send()
            .await
            .with_context(|| format!("{} {} failed", method, locator))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn head_size(&self, locator: &FileLocator) -> Result<u64> {
        let resp = self.send(Method::HEAD, locator).await?;

        if !resp.status().is_success() {
            bail!("S3 HeadObject failed (HTTP {}) for {}", resp.status(), locator);
        }

        let length = resp
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .with_context(|| format!("S3 HeadObject for {} returned no Content-Length", locator))?;

        length
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .with_context(|| format!("invalid Content-Length {:?} for {}", length, locator))
    }

    async fn get_bytes(&self, locator: &FileLocator) -> Result<Vec<u8>> {
        let resp = self.send(Method::GET, locator).await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            match parse_s3_error(&body) {
                Some(e) => bail!(
                    "S3 GetObject failed (HTTP {}) for {}: {}: {}",
                    status,
                    locator,
                    e.code,
                    e.message
                ),
                None => bail!("S3 GetObject failed (HTTP {}) for {}", status, locator),
            }
        }

        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {}", locator))?;
        Ok(bytes.to_vec())
    }
}

// ============ AWS SigV4 Helpers ============

/// Sign a body-less request and return the headers to attach (besides `host`).
fn sign_request(
    method: &str,
    host: &str,
    canonical_uri: &str,
    region: &str,
    creds: &AwsCredentials,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = vec![
        ("host".to_string(), host.to_string()),
        (
            "x-amz-content-sha256".to_string(),
            EMPTY_PAYLOAD_SHA256.to_string(),
        ),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, canonical_uri, canonical_headers, signed_headers, EMPTY_PAYLOAD_SHA256
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3");
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    );

    headers.retain(|(k, _)| k != "host");
    headers.push(("authorization".to_string(), authorization));
    headers
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986, leaving `A-Z a-z 0-9 - _ . ~` as-is.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ Error bodies ============

/// `<Code>` and `<Message>` from an S3 `<Error>` document.
#[derive(Debug, PartialEq, Eq)]
struct S3ErrorBody {
    code: String,
    message: String,
}

fn parse_s3_error(xml: &str) -> Option<S3ErrorBody> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut field: Option<Vec<u8>> = None;
    let mut code = None;
    let mut message = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => field = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::Text(t)) => {
                let text = t.unescape().ok()?.into_owned();
                match field.as_deref() {
                    Some(b"Code") => code = Some(text),
                    Some(b"Message") => message = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => field = None,
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    code.map(|code| S3ErrorBody {
        code,
        message: message.unwrap_or_default(),
    })
}
