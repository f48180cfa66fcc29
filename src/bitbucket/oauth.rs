//! Three-legged OAuth1 (RFC 5849) consumer for Bitbucket Server application links
//!
//! Bitbucket Server signs with RSA-SHA1 against the public key registered on the
//! application link. HMAC-SHA1 is supported for servers configured with a shared
//! consumer secret.

use crate::config::{OAuthSettings, OAuthToken};
use crate::errors::{Result, VcsError};
use base64::Engine;
use hmac::{Hmac, Mac};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use sha1::Sha1;
use std::fmt;
use std::fs;
use tracing::{debug, info};
use url::Url;

/// Everything except the RFC 3986 unreserved characters
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const REQUEST_TOKEN_PATH: &str = "/plugins/servlet/oauth/request-token";
const AUTHORIZE_PATH: &str = "/plugins/servlet/oauth/authorize";
const ACCESS_TOKEN_PATH: &str = "/plugins/servlet/oauth/access-token";

pub(crate) fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

pub enum SignatureMethod {
    RsaSha1(PKey<Private>),
    HmacSha1 { consumer_secret: String },
}

impl SignatureMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SignatureMethod::RsaSha1(_) => "RSA-SHA1",
            SignatureMethod::HmacSha1 { .. } => "HMAC-SHA1",
        }
    }
}

impl fmt::Debug for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct OAuthConsumer {
    consumer_key: String,
    method: SignatureMethod,
    base_url: String,
    callback_url: String,
    http: reqwest::Client,
}

/// Per-request protocol values, fixed in tests
struct Stamp {
    nonce: String,
    timestamp: String,
}

impl Stamp {
    fn fresh() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp().to_string(),
        }
    }
}

impl OAuthConsumer {
    pub fn new(
        consumer_key: impl Into<String>,
        method: SignatureMethod,
        base_url: &str,
        callback_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            method,
            base_url: base_url.trim_end_matches('/').to_string(),
            callback_url: callback_url.into(),
            http,
        }
    }

    /// Build a consumer from settings, loading the RSA key from disk when configured
    pub fn from_settings(settings: &OAuthSettings, base_url: &str, http: reqwest::Client) -> Result<Self> {
        let method = match (&settings.private_key_path, &settings.consumer_secret) {
            (Some(path), _) => {
                let pem = fs::read(path).map_err(|e| {
                    VcsError::config(format!(
                        "Failed to read OAuth private key {}: {e}",
                        path.display()
                    ))
                })?;
                let key = PKey::private_key_from_pem(&pem)
                    .map_err(|e| VcsError::config(format!("Invalid OAuth private key: {e}")))?;
                SignatureMethod::RsaSha1(key)
            }
            (None, Some(secret)) => SignatureMethod::HmacSha1 {
                consumer_secret: secret.clone(),
            },
            (None, None) => {
                return Err(VcsError::config(
                    "OAuth needs either a private key path or a consumer secret",
                ))
            }
        };

        Ok(Self::new(
            settings.consumer_key.clone(),
            method,
            base_url,
            settings.callback_url.clone(),
            http,
        ))
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn authorize_url(&self, request_token: &OAuthToken) -> String {
        format!(
            "{}{}?oauth_token={}",
            self.base_url,
            AUTHORIZE_PATH,
            encode(&request_token.token)
        )
    }

    /// First leg: fetch a request token and the URL the user must approve it at
    pub async fn authorize_redirect(&self) -> Result<(OAuthToken, String)> {
        let url = Url::parse(&format!("{}{}", self.base_url, REQUEST_TOKEN_PATH))?;
        let extra = [("oauth_callback", self.callback_url.clone())];
        let request_token = self
            .token_exchange(&url, None, &extra)
            .await
            .map_err(|e| VcsError::transport("Unable to obtain OAuth request token", e))?;

        let authorize_url = self.authorize_url(&request_token);
        info!("Obtained OAuth request token, redirecting to {}", authorize_url);
        Ok((request_token, authorize_url))
    }

    /// Last leg: trade the approved request token and verifier for an access token
    pub async fn authorize_token(&self, request_token: &OAuthToken, verifier: &str) -> Result<OAuthToken> {
        let url = Url::parse(&format!("{}{}", self.base_url, ACCESS_TOKEN_PATH))?;
        let extra = [("oauth_verifier", verifier.to_string())];
        let access = self
            .token_exchange(&url, Some(request_token), &extra)
            .await
            .map_err(|e| VcsError::transport("Unable to obtain OAuth access token", e))?;

        info!("Obtained OAuth access token");
        Ok(access)
    }

    async fn token_exchange(
        &self,
        url: &Url,
        token: Option<&OAuthToken>,
        extra: &[(&str, String)],
    ) -> Result<OAuthToken> {
        let header = self.sign_request(&Method::POST, url, token, extra, &[], Stamp::fresh())?;
        debug!("POST {}", url);

        let response = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, header)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(VcsError::transport(
                format!("POST {url} returned {status}"),
                body,
            ));
        }

        parse_token_response(&body)
    }

    /// `Authorization` header value for a request signed with an access token
    pub fn authorization_header(&self, method: &Method, url: &Url, access: &OAuthToken) -> Result<String> {
        self.sign_request(method, url, Some(access), &[], &[], Stamp::fresh())
    }

    fn sign_request(
        &self,
        method: &Method,
        url: &Url,
        token: Option<&OAuthToken>,
        extra_oauth: &[(&str, String)],
        body_params: &[(&str, &str)],
        stamp: Stamp,
    ) -> Result<String> {
        let mut oauth: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), stamp.nonce),
            ("oauth_signature_method".into(), self.method.name().into()),
            ("oauth_timestamp".into(), stamp.timestamp),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = token {
            oauth.push(("oauth_token".into(), token.token.clone()));
        }
        oauth.extend(extra_oauth.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let mut params = oauth.clone();
        params.extend(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
        params.extend(body_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base = signature_base_string(method.as_str(), url, &params);
        let token_secret = token.map(|t| t.secret.as_str()).unwrap_or("");
        let signature = self.sign(&base, token_secret)?;

        oauth.push(("oauth_signature".into(), signature));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    fn sign(&self, base: &str, token_secret: &str) -> Result<String> {
        let raw = match &self.method {
            SignatureMethod::HmacSha1 { consumer_secret } => {
                let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
                let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                    .map_err(|e| VcsError::config(format!("Invalid HMAC key: {e}")))?;
                mac.update(base.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            SignatureMethod::RsaSha1(key) => {
                let mut signer = Signer::new(MessageDigest::sha1(), key)
                    .map_err(|e| VcsError::transport("RSA signer setup failed", e))?;
                signer
                    .update(base.as_bytes())
                    .map_err(|e| VcsError::transport("RSA signing failed", e))?;
                signer
                    .sign_to_vec()
                    .map_err(|e| VcsError::transport("RSA signing failed", e))?
            }
        };
        Ok(base64::engine::general_purpose::STANDARD.encode(raw))
    }
}

/// `METHOD&url&params`, each part encoded, params sorted by encoded name then value
pub(crate) fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let normalized_params = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&normalized_url(url)),
        encode(&normalized_params)
    )
}

fn normalized_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

fn parse_token_response(body: &str) -> Result<OAuthToken> {
    let mut token = None;
    let mut secret = None;
    for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }

    match (token, secret) {
        (Some(token), Some(secret)) => Ok(OAuthToken::new(token, secret)),
        _ => Err(VcsError::transport(
            "Malformed OAuth token response",
            body.to_string(),
        )),
    }
}
