//! OAuth 1.0 HMAC-SHA1 request signing.
//!
//! # Design
//! Two-legged by default (consumer key/secret only); an access token can be
//! added with `with_token`. `sign_with` is a pure function of its inputs so
//! it can be checked against reference vectors; `sign` draws the nonce and
//! timestamp from a `NonceSource`. The body is hashed as opaque bytes into
//! `oauth_body_hash` and never parsed or modified.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::http::HttpMethod;

type HmacSha1 = Hmac<Sha1>;

/// Supplies the per-request nonce and timestamp.
pub trait NonceSource: Send + Sync {
    fn nonce(&self) -> String;
    fn timestamp(&self) -> i64;
}

/// Random UUID nonce and the current epoch second.
#[derive(Debug, Default)]
pub struct SystemNonce;

impl NonceSource for SystemNonce {
    fn nonce(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn timestamp(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Always the same nonce and timestamp. For tests.
#[derive(Debug, Clone)]
pub struct FixedNonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl NonceSource for FixedNonce {
    fn nonce(&self) -> String {
        self.nonce.clone()
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: Option<(String, String)>,
    nonce_source: Arc<dyn NonceSource>,
}

// The secrets stay out of Debug output.
impl fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token.as_ref().map(|(key, _)| key))
            .finish_non_exhaustive()
    }
}

impl OAuthSigner {
    pub fn new(consumer_key: &str, consumer_secret: &str) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            token: None,
            nonce_source: Arc::new(SystemNonce),
        }
    }

    pub fn with_token(mut self, token: &str, token_secret: &str) -> Self {
        self.token = Some((token.to_string(), token_secret.to_string()));
        self
    }

    pub fn with_nonce_source(mut self, source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = source;
        self
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Sign a request with a fresh nonce and timestamp.
    pub fn sign(&self, method: &HttpMethod, url: &str, body: Option<&[u8]>) -> Vec<(String, String)> {
        let nonce = self.nonce_source.nonce();
        let timestamp = self.nonce_source.timestamp();
        self.sign_with(method, url, body, &nonce, timestamp)
    }

    /// Sign a request with the given nonce and timestamp.
    pub fn sign_with(
        &self,
        method: &HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        nonce: &str,
        timestamp: i64,
    ) -> Vec<(String, String)> {
        let mut oauth_params = self.protocol_params(body, nonce, timestamp);
        let signature = self.signature(method, url, &oauth_params);
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        vec![(
            "Authorization".to_string(),
            format!("OAuth realm=\"\", {}", fields.join(", ")),
        )]
    }

    fn protocol_params(&self, body: Option<&[u8]>, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some((token, _)) = &self.token {
            params.push(("oauth_token".to_string(), token.clone()));
        }
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            params.push(("oauth_body_hash".to_string(), STANDARD.encode(Sha1::digest(body))));
        }
        params
    }

    fn signature(&self, method: &HttpMethod, url: &str, oauth_params: &[(String, String)]) -> String {
        let base = signature_base_string(method, url, oauth_params);
        let token_secret = self.token.as_ref().map(|(_, s)| s.as_str()).unwrap_or("");
        let key = format!("{}&{}", encode(&self.consumer_secret), encode(token_secret));

        let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(base.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// `METHOD&enc(normalized url)&enc(sorted params)`, params being the OAuth
/// protocol parameters plus the URL's query parameters.
pub fn signature_base_string(method: &HttpMethod, url: &str, oauth_params: &[(String, String)]) -> String {
    let (base_url, query) = split_url(url);

    let mut params: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(query_pairs(query).map(|(k, v)| (encode(&k), encode(&v))))
        .collect();
    params.sort();
    let normalized: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();

    format!(
        "{}&{}&{}",
        method.as_str(),
        encode(&base_url),
        encode(&normalized.join("&"))
    )
}

/// RFC 3986 percent-encoding: everything but `A-Za-z0-9-._~`.
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Split `url` into its normalized base (lowercase scheme and host, default
/// port dropped, no query or fragment) and its raw query string.
fn split_url(url: &str) -> (String, &str) {
    let url = url.split('#').next().unwrap_or(url);
    let (without_query, query) = match url.split_once('?') {
        Some((head, q)) => (head, q),
        None => (url, ""),
    };

    let Some((scheme, rest)) = without_query.split_once("://") else {
        return (without_query.to_string(), query);
    };
    let scheme = scheme.to_ascii_lowercase();
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let authority = authority.to_ascii_lowercase();
    let authority = match (scheme.as_str(), authority.rsplit_once(':')) {
        ("http", Some((host, "80"))) | ("https", Some((host, "443"))) => host.to_string(),
        _ => authority.clone(),
    };

    (format!("{scheme}://{authority}{path}"), query)
}

fn query_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query.split('&').filter(|p| !p.is_empty()).map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (decode(k), decode(v))
    })
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
