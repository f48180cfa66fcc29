use super::oauth::OAuthConsumer;
use super::types::Page;
use crate::cache::{self, CacheStore};
use crate::config::Credential;
use crate::errors::{Result, VcsError};
use crate::vcs::VcsStream;
use futures::TryStreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Query parameters; pairs with an empty value are dropped
pub type Query = Vec<(&'static str, String)>;

/// REST families exposed by Bitbucket Server under the same host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    Core,
    BuildStatus,
    Insights,
    Keys,
    Ssh,
}

impl ApiFamily {
    pub fn base_path(&self) -> &'static str {
        match self {
            ApiFamily::Core => "/rest/api/1.0",
            ApiFamily::BuildStatus => "/rest/build-status/1.0",
            ApiFamily::Insights => "/rest/insights/1.0",
            ApiFamily::Keys => "/rest/keys/1.0",
            ApiFamily::Ssh => "/rest/ssh/1.0",
        }
    }
}

/// Percent-encode one path segment
pub fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Percent-encode a slash separated path, keeping the slashes
pub fn path_segments(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// A paged listing request
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub family: ApiFamily,
    pub path: String,
    pub query: Query,
    /// Stop once this many items are collected; zero means no limit
    pub limit: usize,
    /// Return what was collected so far when the client is cancelled
    pub partial_on_cancel: bool,
    /// Skip the response cache, for reads that guard a write
    pub fresh: bool,
}

impl PageRequest {
    pub fn core(path: impl Into<String>) -> Self {
        Self {
            family: ApiFamily::Core,
            path: path.into(),
            query: Vec::new(),
            limit: 0,
            partial_on_cancel: false,
            fresh: false,
        }
    }

    pub fn family(mut self, family: ApiFamily) -> Self {
        self.family = family;
        self
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn partial_on_cancel(mut self) -> Self {
        self.partial_on_cancel = true;
        self
    }

    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }
}

/// Bitbucket Server API transport
///
/// One instance per credential. Cloning is cheap and shares the HTTP client,
/// the cache store and the cancellation token.
#[derive(Clone)]
pub struct BitbucketClient {
    http: reqwest::Client,
    base_url: String,
    credential: Credential,
    oauth: Option<Arc<OAuthConsumer>>,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Option<Duration>,
    page_size: usize,
    cancel: CancellationToken,
}

impl BitbucketClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        credential: Credential,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            oauth: None,
            cache,
            cache_ttl: None,
            page_size: 1000,
            cancel: CancellationToken::new(),
        }
    }

    /// Consumer used to sign requests for OAuth1 credentials
    pub fn with_oauth(mut self, consumer: Arc<OAuthConsumer>) -> Self {
        self.oauth = Some(consumer);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> Option<&str> {
        self.credential.username()
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Absolute URL for a family path, with non-empty query pairs appended
    pub fn api_url(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}{}/{}",
            self.base_url,
            family.base_path(),
            path.trim_start_matches('/')
        ))?;

        let pairs: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (k, v) in pairs {
                serializer.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Who the request runs as; never the raw token
    fn acting_user(&self) -> String {
        match self.credential.username() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let digest = Sha256::digest(self.credential.token().as_bytes());
                format!("{digest:x}")[..16].to_string()
            }
        }
    }

    fn cache_key(&self, url: &Url) -> String {
        let user = self.acting_user();
        cache::key(&["vcs", "bitbucketserver", "request", url.as_str(), user.as_str()])
    }

    /// Make a GET request to the Bitbucket API
    pub async fn get<T: DeserializeOwned>(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<T> {
        let raw = self.execute(Method::GET, family, path, query, None, false).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// GET that bypasses the response cache
    pub async fn get_fresh<T: DeserializeOwned>(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<T> {
        let raw = self.execute(Method::GET, family, path, query, None, true).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// GET returning the undecoded body
    pub async fn get_raw(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        self.execute(Method::GET, family, path, query, None, false).await
    }

    /// Make a POST request to the Bitbucket API
    pub async fn post<B, T>(&self, family: ApiFamily, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let raw = self.execute(Method::POST, family, path, &[], Some(body), false).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// POST whose response body is ignored
    pub async fn post_empty<B: Serialize + ?Sized>(&self, family: ApiFamily, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_vec(body)?;
        self.execute(Method::POST, family, path, &[], Some(body), false).await?;
        Ok(())
    }

    /// Make a PUT request to the Bitbucket API
    pub async fn put<B, T>(&self, family: ApiFamily, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let raw = self.execute(Method::PUT, family, path, &[], Some(body), false).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// PUT with query parameters and no body, response ignored
    pub async fn put_empty(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.execute(Method::PUT, family, path, query, None, false).await?;
        Ok(())
    }

    /// Make a DELETE request to the Bitbucket API
    pub async fn delete(&self, family: ApiFamily, path: &str) -> Result<()> {
        self.execute(Method::DELETE, family, path, &[], None, false).await?;
        Ok(())
    }

    /// Raw body and headers, no decoding and no caching
    pub async fn stream(&self, family: ApiFamily, path: &str, query: &[(&str, String)]) -> Result<VcsStream> {
        let url = self.api_url(family, path, query)?;
        debug!("GET {} (stream)", url);

        let response = self.send(&Method::GET, &url, None).await?;
        let response = classify(&Method::GET, &url, response).await?;

        let headers = response.headers().clone();
        let context = format!("GET {url}");
        let body = response
            .bytes_stream()
            .map_err(move |e| VcsError::transport(context.clone(), e));

        Ok(VcsStream {
            headers,
            body: Box::pin(body),
        })
    }

    /// Walk a paged listing until the last page, the limit or cancellation
    pub async fn paginate<T: DeserializeOwned>(&self, request: PageRequest) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        let mut start = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                if request.partial_on_cancel {
                    debug!(
                        "Listing {} cancelled after {} items",
                        request.path,
                        items.len()
                    );
                    return Ok(items);
                }
                return Err(cancelled(&request.path));
            }

            let mut query = request.query.clone();
            query.push(("limit", self.page_size.to_string()));
            query.push(("start", start.to_string()));

            let raw = match self
                .execute(Method::GET, request.family, &request.path, &query, None, request.fresh)
                .await
            {
                Ok(raw) => raw,
                Err(_) if request.partial_on_cancel && self.cancel.is_cancelled() => {
                    return Ok(items)
                }
                Err(e) => return Err(e),
            };
            let page: Page<T> = serde_json::from_slice(&raw)?;

            let received = page.values.len();
            items.extend(page.values);

            if page.is_last_page || received == 0 {
                break;
            }
            if request.limit > 0 && items.len() >= request.limit {
                break;
            }
            let next = page.next_page_start.unwrap_or(page.start + received);
            if next <= start {
                return Err(VcsError::transport(
                    format!("Listing {} did not advance", request.path),
                    format!("next page start {next} after start {start}"),
                ));
            }
            start = next;
        }

        Ok(items)
    }

    async fn execute(
        &self,
        method: Method,
        family: ApiFamily,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
        fresh: bool,
    ) -> Result<Vec<u8>> {
        let url = self.api_url(family, path, query)?;
        let key = self.cache_key(&url);
        let is_get = method == Method::GET;

        if is_get && !fresh {
            match self.cache.get(&key).await {
                Ok(Some(hit)) => {
                    trace!("Cache hit for {}", url);
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache read failed for {}: {}", url, e),
            }
        }

        debug!("{} {}", method, url);
        let sent = self.send(&method, &url, body).await;

        if !is_get {
            if let Err(e) = self.cache.delete(&key).await {
                warn!("Cache invalidation failed for {}: {}", url, e);
            }
        }

        let response = classify(&method, &url, sent?).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| VcsError::transport(format!("Failed to read body of {method} {url}"), e))?
            .to_vec();
        trace!("Response body: {}", String::from_utf8_lossy(&bytes));

        if is_get {
            let stored = match self.cache_ttl {
                Some(ttl) => self.cache.set_with_ttl(&key, bytes.clone(), ttl).await,
                None => self.cache.set(&key, bytes.clone()).await,
            };
            if let Err(e) = stored {
                warn!("Cache write failed for {}: {}", url, e);
            }
        }

        Ok(bytes)
    }

    async fn send(&self, method: &Method, url: &Url, body: Option<Vec<u8>>) -> Result<Response> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        request = match &self.credential {
            Credential::Bearer { token, .. } => request.bearer_auth(token),
            Credential::OAuth1 { access, .. } => {
                let consumer = self.oauth.as_ref().ok_or_else(|| {
                    VcsError::config("OAuth1 credential used without a configured consumer")
                })?;
                request.header(AUTHORIZATION, consumer.authorization_header(method, url, access)?)
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(cancelled(url.path())),
            sent = request.send() => {
                sent.map_err(|e| VcsError::transport(format!("{method} {url} failed"), e))
            }
        }
    }
}

fn cancelled(what: &str) -> VcsError {
    VcsError::transport(
        format!("Request to {what} cancelled"),
        std::io::Error::new(std::io::ErrorKind::Interrupted, "cancelled"),
    )
}

/// Map a non-2xx response onto the error taxonomy
async fn classify(method: &Method, url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let target = format!("{method} {}", url.path());

    Err(match status {
        StatusCode::NOT_FOUND => VcsError::NotFound(target),
        StatusCode::FORBIDDEN => VcsError::Forbidden(target),
        StatusCode::UNAUTHORIZED => VcsError::Unauthorized(target),
        StatusCode::BAD_REQUEST => {
            warn!("Bitbucket rejected {}: {}", target, body);
            VcsError::WrongRequest(format!("{target}: {body}"))
        }
        _ => VcsError::transport(format!("{target} returned {status}"), body),
    })
}
