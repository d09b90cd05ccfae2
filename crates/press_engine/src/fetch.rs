use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::decode::decode_markup;
use crate::login::{login_succeeded, LoginRequest};
use crate::site::LoginForm;
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput, PipelineEvent};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Accepted page types; an entry ending in `/*` accepts the whole family.
    pub page_content_types: Vec<String>,
    pub image_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 10 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (compatible; press/0.1)".to_string(),
            page_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            image_content_types: vec![
                "image/*".to_string(),
                "application/octet-stream".to_string(),
            ],
        }
    }
}

impl FetchSettings {
    fn accepts(&self, kind: ResourceKind, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        let allowed = match kind {
            ResourceKind::Page => &self.page_content_types,
            ResourceKind::Image => &self.image_content_types,
        };
        allowed.iter().any(|allowed| match allowed.strip_suffix("/*") {
            Some(family) => ct
                .split_once('/')
                .is_some_and(|(f, _)| f.eq_ignore_ascii_case(family)),
            None => allowed.eq_ignore_ascii_case(ct),
        })
    }
}

/// What a fetch is for; selects the accepted content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Page,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// The network collaborator: authentication plus retrieval.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Returns `Ok(false)` when the site rejected the credentials.
    async fn login(&self, credentials: &Credentials) -> Result<bool, FetchError>;

    async fn fetch(&self, url: &str, kind: ResourceKind) -> Result<FetchOutput, FetchError>;
}

/// A decoded HTML page and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: Url,
    pub html: String,
    pub encoding: String,
}

/// Fetches `url` as a page and decodes it to UTF-8.
pub async fn fetch_page(session: &dyn Session, url: &str) -> Result<Page, FetchError> {
    let output = session.fetch(url, ResourceKind::Page).await?;
    let final_url = Url::parse(&output.metadata.final_url)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    let decoded = decode_markup(&output.bytes, output.metadata.content_type.as_deref())
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
    Ok(Page {
        url: final_url,
        html: decoded.html,
        encoding: decoded.encoding_label,
    })
}

/// Cookie-keeping HTTP session backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestSession {
    settings: FetchSettings,
    login_form: LoginForm,
    jar: Arc<Jar>,
}

impl ReqwestSession {
    pub fn new(settings: FetchSettings, login_form: LoginForm) -> Self {
        Self {
            settings,
            login_form,
            jar: Arc::new(Jar::default()),
        }
    }

    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .cookie_provider(self.jar.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    async fn post_form(&self, url: Url, body: String) -> Result<FetchOutput, FetchError> {
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;
        let original_url = url.to_string();
        let response = client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(response, &original_url, ResourceKind::Page, redirect_counter)
            .await
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
        original_url: &str,
        kind: ResourceKind,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<FetchOutput, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.settings.accepts(kind, ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        engine_debug!("fetched {} ({} bytes)", final_url, bytes.len());
        let metadata = FetchMetadata {
            original_url: original_url.to_string(),
            final_url,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

#[async_trait::async_trait]
impl Session for ReqwestSession {
    async fn login(&self, credentials: &Credentials) -> Result<bool, FetchError> {
        engine_info!("Logging in as {}", credentials.email);
        let page = fetch_page(self, &self.login_form.url).await?;
        let request = LoginRequest::from_page(&page, &self.login_form, credentials)?;
        let output = self.post_form(request.action, request.body).await?;
        let html = decode_markup(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?
            .html;

        let success = login_succeeded(&html, credentials);
        if success {
            engine_info!("Login succeeded");
        } else {
            engine_warn!("Login failed, please check your credentials");
        }
        Ok(success)
    }

    async fn fetch(&self, url: &str, kind: ResourceKind) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        self.read_response(response, url, kind, redirect_counter).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_families_are_matched() {
        let settings = FetchSettings::default();
        assert!(settings.accepts(ResourceKind::Page, "text/html; charset=utf-8"));
        assert!(!settings.accepts(ResourceKind::Page, "image/png"));
        assert!(settings.accepts(ResourceKind::Image, "image/png"));
        assert!(settings.accepts(ResourceKind::Image, "IMAGE/JPEG"));
        assert!(!settings.accepts(ResourceKind::Image, "text/html"));
    }
}
