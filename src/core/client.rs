//! Protocol client for the gift card service
//!
//! The service has no structured API. Each operation is a login-style form
//! POST, and success of a login can only be read from whether the server
//! redirected away from the login URL. The client therefore carries raw HTML
//! between steps rather than typed responses.
//!
//! # Flows
//!
//! ```text
//! BalanceLookup:  POST card ──▶ balance page
//! Registration:   POST card ──▶ (redirected?) ──▶ POST contact ──▶ page
//! SetPin:         POST card ──▶ (redirected? CardID token?) ──▶ POST pin ──▶ page
//! ```

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use tracing::{debug, warn};

use super::traits::{CardService, HttpSession, PostReply, SessionFactory, SessionKind};
use crate::types::{CheckerError, FormFields, ProtocolRequest};

/// Base domain of the card service
pub const BASE_URL: &str = "https://mygift.giftcardmall.com/";

const BALANCE_PATH: &str = "Card/_Login?returnUrl=Transactions";
const REGISTRATION_LOGIN_PATH: &str = "Card/_Login?returnUrl=Registration";
const REGISTRATION_COMPLETE_PATH: &str = "Account/_Profile/form-complete-reg?name=complete-reg";
const SET_PIN_LOGIN_PATH: &str = "Card/_Login?returnUrl=SetPin";
const SET_PIN_PATH: &str = "Card/_SetPin/setpin-form";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for the HTTP side of the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL, always ending in `/`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Skip TLS certificate verification. Debugging only.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    /// Create a ClientConfig, falling back to defaults for unusable values
    pub fn new(base_url: &str, timeout_seconds: u64, accept_invalid_certs: bool) -> Self {
        let timeout_seconds = if timeout_seconds == 0 {
            warn!(
                "invalid timeout ({}), using default ({})",
                timeout_seconds, DEFAULT_TIMEOUT_SECONDS
            );
            DEFAULT_TIMEOUT_SECONDS
        } else {
            timeout_seconds
        };

        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        if accept_invalid_certs {
            warn!("TLS certificate verification is disabled; do not use this outside debugging");
        }

        Self {
            base_url,
            timeout_seconds,
            accept_invalid_certs,
        }
    }
}

/// Session factory backed by reqwest
///
/// Stateless sessions share one connection pool; cookie sessions get a fresh
/// client with its own cookie jar.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    config: ClientConfig,
    shared: reqwest::Client,
}

impl HttpSessionFactory {
    pub fn new(config: ClientConfig) -> Result<Self, CheckerError> {
        let shared = build_client(&config, false)?;
        Ok(Self { config, shared })
    }
}

impl SessionFactory for HttpSessionFactory {
    type Session = ReqwestSession;

    fn open_session(&self, kind: SessionKind) -> Result<ReqwestSession, CheckerError> {
        let client = match kind {
            SessionKind::Stateless => self.shared.clone(),
            SessionKind::Cookies => build_client(&self.config, true)?,
        };
        Ok(ReqwestSession { client })
    }
}

fn build_client(config: &ClientConfig, cookies: bool) -> Result<reqwest::Client, CheckerError> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(
        REFERER,
        HeaderValue::from_str(&config.base_url)
            .map_err(|e| CheckerError::network(format!("invalid base URL: {}", e)))?,
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .cookie_store(cookies)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;

    Ok(client)
}

/// One reqwest-backed session
#[derive(Debug, Clone)]
pub struct ReqwestSession {
    client: reqwest::Client,
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn post_form(&self, url: &str, form: &FormFields) -> Result<PostReply, CheckerError> {
        let response = self.client.post(url).form(form).send().await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CheckerError::network(format!(
                "server returned {} for {}",
                status, url
            )));
        }

        let effective_url = response.url().to_string();
        let body = response.text().await?;
        debug!(%url, %effective_url, %status, bytes = body.len(), "form posted");

        Ok(PostReply {
            effective_url,
            body,
        })
    }
}

/// Client executing the three card service flows
#[derive(Debug, Clone)]
pub struct GiftCardClient<F = HttpSessionFactory> {
    factory: F,
    base_url: String,
}

impl GiftCardClient<HttpSessionFactory> {
    /// Create a client talking to the real service
    pub fn new(config: ClientConfig) -> Result<Self, CheckerError> {
        let base_url = config.base_url.clone();
        let factory = HttpSessionFactory::new(config)?;
        Ok(Self { factory, base_url })
    }
}

impl<F: SessionFactory> GiftCardClient<F> {
    /// Create a client over any session factory
    pub fn with_factory(factory: F, base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { factory, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Posts the card to a login endpoint on `session`. The login is accepted
    // only if the server redirected somewhere else.
    async fn login(
        &self,
        session: &F::Session,
        path: &str,
        card_form: &FormFields,
    ) -> Result<PostReply, CheckerError> {
        let url = self.url(path);
        let reply = session.post_form(&url, card_form).await?;

        if reply.effective_url == url {
            return Err(CheckerError::authentication_failure(
                "login was not redirected",
            ));
        }

        Ok(reply)
    }
}

#[async_trait]
impl<F: SessionFactory> CardService for GiftCardClient<F> {
    async fn send(&self, request: &ProtocolRequest) -> Result<String, CheckerError> {
        debug!(kind = request.kind(), "sending request");
        let card_form = request.card().form_fields();

        match request {
            ProtocolRequest::BalanceLookup { .. } => {
                let session = self.factory.open_session(SessionKind::Stateless)?;
                let reply = session.post_form(&self.url(BALANCE_PATH), &card_form).await?;
                Ok(reply.body)
            }
            ProtocolRequest::Registration { contact, .. } => {
                let session = self.factory.open_session(SessionKind::Cookies)?;
                self.login(&session, REGISTRATION_LOGIN_PATH, &card_form)
                    .await?;

                let reply = session
                    .post_form(
                        &self.url(REGISTRATION_COMPLETE_PATH),
                        &contact.form_fields(),
                    )
                    .await?;
                Ok(reply.body)
            }
            ProtocolRequest::SetPin { pin, .. } => {
                let session = self.factory.open_session(SessionKind::Cookies)?;
                let login = self.login(&session, SET_PIN_LOGIN_PATH, &card_form).await?;

                let card_id = extract_card_id(&login.body).ok_or_else(|| {
                    CheckerError::authentication_failure("card token missing from login page")
                })?;

                let reply = session
                    .post_form(&self.url(SET_PIN_PATH), &pin.form_fields(&card_id))
                    .await?;
                Ok(reply.body)
            }
        }
    }
}

fn card_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"<input id="CardID" name="CardID" type="hidden" value="(\d+)"\s*/?>"#)
                .ok()
        })
        .as_ref()
}

/// Find the hidden numeric `CardID` token on a login page
pub fn extract_card_id(html: &str) -> Option<String> {
    card_id_pattern()?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
