//! Core traits for talking to the card service
//!
//! This module defines the seams between the retrieval logic and the network,
//! so the protocol flows and the orchestrator can be exercised against
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{CheckerError, FormFields, ProtocolRequest};

/// Anything that can execute a protocol request and hand back the raw page
///
/// Implementations must be thread-safe (`Send + Sync`) as one service is shared
/// by every retrieval task.
#[async_trait]
pub trait CardService: Send + Sync {
    /// Execute one request flow and return the final response body
    ///
    /// # Returns
    /// * `Ok(String)` - Raw HTML of the last page in the flow
    /// * `Err(CheckerError::Network)` - Transport failure
    /// * `Err(CheckerError::AuthenticationFailure)` - Login step rejected
    async fn send(&self, request: &ProtocolRequest) -> Result<String, CheckerError>;
}

#[async_trait]
impl<S: CardService + ?Sized> CardService for Arc<S> {
    async fn send(&self, request: &ProtocolRequest) -> Result<String, CheckerError> {
        (**self).send(request).await
    }
}

/// Response to a form POST, after following redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReply {
    /// URL of the page finally reached
    pub effective_url: String,

    /// Body of that page
    pub body: String,
}

/// One HTTP session: requests made through it share cookies
#[async_trait]
pub trait HttpSession: Send + Sync {
    /// POST an urlencoded form, following redirects
    async fn post_form(&self, url: &str, form: &FormFields) -> Result<PostReply, CheckerError>;
}

/// Whether a session must carry cookies between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Single-request flows; may reuse a shared connection pool
    Stateless,

    /// Multi-step flows; cookies persist across calls
    Cookies,
}

/// Opens HTTP sessions for the protocol client
pub trait SessionFactory: Send + Sync {
    type Session: HttpSession;

    fn open_session(&self, kind: SessionKind) -> Result<Self::Session, CheckerError>;
}
