//! Browser sessions
//!
//! Each browser gets a random session id in the `rowpilot_session` cookie. The
//! workbook steps (upload, mapping, row selection) keep their intermediate
//! results in a [`SessionData`] entry keyed by that id. Sessions live in memory
//! and expire after a period without requests.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use chrono::{DateTime, Utc};
use rowpilot_common::types::MappedDataset;
use tokio::sync::RwLock;
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "rowpilot_session";

/// Identifies one browser session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Read the session id from a request's `Cookie` headers
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
            .map(Self)
    }

    fn set_cookie_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.0
        ))
        .ok()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intermediate workbook state of one session
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Last successfully parsed upload
    pub upload_path: Option<PathBuf>,
    /// Mapped (and possibly filtered) records awaiting a job
    pub dataset: Option<MappedDataset>,
    /// Output field names of the last free-selection mapping
    pub selected_columns: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    data: SessionData,
    touched_at: DateTime<Utc>,
}

/// In-memory session storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Snapshot of a session; unknown sessions are empty
    pub async fn get(&self, id: SessionId) -> SessionData {
        self.entries
            .read()
            .await
            .get(&id)
            .map(|entry| entry.data.clone())
            .unwrap_or_default()
    }

    /// Modify a session in place, creating it if needed
    pub async fn update<F, R>(&self, id: SessionId, f: F) -> R
    where
        F: FnOnce(&mut SessionData) -> R,
    {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id).or_insert_with(|| Entry {
            data: SessionData::default(),
            touched_at: Utc::now(),
        });
        entry.touched_at = Utc::now();
        f(&mut entry.data)
    }

    /// Drop sessions idle for longer than the ttl, returning their data
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> Vec<SessionData> {
        let mut entries = self.entries.write().await;

        let idle: Vec<SessionId> = entries
            .iter()
            .filter(|(_, entry)| {
                (now - entry.touched_at)
                    .to_std()
                    .map_or(false, |age| age >= self.ttl)
            })
            .map(|(id, _)| *id)
            .collect();

        idle.iter()
            .filter_map(|id| entries.remove(id))
            .map(|entry| entry.data)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Attaches a [`SessionId`] extension to every request.
///
/// Requests without a valid session cookie get a fresh id, and the response
/// carries a `Set-Cookie` header for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLayer;

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware { inner }
    }
}

#[derive(Debug, Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let existing = SessionId::from_headers(request.headers());
            let session = existing.unwrap_or_default();
            request.extensions_mut().insert(session);

            let mut response = inner.call(request).await?;

            if existing.is_none() {
                match session.set_cookie_header() {
                    Some(cookie) => {
                        debug!(session = %session, "Started new session");
                        response.headers_mut().append(header::SET_COOKIE, cookie);
                    },
                    None => warn!(session = %session, "Could not encode session cookie"),
                }
            }

            Ok(response)
        })
    }
}
