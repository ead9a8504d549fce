//! Session gate: token persistence, login/logout and the screen guard.
//!
//! The token is the only piece of state shared by every screen. It is never
//! read from ambient globals; the gate hands out a [`SessionContext`] value
//! that controllers receive at construction.

use crate::error::{ConsoleError, ConsoleResult, ERROR_METRICS};
use crate::notify::{Notice, Notifier};
use crate::transport::{ApiRequest, ApiTransport, Endpoint};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::{Display, EnumString};

/// Days a freshly issued token stays valid in the store.
pub const SESSION_TTL_DAYS: i64 = 7;

pub const LOGIN_PATH: &str = "/admin/login";
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Please check your credentials.";
pub const LOGIN_SUCCESS_MESSAGE: &str = "Welcome to Admin Panel!";

// =============================================================================
// SCREENS AND GUARD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Screen {
    Login,
    Dashboard,
    Products,
    Users,
    Orders,
    Events,
}

impl Screen {
    /// Where an authenticated client lands by default.
    pub const HOME: Screen = Screen::Dashboard;

    pub fn is_protected(&self) -> bool {
        !matches!(self, Screen::Login)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Redirect(Screen),
}

// =============================================================================
// TOKEN STORAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    #[serde(rename = "adminToken")]
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn issue(token: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Durable home of the session token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> ConsoleResult<Option<StoredToken>>;
    fn save(&self, token: &StoredToken) -> ConsoleResult<()>;
    fn clear(&self) -> ConsoleResult<()>;

    /// The stored token if it has not expired. Expired records are dropped.
    fn active_token(&self) -> ConsoleResult<Option<String>> {
        match self.load()? {
            Some(stored) if stored.is_expired_at(Utc::now()) => {
                tracing::debug!(expired_at = %stored.expires_at, "dropping expired session token");
                self.clear()?;
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.token)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: StoredToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> ConsoleResult<Option<StoredToken>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &StoredToken) -> ConsoleResult<()> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> ConsoleResult<()> {
        self.slot.lock().take();
        Ok(())
    }
}

/// JSON file holding one token record.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> ConsoleResult<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &StoredToken) -> ConsoleResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(token)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner-only from the moment the file exists.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> ConsoleResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SESSION CONTEXT
// =============================================================================

/// Token of the authenticated admin, attached to every resource request.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    token: Arc<str>,
}

impl SessionContext {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn authorize(&self, request: ApiRequest) -> ApiRequest {
        request.with_token(self.token.as_ref())
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// SESSION GATE
// =============================================================================

pub struct SessionGate {
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn ApiTransport>,
    notifier: Arc<dyn Notifier>,
}

impl SessionGate {
    pub fn new(
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn ApiTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            transport,
            notifier,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.context().is_some()
    }

    pub fn context(&self) -> Option<SessionContext> {
        match self.store.active_token() {
            Ok(token) => token.map(SessionContext::new),
            Err(error) => {
                tracing::warn!(%error, "session store unreadable, treating as logged out");
                None
            }
        }
    }

    pub fn require(&self) -> ConsoleResult<SessionContext> {
        self.context().ok_or(ConsoleError::Unauthenticated)
    }

    /// Decides whether `screen` may be shown in the current session state.
    pub fn guard(&self, screen: Screen) -> GateDecision {
        match (screen.is_protected(), self.is_authenticated()) {
            (true, false) => GateDecision::Redirect(Screen::Login),
            (false, true) => GateDecision::Redirect(Screen::HOME),
            _ => GateDecision::Proceed,
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> ConsoleResult<SessionContext> {
        let result = self.try_login(credentials).await;
        match &result {
            Ok(_) => {
                tracing::info!(user = %credentials.user_name, "admin logged in");
                self.notifier.notify(Notice::success(LOGIN_SUCCESS_MESSAGE));
            }
            Err(error) => {
                ERROR_METRICS.record(error, "session.login");
                tracing::warn!(user = %credentials.user_name, %error, "login failed");
                self.notifier
                    .notify(Notice::error(error.notice_text(LOGIN_FALLBACK_MESSAGE)));
            }
        }
        result
    }

    async fn try_login(&self, credentials: &Credentials) -> ConsoleResult<SessionContext> {
        if credentials.user_name.trim().is_empty() || credentials.password.is_empty() {
            return Err(ConsoleError::validation("Please fill in all fields"));
        }

        let request = ApiRequest::new(Endpoint::post(LOGIN_PATH)).with_json(credentials)?;
        let mut envelope = self.transport.send(request).await?.ensure_success()?;
        let token: Option<String> = envelope.take_optional("token")?;
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConsoleError::application(LOGIN_FALLBACK_MESSAGE))?;

        self.store.save(&StoredToken::issue(token.clone(), Utc::now()))?;
        Ok(SessionContext::new(token))
    }

    /// Forgets the token. No request is sent to the server.
    pub fn logout(&self) -> ConsoleResult<()> {
        tracing::info!("admin logged out");
        self.store.clear()
    }
}
