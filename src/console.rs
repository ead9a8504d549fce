//! Console shell: owns the session gate and mounts one screen at a time.

use crate::config::ConsoleConfig;
use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::error::{ConsoleResult, ERROR_METRICS};
use crate::notify::{Notice, Notifier};
use crate::resource::{Resource, ResourceController};
use crate::resources::{
    EventController, Events, OrderController, Orders, ProductController, Products,
    UserController, Users,
};
use crate::session::{
    Credentials, FileTokenStore, GateDecision, Screen, SessionContext, SessionGate, TokenStore,
};
use crate::transport::{ApiTransport, HttpTransport};
use std::sync::Arc;

/// A screen after the guard ran and its initial fetch completed.
#[derive(Debug)]
pub enum Mounted {
    Login,
    Dashboard(DashboardSnapshot),
    Products(ProductController),
    Users(UserController),
    Orders(OrderController),
    Events(EventController),
}

impl Mounted {
    pub fn screen(&self) -> Screen {
        match self {
            Mounted::Login => Screen::Login,
            Mounted::Dashboard(_) => Screen::Dashboard,
            Mounted::Products(_) => Screen::Products,
            Mounted::Users(_) => Screen::Users,
            Mounted::Orders(_) => Screen::Orders,
            Mounted::Events(_) => Screen::Events,
        }
    }
}

pub struct AdminConsole {
    gate: SessionGate,
    transport: Arc<dyn ApiTransport>,
    notifier: Arc<dyn Notifier>,
}

impl AdminConsole {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let gate = SessionGate::new(store, transport.clone(), notifier.clone());
        Self {
            gate,
            transport,
            notifier,
        }
    }

    /// HTTP transport and file-backed session, as configured.
    pub fn from_config(config: &ConsoleConfig, notifier: Arc<dyn Notifier>) -> ConsoleResult<Self> {
        let transport = HttpTransport::new(config.api_base_url.clone(), config.request_timeout())?;
        let store = FileTokenStore::new(config.session_file.clone());
        Ok(Self::new(Arc::new(transport), Arc::new(store), notifier))
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// Logs in and returns the screen to show next.
    pub async fn login(&self, credentials: &Credentials) -> ConsoleResult<Screen> {
        self.gate.login(credentials).await?;
        Ok(Screen::HOME)
    }

    /// Clears the session and returns the login screen.
    ///
    /// If the stored token cannot be removed the session is still live, so
    /// the failure is reported and returned instead of a screen.
    pub fn logout(&self) -> ConsoleResult<Screen> {
        if let Err(error) = self.gate.logout() {
            ERROR_METRICS.record(&error, "session.logout");
            tracing::warn!(%error, "failed to clear stored session");
            self.notifier
                .notify(Notice::error(error.notice_text("Failed to log out")));
            return Err(error);
        }
        Ok(Screen::Login)
    }

    /// Builds a controller for `R` bound to the current session, without fetching.
    pub fn controller<R: Resource>(&self) -> ConsoleResult<ResourceController<R>> {
        let session = self.gate.require()?;
        Ok(ResourceController::new(
            session,
            self.transport.clone(),
            self.notifier.clone(),
        ))
    }

    /// Applies the guard to `screen`, following at most one redirect, and
    /// runs the screen's initial fetch.
    pub async fn mount(&self, screen: Screen) -> Mounted {
        let target = match self.gate.guard(screen) {
            GateDecision::Proceed => screen,
            GateDecision::Redirect(to) => {
                tracing::debug!(from = %screen, %to, "redirecting");
                to
            }
        };

        if !target.is_protected() {
            return Mounted::Login;
        }
        let Some(session) = self.gate.context() else {
            return Mounted::Login;
        };

        match target {
            Screen::Login => Mounted::Login,
            Screen::Dashboard => {
                let dashboard =
                    Dashboard::new(session, self.transport.clone(), self.notifier.clone());
                Mounted::Dashboard(dashboard.load().await)
            }
            Screen::Products => Mounted::Products(self.mount_list::<Products>(session).await),
            Screen::Users => Mounted::Users(self.mount_list::<Users>(session).await),
            Screen::Orders => Mounted::Orders(self.mount_list::<Orders>(session).await),
            Screen::Events => Mounted::Events(self.mount_list::<Events>(session).await),
        }
    }

    async fn mount_list<R: Resource>(&self, session: SessionContext) -> ResourceController<R> {
        let controller = ResourceController::new(
            session,
            self.transport.clone(),
            self.notifier.clone(),
        );
        // A failed first fetch still mounts, with an empty list and a notice.
        let _ = controller.list().await;
        controller
    }
}
