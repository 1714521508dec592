//! Operator session gate and route guarding.

use thiserror::Error;

/// Identity reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Capability exposed by the external authentication provider.
pub trait AuthProvider {
    fn current_user(&self) -> Result<Option<Identity>, AuthError>;
    fn sign_out(&self) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication provider failed: {0}")]
    Provider(String),
    #[error("invalid transition from {from:?} on {event}")]
    InvalidTransition { from: SessionKind, event: &'static str },
}

/// Screens of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Setup,
    Select,
    Company(String),
    History,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Self::Dashboard),
            "/login" => Some(Self::Login),
            "/setup" => Some(Self::Setup),
            "/select" => Some(Self::Select),
            "/history" => Some(Self::History),
            other => other
                .strip_prefix("/company/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Self::Company(id.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Dashboard => "/".to_string(),
            Self::Setup => "/setup".to_string(),
            Self::Select => "/select".to_string(),
            Self::Company(id) => format!("/company/{id}"),
            Self::History => "/history".to_string(),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

/// Outcome of guarding a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session lookup still in flight; show a loading indicator.
    Wait,
    Render(Route),
    Redirect(Route),
}

impl RouteDecision {
    /// Path to navigate to when the decision is a redirect.
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Self::Redirect(route) => Some(route.path()),
            Self::Wait | Self::Render(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Checking,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Checking,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Checking => SessionKind::Checking,
            Self::Authenticated(_) => SessionKind::Authenticated,
            Self::Anonymous => SessionKind::Anonymous,
        }
    }
}

/// Session state machine: `Checking` until the provider answers, then
/// `Authenticated` or `Anonymous`.
#[derive(Debug, Clone)]
pub struct SessionGate {
    state: SessionState,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    pub fn new() -> Self {
        Self {
            state: SessionState::Checking,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Resolves the initial session lookup.
    ///
    /// A provider failure leaves the gate anonymous and is returned so the
    /// caller can log it.
    pub fn resolve(&mut self, provider: &dyn AuthProvider) -> Result<(), AuthError> {
        if self.state != SessionState::Checking {
            return Err(self.invalid("resolve"));
        }
        match provider.current_user() {
            Ok(Some(identity)) => {
                self.state = SessionState::Authenticated(identity);
                Ok(())
            }
            Ok(None) => {
                self.state = SessionState::Anonymous;
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Anonymous;
                Err(err)
            }
        }
    }

    /// Moves an anonymous session to authenticated after a successful login.
    pub fn login(&mut self, identity: Identity) -> Result<(), AuthError> {
        if self.state != SessionState::Anonymous {
            return Err(self.invalid("login"));
        }
        self.state = SessionState::Authenticated(identity);
        Ok(())
    }

    /// Signs out through the provider. The session stays authenticated when
    /// the provider fails.
    pub fn logout(&mut self, provider: &dyn AuthProvider) -> Result<(), AuthError> {
        if !self.is_authenticated() {
            return Err(self.invalid("logout"));
        }
        provider.sign_out()?;
        self.state = SessionState::Anonymous;
        Ok(())
    }

    pub fn guard(&self, route: Route) -> RouteDecision {
        match (&self.state, route) {
            (SessionState::Checking, _) => RouteDecision::Wait,
            (SessionState::Authenticated(_), Route::Login) => {
                RouteDecision::Redirect(Route::Dashboard)
            }
            (SessionState::Anonymous, route) if route.is_protected() => {
                RouteDecision::Redirect(Route::Login)
            }
            (_, route) => RouteDecision::Render(route),
        }
    }

    /// Guards a raw location. Unknown paths redirect to the dashboard once the
    /// session is resolved.
    pub fn guard_path(&self, path: &str) -> RouteDecision {
        match Route::parse(path) {
            Some(route) => self.guard(route),
            None if self.state == SessionState::Checking => RouteDecision::Wait,
            None => RouteDecision::Redirect(Route::Dashboard),
        }
    }

    fn invalid(&self, event: &'static str) -> AuthError {
        AuthError::InvalidTransition {
            from: self.state.kind(),
            event,
        }
    }
}
