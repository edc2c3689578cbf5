//! Role-based access guard for protected path prefixes.
//!
//! Every request under a configured prefix is resolved to an identity and a
//! role before it reaches a handler. Anything that goes wrong ends in a
//! redirect; the guard never lets a request through on error.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{GuardError, resolve_identity, resolve_role},
    config::{AppConfig, RedirectTargets},
    models::{Role, UnknownRole},
    repository::Repository,
};

/// Raised when a route policy string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyParseError {
    #[error("malformed rule {0:?}, expected `prefix=role`")]
    MalformedRule(String),
    #[error("prefix {0:?} must start with '/'")]
    RelativePrefix(String),
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// RoutePolicy
///
/// Ordered (path prefix -> required role) rules. Rules are checked in the
/// order they were configured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutePolicy {
    rules: Vec<(String, Role)>,
}

/// Outcome of checking a path against the policy for a given role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny,
}

impl RoutePolicy {
    pub fn new(rules: Vec<(String, Role)>) -> Self {
        Self { rules }
    }

    /// parse
    ///
    /// Parses `"/professional=professional,/customer=customer"`. Whitespace around
    /// rules is ignored and empty segments are skipped.
    pub fn parse(input: &str) -> Result<Self, PolicyParseError> {
        let mut rules = Vec::new();
        for rule in input.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (prefix, role) = rule
                .split_once('=')
                .ok_or_else(|| PolicyParseError::MalformedRule(rule.to_string()))?;
            let prefix = prefix.trim();
            if !prefix.starts_with('/') {
                return Err(PolicyParseError::RelativePrefix(prefix.to_string()));
            }
            rules.push((prefix.to_string(), role.parse::<Role>()?));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[(String, Role)] {
        &self.rules
    }

    /// covers
    ///
    /// True when at least one rule's prefix matches the path. Paths outside
    /// every prefix never reach identity resolution.
    pub fn covers(&self, path: &str) -> bool {
        self.rules.iter().any(|(prefix, _)| path.starts_with(prefix.as_str()))
    }

    /// evaluate
    ///
    /// The first rule whose prefix matches and whose role differs from `role`
    /// denies the request. No matching prefix means allow.
    pub fn evaluate(&self, path: &str, role: Role) -> PolicyDecision {
        let denied = self
            .rules
            .iter()
            .any(|(prefix, required)| path.starts_with(prefix.as_str()) && *required != role);

        if denied {
            PolicyDecision::Deny
        } else {
            PolicyDecision::Allow
        }
    }
}

/// AccessDecision
///
/// The guard's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Continue,
    Redirect(String),
}

/// check_access
///
/// Runs the full guard for a request path and headers:
/// - no valid session -> login destination
/// - no usable role -> unauthorized destination
/// - role does not satisfy a matching prefix -> unauthorized destination
/// - unexpected failure -> generic error destination
pub async fn check_access(
    path: &str,
    headers: &HeaderMap,
    config: &AppConfig,
    repo: &dyn Repository,
) -> AccessDecision {
    let policy = &config.route_policy;
    if !policy.covers(path) {
        return AccessDecision::Continue;
    }

    let result = async {
        let identity = resolve_identity(headers, config, repo).await?;
        let role = resolve_role(repo, identity).await?;
        Ok::<_, GuardError>((identity, role))
    }
    .await;

    let targets: &RedirectTargets = &config.redirects;
    match result {
        Ok((identity, role)) => match policy.evaluate(path, role) {
            PolicyDecision::Allow => AccessDecision::Continue,
            PolicyDecision::Deny => {
                tracing::debug!(user_id = %identity.id, %role, path, "role does not match route policy");
                AccessDecision::Redirect(targets.unauthorized.clone())
            }
        },
        Err(GuardError::Unauthenticated) => {
            tracing::debug!(path, "no session for protected path");
            AccessDecision::Redirect(targets.login.clone())
        }
        Err(GuardError::NoRoleAssigned) => {
            tracing::debug!(path, "no role assigned for protected path");
            AccessDecision::Redirect(targets.unauthorized.clone())
        }
        Err(GuardError::Unexpected(msg)) => {
            // The detail stays in the logs; the redirect target is fixed.
            tracing::error!(error = %msg, path, "access guard failed");
            AccessDecision::Redirect(targets.error.clone())
        }
    }
}

/// access_guard
///
/// Middleware form of [`check_access`]. Allowed requests are forwarded untouched;
/// refused ones get a 307 redirect.
pub async fn access_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = check_access(
        request.uri().path(),
        request.headers(),
        &state.config,
        state.repo.as_ref(),
    )
    .await;

    match decision {
        AccessDecision::Continue => next.run(request).await,
        AccessDecision::Redirect(target) => Redirect::temporary(&target).into_response(),
    }
}
