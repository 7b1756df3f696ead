//! Current-user session state and derived authorization predicates.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::http::{RequestClient, RequestError, RequestOptions, ResponseBody};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("登录验证失败")]
    LoginFailed,
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// The signed-in user as reported by `/auth/me`.
///
/// `id == None` is the one and only "nobody is signed in" sentinel; no other
/// field participates in that decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Option<i64>,
    pub name: String,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Role and permission are independent signals; either one suffices.
    pub fn is_admin(&self) -> bool {
        self.has_role("ADMIN") || self.has_permission("sys:write")
    }

    pub fn is_production(&self) -> bool {
        self.has_role("PRODUCTION") || self.has_permission("report:read")
    }
}

#[derive(Debug, Serialize)]
pub struct Credentials {
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Default)]
struct SessionInner {
    /// Bumped on every identity reset. An in-flight `load_user` that started
    /// under an older epoch discards its result instead of resurrecting a
    /// session that was logged out while it was on the wire.
    epoch: u64,
    ready: bool,
    user: Identity,
}

/// Owns the current [`Identity`] and its login/logout/bootstrap lifecycle.
///
/// All mutation goes through these operations; callers observe the session
/// only via [`snapshot`](AuthSession::snapshot) and
/// [`ready`](AuthSession::ready).
#[derive(Debug)]
pub struct AuthSession {
    http: Arc<RequestClient>,
    inner: RwLock<SessionInner>,
}

impl AuthSession {
    pub fn new(http: Arc<RequestClient>) -> Self {
        Self {
            http,
            inner: RwLock::new(SessionInner::default()),
        }
    }

    /// Clone of the current identity.
    pub async fn snapshot(&self) -> Identity {
        self.inner.read().await.user.clone()
    }

    /// Whether the initial identity bootstrap has completed at least once.
    pub async fn ready(&self) -> bool {
        self.inner.read().await.ready
    }

    /// Refresh the identity from the server's view of the session.
    ///
    /// Never fails: a 401, a malformed body or a transport error all reset
    /// the identity to the unauthenticated sentinel. `ready` becomes true in
    /// every case, in the same critical section as the identity write, so no
    /// reader can observe `ready` alongside a half-updated identity.
    pub async fn load_user(&self) {
        let epoch = self.inner.read().await.epoch;
        let fetched = self.fetch_me().await;

        let mut inner = self.inner.write().await;
        if inner.epoch == epoch {
            match fetched {
                Some(user) => {
                    tracing::debug!(user = %user.name, "Loaded identity");
                    inner.user = user;
                }
                None => inner.user = Identity::default(),
            }
        } else {
            tracing::debug!("Discarding stale identity fetch");
        }
        inner.ready = true;
    }

    async fn fetch_me(&self) -> Option<Identity> {
        let options = RequestOptions {
            allow_unauthorized: true,
            ..Default::default()
        };
        let body = match self.http.request(Method::GET, "/auth/me", options).await {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!(%error, "Identity probe failed");
                return None;
            }
        };

        let value = match body {
            Some(ResponseBody::Json(value)) => value,
            _ => return None,
        };
        let me: MeResponse = serde_json::from_value(value).ok()?;
        if me.username.is_empty() {
            return None;
        }

        Some(Identity {
            id: me.id,
            name: me.username,
            permissions: me.permissions,
            roles: me.roles,
        })
    }

    /// Sign in and refresh the identity.
    ///
    /// Success is defined by the follow-up identity fetch reporting an
    /// authenticated user, not by the sign-in call's own status.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        self.http
            .post("/auth/sign-in", serde_json::to_value(credentials).map_err(RequestError::from)?)
            .await?;
        self.load_user().await;

        if !self.snapshot().await.is_authenticated() {
            return Err(AuthError::LoginFailed);
        }
        tracing::info!("Signed in");
        Ok(())
    }

    /// Sign out. The local identity is reset whether or not the sign-out
    /// call succeeded; its error, if any, is then propagated.
    pub async fn logout(&self) -> Result<(), RequestError> {
        let result = self.http.post("/auth/sign-out", serde_json::json!({})).await;
        self.reset_user().await;
        tracing::info!("Signed out");
        result.map(|_| ())
    }

    /// Change the signed-in user's password.
    pub async fn update_password(
        &self,
        body: serde_json::Value,
    ) -> Result<(), RequestError> {
        self.http.put("/auth/me/password", body).await.map(|_| ())
    }

    async fn reset_user(&self) {
        let mut inner = self.inner.write().await;
        inner.epoch += 1;
        inner.user = Identity::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(roles: &[&str], permissions: &[&str]) -> Identity {
        Identity {
            id: Some(1),
            name: "tester".to_string(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_unauthenticated_sentinel() {
        let user = Identity::default();
        assert!(!user.is_authenticated());

        // Only the id decides; a name alone does not authenticate.
        let user = Identity {
            name: "ghost".to_string(),
            ..Identity::default()
        };
        assert!(!user.is_authenticated());

        let user = identity(&[], &[]);
        assert!(user.is_authenticated());
    }

    #[test]
    fn test_is_admin_or_law() {
        assert!(identity(&["ADMIN"], &[]).is_admin());
        assert!(identity(&[], &["sys:write"]).is_admin());
        assert!(identity(&["ADMIN"], &["sys:write"]).is_admin());
        assert!(!identity(&["PRODUCTION"], &["report:read"]).is_admin());
    }

    #[test]
    fn test_is_production_or_law() {
        assert!(identity(&["PRODUCTION"], &[]).is_production());
        assert!(identity(&[], &["report:read"]).is_production());
        assert!(!identity(&["ADMIN"], &["sys:write"]).is_production());
    }

    #[test]
    fn test_role_and_permission_membership() {
        let user = identity(&["ADMIN", "PRODUCTION"], &["repair:read"]);
        assert!(user.has_role("PRODUCTION"));
        assert!(!user.has_role("production"));
        assert!(user.has_permission("repair:read"));
        assert!(!user.has_permission("repair:write"));
    }
}
