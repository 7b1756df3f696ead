//! Navigation gating.
//!
//! Every navigation attempt is evaluated against the session before the
//! view layer commits to a destination. The guard never renders anything;
//! it only answers allow / redirect / block.

use std::sync::Arc;

use crate::auth::{AuthSession, Identity};

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

/// Static access metadata for a navigable destination.
///
/// When both gates are present both must pass. `is_admin` bypasses either.
#[derive(Debug, Clone, Copy)]
pub struct RouteDescriptor {
    pub name: &'static str,
    pub path: &'static str,
    pub required_permission: Option<&'static str>,
    pub required_role: Option<&'static str>,
}

const ROUTES: &[RouteDescriptor] = &[
    RouteDescriptor {
        name: "Login",
        path: LOGIN_PATH,
        required_permission: None,
        required_role: None,
    },
    RouteDescriptor {
        name: "Workbench",
        path: "/workbench",
        required_permission: Some("repair:read"),
        required_role: None,
    },
    RouteDescriptor {
        name: "Analytics",
        path: "/analytics",
        required_permission: Some("repair:read"),
        required_role: None,
    },
    RouteDescriptor {
        name: "SpareParts",
        path: "/spare-parts",
        required_permission: Some("repair:read"),
        required_role: None,
    },
    RouteDescriptor {
        name: "RepairAttendance",
        path: "/repair-attendance",
        required_permission: Some("repair:read"),
        required_role: None,
    },
    RouteDescriptor {
        name: "AiModule",
        path: "/ai-module",
        required_permission: Some("repair:read"),
        required_role: None,
    },
    RouteDescriptor {
        name: "Report",
        path: "/report",
        required_permission: None,
        required_role: Some("PRODUCTION"),
    },
    RouteDescriptor {
        name: "SystemFields",
        path: "/sys",
        required_permission: None,
        required_role: Some("ADMIN"),
    },
    RouteDescriptor {
        name: "UserAdmin",
        path: "/users",
        required_permission: None,
        required_role: Some("ADMIN"),
    },
];

pub fn resolve_route(path: &str) -> Option<&'static RouteDescriptor> {
    ROUTES.iter().find(|route| route.path == path)
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDecision {
    Allow,
    /// Stay on the current location.
    Block,
    Redirect(&'static str),
}

/// Intercepts navigation attempts and gates them on session state.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    auth: Arc<AuthSession>,
}

impl RouteGuard {
    pub fn new(auth: Arc<AuthSession>) -> Self {
        Self { auth }
    }

    /// Decide a navigation attempt to `to`. First matching rule wins.
    pub async fn before_navigate(&self, to: &str) -> NavDecision {
        if !self.auth.ready().await {
            self.auth.load_user().await;
        }
        let user = self.auth.snapshot().await;

        if to == LOGIN_PATH {
            return if user.is_authenticated() {
                NavDecision::Redirect(ROOT_PATH)
            } else {
                NavDecision::Allow
            };
        }

        if !user.is_authenticated() {
            return NavDecision::Redirect(LOGIN_PATH);
        }

        match resolve_route(to) {
            Some(route) => {
                if let Some(role) = route.required_role {
                    if !user.has_role(role) && !user.is_admin() {
                        tracing::debug!(to, role, "Navigation blocked: missing role");
                        return NavDecision::Block;
                    }
                }
                if let Some(permission) = route.required_permission {
                    if !user.has_permission(permission) && !user.is_admin() {
                        tracing::debug!(to, permission, "Navigation blocked: missing permission");
                        return NavDecision::Block;
                    }
                }
            }
            None if to != ROOT_PATH => {
                // Catch-all: unknown destinations route back to root.
                return NavDecision::Redirect(ROOT_PATH);
            }
            None => {}
        }

        if to == ROOT_PATH {
            return NavDecision::Redirect(default_landing(&user));
        }

        NavDecision::Allow
    }
}

/// Role-based default landing page for the root destination.
fn default_landing(user: &Identity) -> &'static str {
    if user.is_admin() {
        "/users"
    } else if user.is_production() {
        "/report"
    } else {
        "/workbench"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str], permissions: &[&str]) -> Identity {
        Identity {
            id: Some(7),
            name: "tester".to_string(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_route_table_lookup() {
        assert_eq!(resolve_route("/report").unwrap().name, "Report");
        assert_eq!(
            resolve_route("/users").unwrap().required_role,
            Some("ADMIN")
        );
        assert!(resolve_route("/nonexistent").is_none());
    }

    #[test]
    fn test_default_landing_priority() {
        // Admin wins even when also production.
        let u = user(&["ADMIN", "PRODUCTION"], &[]);
        assert_eq!(default_landing(&u), "/users");

        let u = user(&["PRODUCTION"], &[]);
        assert_eq!(default_landing(&u), "/report");

        // Permission alone also selects the report landing.
        let u = user(&[], &["report:read"]);
        assert_eq!(default_landing(&u), "/report");

        let u = user(&[], &["repair:read"]);
        assert_eq!(default_landing(&u), "/workbench");
    }
}
