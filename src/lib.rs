//! smt-client - client core of the SMT operations console
//!
//! This crate provides the session-aware plumbing every console view hangs
//! off of:
//! - Cookie-carrying HTTP transport with normalized error messages
//! - Current-user session with derived authorization predicates
//! - Navigation guard gating destinations on roles and permissions
//! - Master data cache with all-or-nothing reload-on-write consistency
//!
//! Views, rendering and the backend itself live elsewhere; everything here
//! talks to the backend only through [`http::RequestClient`].

pub mod auth;
pub mod config;
pub mod guard;
pub mod http;
pub mod masterdata;

use std::sync::Arc;

use auth::AuthSession;
use config::Config;
use guard::RouteGuard;
use http::{RequestClient, RequestError};
use masterdata::MasterDataCache;

/// Shared application state
///
/// Session and cache are process-wide singletons by convention: one
/// `AppState` is built at startup and handed to whoever needs it. All
/// mutation goes through the component operations, never through direct
/// field writes.
pub struct AppState {
    pub auth: Arc<AuthSession>,
    pub config: Config,
    pub guard: RouteGuard,
    pub master_data: Arc<MasterDataCache>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, RequestError> {
        let http = Arc::new(RequestClient::new(&config)?);
        let auth = Arc::new(AuthSession::new(Arc::clone(&http)));
        let guard = RouteGuard::new(Arc::clone(&auth));
        let master_data = Arc::new(MasterDataCache::new(http));

        Ok(Self {
            auth,
            config,
            guard,
            master_data,
        })
    }
}
