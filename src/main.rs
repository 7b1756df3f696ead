//! Backend smoke probe: establishes a session and warms the master data
//! cache, reporting what it finds. Useful for checking a deployment without
//! opening the console.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smt_client::auth::Credentials;
use smt_client::config::Config;
use smt_client::http::format_error_message;
use smt_client::masterdata::{MasterDataError, ModuleKind};
use smt_client::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "smt-client starting");

    let config = Config::load()?;
    info!(api_base = %config.api_base, "Loaded configuration");

    let state = AppState::new(config)?;

    // Sign in when credentials are provided, otherwise probe for an
    // existing session.
    match (std::env::var("SMT_USERNAME"), std::env::var("SMT_PASSWORD")) {
        (Ok(username), Ok(password)) => {
            if let Err(error) = state.auth.login(&Credentials { password, username }).await {
                anyhow::bail!("Sign-in failed: {}", present_auth(&error));
            }
        }
        _ => state.auth.load_user().await,
    }

    let user = state.auth.snapshot().await;
    if !user.is_authenticated() {
        warn!("No active session; set SMT_USERNAME/SMT_PASSWORD to sign in");
        return Ok(());
    }
    info!(
        user = %user.name,
        admin = user.is_admin(),
        production = user.is_production(),
        "Session established"
    );

    if let Err(error) = state.master_data.load_all().await {
        anyhow::bail!("Master data load failed: {}", present_master_data(&error));
    }

    for module in ModuleKind::ALL {
        info!(
            module = module.key(),
            count = state.master_data.collection(module).await.len(),
            "Master data loaded"
        );
    }

    Ok(())
}

fn present_auth(error: &smt_client::auth::AuthError) -> String {
    match error {
        smt_client::auth::AuthError::Request(inner) => format_error_message(inner),
        other => other.to_string(),
    }
}

fn present_master_data(error: &MasterDataError) -> String {
    match error {
        MasterDataError::Request(inner) => format_error_message(inner),
        other => other.to_string(),
    }
}
