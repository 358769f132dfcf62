//! Subcommand implementations.

pub mod health;
pub mod job;
pub mod live;
pub mod results;
pub mod submit;

use laneguard_client::api::ApiClient;
use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;

/// Shared handles for one console invocation.
pub struct Context {
    pub config: ConsoleConfig,
    pub api: ApiClient,
}

impl Context {
    pub fn new(config: ConsoleConfig) -> anyhow::Result<Self> {
        let api = ApiClient::with_timeout(config.api_url.clone(), config.request_timeout)?;
        Ok(Self { config, api })
    }
}

/// A token cancelled on Ctrl-C.
pub fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            on_signal.cancel();
        }
    });
    cancel
}
