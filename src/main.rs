//! support-miniapp: панель менеджера поддержки VPN-сервиса.

mod api;
mod config;
mod console;
mod guard;
mod host;
mod panels;
mod shell;
mod store;

use anyhow::Context;
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("support-miniapp.toml"));
    tracing::info!(
        "Starting support-miniapp with config {}",
        config_path.display()
    );

    let config = config::Config::load(&config_path)?;
    let backend_url = config.backend_url()?;
    tracing::info!(
        backend_url = %backend_url,
        request_timeout_secs = config.request_timeout_secs,
        ticket_poll_secs = config.ticket_poll_secs,
        dev_fallback = config.dev_fallback,
        "Configuration loaded"
    );

    let host = host::detect(config.init_data.as_deref());
    let resolved = host::resolve(host.as_ref());
    tracing::info!(
        payload_present = resolved.payload_present(),
        manager = ?resolved.identity.as_ref().map(|identity| identity.id),
        "Host resolved"
    );

    let api = api::ApiClient::new(&backend_url, config.request_timeout(), &resolved.payload)
        .context("HTTP-клиент не создан")?;
    tracing::debug!(credential = api.has_credential(), "API client ready");
    let guard = guard::Guard {
        dev_fallback: config.dev_fallback,
    };
    let mut shell = shell::Shell::new(api, guard, resolved);

    if shell.start().await == shell::Phase::Denied {
        println!("{}", shell::DENIED_TEXT);
        return Ok(());
    }

    console::Console::new(shell, &config.manager_name)
        .run(config.ticket_poll_interval())
        .await
}
