use std::sync::Arc;

use parcel_wizard::config::WizardConfig;
use parcel_wizard::quotes::HttpQuoteGateway;
use parcel_wizard::routes::{WizardRouteState, wizard_routes};
use parcel_wizard::verification::{CodeGateway, HttpCodeGateway, TestPhoneGateway};
use parcel_wizard::wizard::{spawn_expiry_task, WizardDeps, WizardRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::from_env();

    eprintln!("📦 Parcel Wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   Share links: {}", config.share_base_url);
    eprintln!("   API: http://0.0.0.0:{}/api/wizard/sessions", config.listen_port);

    // ── Gateways ──────────────────────────────────────────────────────────
    let http_gateway: Arc<dyn CodeGateway> =
        Arc::new(HttpCodeGateway::new(&config.api_base_url, config.http_timeout));
    let gateway: Arc<dyn CodeGateway> = if config.test_phones_enabled() {
        eprintln!("   Test phones: {}", config.test_phones.len());
        Arc::new(TestPhoneGateway::new(
            http_gateway,
            &config.test_phones,
            config.test_code.clone(),
        ))
    } else {
        http_gateway
    };
    let quotes = Arc::new(HttpQuoteGateway::new(
        &config.api_base_url,
        config.http_timeout,
    ));

    // ── Session registry ──────────────────────────────────────────────────
    let registry = WizardRegistry::with_ttl(config.session_ttl, config.finished_session_ttl);
    let _expiry_handle = spawn_expiry_task(Arc::clone(&registry));

    // ── HTTP surface ──────────────────────────────────────────────────────
    let deps = WizardDeps::new(gateway).with_default_channel(config.default_channel);
    let port = config.listen_port;
    let app = wizard_routes(WizardRouteState {
        registry,
        deps,
        quotes,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "Wizard server started");
    axum::serve(listener, app).await?;
    Ok(())
}
