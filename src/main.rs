use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use hotel::config::AppConfig;
use hotel::db;
use hotel::routes::build_router;
use hotel::services::i18n::Translator;
use hotel::services::payment::VnpayGateway;
use hotel::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;
    if let Some(token) = &config.admin_token {
        db::queries::ensure_admin(&conn, token)?;
        tracing::info!("bootstrap administrator ready");
    }

    let i18n = Translator::load(config.default_locale)?;
    tracing::info!(
        tmn_code = %config.vnpay.tmn_code,
        url = %config.vnpay.url,
        "using VNPay gateway"
    );
    let gateway = VnpayGateway::new(config.vnpay.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
        i18n,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
