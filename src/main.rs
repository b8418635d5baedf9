use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use storefront_payments as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Store: a database connection, or the in-process store for local runs
    let stores = if cfg.uses_memory_store() {
        info!("Using the in-process store; data is lost on restart");
        api::repositories::Stores::in_memory()
    } else {
        let db_pool = api::db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?;
        if cfg.auto_migrate {
            api::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        api::db::check_connection(&db_pool).await?;
        api::repositories::Stores::sea_orm(Arc::new(db_pool))
    };

    let registry = Arc::new(
        api::providers::ProviderRegistry::from_config(&cfg.payments)
            .context("invalid payment provider configuration")?,
    );
    if registry.active_kind() == api::providers::ProviderKind::Paytr {
        if let Err(e) = registry.paytr().ensure_configured() {
            error!("{}; PayTR payments will be refused", e);
        }
    }
    let notifier = api::services::notifications::notifier_from_config(&cfg.notifications)?;

    let services = api::handlers::AppServices::new(&cfg, stores, registry, notifier);
    let app_state = api::AppState {
        config: Arc::new(cfg.clone()),
        services,
    };
    let app = api::build_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("storefront-payments listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
