/// Relatório de Telefonia
///
/// Serviço HTTP que consolida as planilhas mensais de chamadas por loja
/// (recebidas/perdidas) em métricas persistidas no SQLite e serve os
/// relatórios consolidados.
///
/// Fluxo:
/// - planilhas mensais chegam no diretório de spool ({AAAA-MM}__nome.csv)
/// - POST /months/:ym/consolidate processa a mais recente do mês
/// - PUT /months/:ym/volumes aplica o volume total por loja e recalcula %
/// - GET /reports/:ym serve o relatório consolidado

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use relatorio_telefonia::{config, services, store, utils, AppState};

mod handlers;

use config::Settings;
use handlers::{
    apply_volumes, consolidate_month, delete_month, export_month, health_check, list_months,
    month_report, ready_check, status_check, store_report,
};
use utils::{logging::*, AppError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Carregar variáveis de ambiente do arquivo .env (se existir)
    if dotenvy::dotenv().is_err() {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Inicializar tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relatorio_telefonia=info,tower_http=info".into()),
        )
        .init();

    // Carregar configurações
    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    // Abrir o banco (cria/valida o schema) e o spool de planilhas
    let report_store = store::ReportStore::open(
        Path::new(&settings.database.path),
        settings.database.busy_timeout_ms,
    )
    .map_err(|e| AppError::ConfigError(format!("Failed to open database: {}", e)))?;
    log_info(&format!("📦 SQLite pronto em {}", settings.database.path));

    let spool = services::CallsSpool::open(Path::new(&settings.ingest.calls_dir))?;
    log_info(&format!(
        "📁 Spool de planilhas em {}",
        settings.ingest.calls_dir
    ));

    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        store: report_store,
        spool,
    });

    let app = Router::new()
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/status", get(status_check))
        // Meses
        .route("/months", get(list_months))
        .route("/months/:ym", delete(delete_month))
        .route("/months/:ym/consolidate", post(consolidate_month))
        .route("/months/:ym/volumes", put(apply_volumes))
        // Relatórios
        .route("/reports/:ym", get(month_report))
        .route("/reports/:ym/stores/:store_slug", get(store_report))
        // Export
        .route("/export/:filename", get(export_month))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Iniciar servidor (PORT do ambiente tem precedência)
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let listener = TcpListener::bind(format!("{}:{}", settings.server.host, port)).await?;

    log_server_startup(port);
    log_server_ready(port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
