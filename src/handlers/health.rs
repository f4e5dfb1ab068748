use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use relatorio_telefonia::utils::logging::*;
use relatorio_telefonia::AppState;

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "relatorio-telefonia",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn ready_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    log_health_check();

    // Testa o acesso ao SQLite
    let database_status = match state.store.ping() {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let overall_ready = database_status == "connected";

    let response = json!({
        "ready": overall_ready,
        "service": "relatorio-telefonia",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "dependencies": {
            "database": {
                "status": database_status,
                "path": state.settings.database.path
            }
        }
    });

    if overall_ready {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

pub async fn status_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    let months = state.store.list_months().unwrap_or_default();

    Json(json!({
        "service": "relatorio-telefonia",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()),
        "months_consolidated": months.len(),
        "config": {
            "database_path": state.settings.database.path,
            "calls_dir": state.settings.ingest.calls_dir,
            "queue_target": state.settings.ingest.queue_target
        }
    }))
}
