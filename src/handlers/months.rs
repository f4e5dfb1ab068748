use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use relatorio_telefonia::services::{aggregate_by_store, load_calls};
use relatorio_telefonia::utils::logging::*;
use relatorio_telefonia::utils::normalization::sanitize_ym;
use relatorio_telefonia::utils::AppError;
use relatorio_telefonia::AppState;

fn require_ym(raw: &str) -> Result<String, AppError> {
    sanitize_ym(raw).ok_or_else(|| {
        log_validation_error("ym", raw);
        AppError::ValidationError(format!("mês inválido (esperado AAAA-MM): {}", raw))
    })
}

/// GET /months — meses consolidados, mais recentes primeiro.
pub async fn list_months(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    log_request_received("/months", "GET");

    let months = state.store.list_months()?;
    Ok(Json(json!({
        "count": months.len(),
        "months": months
    })))
}

/// POST /months/:ym/consolidate — processa a planilha mais recente do mês.
pub async fn consolidate_month(
    State(state): State<Arc<AppState>>,
    Path(ym): Path<String>,
) -> Result<Json<Value>, AppError> {
    let start_time = Instant::now();
    log_request_received("/months/:ym/consolidate", "POST");
    let ym = require_ym(&ym)?;

    let calls_file = state.spool.latest_file(&ym)?.ok_or_else(|| {
        AppError::NotFound(format!("nenhuma planilha de chamadas para {}", ym))
    })?;
    let filename = calls_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("planilha.csv")
        .to_string();

    let calls = load_calls(&calls_file, &state.settings.queue_filter()).map_err(|e| {
        log_ingest_error(&filename, &e.to_string());
        e
    })?;
    let aggregates = aggregate_by_store(&calls);

    state.store.consolidate(&ym, &filename, &aggregates)?;
    // uma linha de auditoria por categoria alimentada pela planilha
    for kind in ["recebidas", "perdidas"] {
        log_upload_recorded(&ym, kind, &filename);
    }

    let recebidas: i64 = aggregates.iter().map(|a| a.recebidas).sum();
    let perdidas: i64 = aggregates.iter().map(|a| a.perdidas).sum();
    log_month_consolidated(&ym, aggregates.len(), recebidas, perdidas);

    let processing_time = start_time.elapsed().as_millis() as u64;
    log_request_processed("/months/:ym/consolidate", 200, processing_time);

    Ok(Json(json!({
        "status": "success",
        "ym": ym,
        "arquivo": filename,
        "lojas": aggregates.len(),
        "recebidas": recebidas,
        "perdidas": perdidas
    })))
}

/// DELETE /months/:ym — remoção administrativa do mês (banco + planilhas).
pub async fn delete_month(
    State(state): State<Arc<AppState>>,
    Path(ym): Path<String>,
) -> Result<Json<Value>, AppError> {
    log_request_received("/months/:ym", "DELETE");
    let ym = require_ym(&ym)?;

    let existed = state.store.delete_month(&ym)?;
    if !existed {
        return Err(AppError::NotFound(format!("mês não encontrado: {}", ym)));
    }
    let files_removed = state.spool.remove_month(&ym)?;
    log_warning(&format!("Mês {} removido ({} arquivos)", ym, files_removed));

    Ok(Json(json!({
        "status": "success",
        "ym": ym,
        "arquivos_removidos": files_removed
    })))
}
