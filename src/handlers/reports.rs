use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use relatorio_telefonia::models::ReportRow;
use relatorio_telefonia::services::{
    load_calls, lost_count, sort_report, store_badges, store_detail, DetailFilter, ReportOrder,
};
use relatorio_telefonia::utils::logging::*;
use relatorio_telefonia::utils::normalization::{deslug, sanitize_ym, store_sort_key};
use relatorio_telefonia::utils::AppError;
use relatorio_telefonia::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ReportQuery {
    pub order: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DetailQuery {
    pub f: Option<String>,
}

fn require_ym(raw: &str) -> Result<String, AppError> {
    sanitize_ym(raw).ok_or_else(|| {
        log_validation_error("ym", raw);
        AppError::ValidationError(format!("mês inválido (esperado AAAA-MM): {}", raw))
    })
}

/// GET /reports/:ym?order=... — relatório consolidado de um mês.
pub async fn month_report(
    State(state): State<Arc<AppState>>,
    Path(ym): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, AppError> {
    log_request_received("/reports/:ym", "GET");
    let ym = require_ym(&ym)?;
    let order = ReportOrder::parse(query.order.as_deref().unwrap_or("loja"));

    let month_id = state
        .store
        .find_month(&ym)?
        .ok_or_else(|| AppError::NotFound(format!("sem dados consolidados para {}", ym)))?;

    let metrics = state.store.metrics_for_month(month_id)?;
    let mut rows: Vec<ReportRow> = metrics.into_iter().map(ReportRow::from).collect();
    sort_report(&mut rows, order);

    Ok(Json(json!({
        "ym": ym,
        "order": order,
        "count": rows.len(),
        "rows": rows
    })))
}

/// GET /reports/:ym/stores/:store_slug?f=... — detalhe de chamadas da loja.
pub async fn store_report(
    State(state): State<Arc<AppState>>,
    Path((ym, store_slug)): Path<(String, String)>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<Value>, AppError> {
    log_request_received("/reports/:ym/stores/:store", "GET");
    let ym = require_ym(&ym)?;

    let calls_file = state.spool.latest_file(&ym)?.ok_or_else(|| {
        AppError::NotFound(format!("arquivo de chamadas não encontrado para {}", ym))
    })?;
    let calls = load_calls(&calls_file, &state.settings.queue_filter())?;

    let mut stores: Vec<String> = calls.iter().map(|c| c.store.clone()).collect();
    stores.sort_by_key(|s| store_sort_key(s));
    stores.dedup();

    let store = deslug(&store_slug, &stores)
        .ok_or_else(|| AppError::NotFound(format!("loja não encontrada em {}: {}", ym, store_slug)))?
        .clone();

    let badges = store_badges(&calls, &store);
    let perdidas = lost_count(&calls, &store);

    // volume informado pelo admin, para o % real
    let volume_total = match state.store.find_month(&ym)? {
        Some(month_id) => state
            .store
            .metric_for_store(month_id, &store)?
            .map(|m| m.volume_total)
            .unwrap_or(0),
        None => 0,
    };
    let pct_perda_real = if volume_total > 0 {
        perdidas as f64 / volume_total as f64 * 100.0
    } else {
        0.0
    };

    let filter = DetailFilter::parse(query.f.as_deref().unwrap_or(""));
    let rows = store_detail(&calls, &store, filter);

    Ok(Json(json!({
        "ym": ym,
        "store": store,
        "filter": query.f.unwrap_or_default(),
        "badges": badges,
        "volume_total": volume_total,
        "perdidas": perdidas,
        "pct_perda_real": pct_perda_real,
        "count": rows.len(),
        "rows": rows
    })))
}
