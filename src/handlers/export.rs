use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use relatorio_telefonia::services::export::summary_csv;
use relatorio_telefonia::utils::logging::*;
use relatorio_telefonia::utils::normalization::sanitize_ym;
use relatorio_telefonia::utils::AppError;
use relatorio_telefonia::AppState;

/// GET /export/:ym.csv — resumo do mês em CSV.
///
/// Recusado (409) enquanto alguma loja ainda estiver sem volume informado,
/// para não exportar % de perda provisória.
pub async fn export_month(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    log_request_received("/export/:ym", "GET");

    let raw_ym = filename.strip_suffix(".csv").unwrap_or(&filename);
    let ym = sanitize_ym(raw_ym).ok_or_else(|| {
        AppError::ValidationError(format!("mês inválido (esperado AAAA-MM): {}", raw_ym))
    })?;

    let month_id = state
        .store
        .find_month(&ym)?
        .ok_or_else(|| AppError::NotFound(format!("mês não encontrado: {}", ym)))?;

    let pending = state.store.pending_volumes(month_id)?;
    if pending > 0 {
        return Err(AppError::Conflict(format!(
            "há {} loja(s) sem volume informado; preencha os volumes antes de exportar",
            pending
        )));
    }

    let metrics = state.store.metrics_for_month(month_id)?;
    let csv = summary_csv(&metrics)?;

    log_info(&format!("Export gerado: {} ({} lojas)", ym, metrics.len()));

    let disposition = format!("attachment; filename=\"relatorio_televendas_{}.csv\"", ym);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relatorio_telefonia::config::Settings;
    use relatorio_telefonia::models::StoreAggregate;
    use relatorio_telefonia::services::CallsSpool;
    use relatorio_telefonia::store::ReportStore;

    fn estado_com_mes(dir: &tempfile::TempDir) -> Arc<AppState> {
        let store = ReportStore::open_in_memory().unwrap();
        store
            .consolidate(
                "2025-09",
                "2025-09__chamadas.csv",
                &[StoreAggregate {
                    store: "Loja 01".to_string(),
                    recebidas: 100,
                    perdidas: 10,
                    pct_perda: 10.0,
                }],
            )
            .unwrap();
        Arc::new(AppState {
            settings: Settings {
                server: Default::default(),
                database: Default::default(),
                ingest: Default::default(),
            },
            store,
            spool: CallsSpool::open(dir.path()).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_export_recusado_com_volume_pendente() {
        let dir = tempfile::tempdir().unwrap();
        let state = estado_com_mes(&dir);

        let err = export_month(State(state), Path("2025-09.csv".to_string()))
            .await
            .unwrap_err();

        match err {
            AppError::Conflict(msg) => assert!(msg.contains("volume"), "{}", msg),
            other => panic!("esperava Conflict, veio {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_export_apos_volumes_aplicados() {
        let dir = tempfile::tempdir().unwrap();
        let state = estado_com_mes(&dir);

        let month_id = state.store.find_month("2025-09").unwrap().unwrap();
        assert_eq!(state.store.apply_volume(month_id, "Loja 01", 120).unwrap(), 1);

        let resp = export_month(State(state), Path("2025-09.csv".to_string()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("2025-09"));
    }
}
