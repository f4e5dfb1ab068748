use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use relatorio_telefonia::utils::logging::*;
use relatorio_telefonia::utils::normalization::sanitize_ym;
use relatorio_telefonia::utils::AppError;
use relatorio_telefonia::AppState;

#[derive(Debug, Deserialize)]
pub struct VolumesBody {
    /// Volume total por loja, como digitado pelo admin.
    pub volumes: BTreeMap<String, i64>,
}

/// PUT /months/:ym/volumes — aplica volumes e recalcula % de perda.
///
/// O corpo precisa cobrir todas as lojas do mês com volume >= 1; qualquer
/// loja faltando ou com valor inválido rejeita a requisição inteira
/// listando as lojas problemáticas.
pub async fn apply_volumes(
    State(state): State<Arc<AppState>>,
    Path(ym): Path<String>,
    Json(body): Json<VolumesBody>,
) -> Result<Json<Value>, AppError> {
    log_request_received("/months/:ym/volumes", "PUT");
    let ym = sanitize_ym(&ym)
        .ok_or_else(|| AppError::ValidationError(format!("mês inválido (esperado AAAA-MM): {}", ym)))?;

    let month_id = state
        .store
        .find_month(&ym)?
        .ok_or_else(|| AppError::NotFound(format!("mês não encontrado: {}", ym)))?;

    if body.volumes.is_empty() {
        return Err(AppError::ValidationError(
            "nenhum volume informado".to_string(),
        ));
    }

    // Toda loja consolidada no mês precisa aparecer no corpo com volume >= 1.
    let metrics = state.store.metrics_for_month(month_id)?;
    let mut problematicas: Vec<&str> = metrics
        .iter()
        .filter(|m| !body.volumes.contains_key(&m.store))
        .map(|m| m.store.as_str())
        .collect();
    problematicas.extend(
        body.volumes
            .iter()
            .filter(|(_, vol)| **vol < 1)
            .map(|(loja, _)| loja.as_str()),
    );
    if !problematicas.is_empty() {
        let lojas = problematicas.join(", ");
        log_validation_error("volumes", &lojas);
        return Err(AppError::ValidationError(format!(
            "informe um volume válido (>= 1) para: {}",
            lojas
        )));
    }

    let mut updated = 0usize;
    let mut unknown = Vec::new();
    for (loja, vol) in &body.volumes {
        match state.store.apply_volume(month_id, loja, *vol)? {
            0 => unknown.push(loja.clone()),
            _ => updated += 1,
        }
    }

    log_volumes_applied(&ym, updated);

    Ok(Json(json!({
        "status": "success",
        "ym": ym,
        "atualizadas": updated,
        "desconhecidas": unknown,
        "pendentes": state.store.pending_volumes(month_id)?
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relatorio_telefonia::config::Settings;
    use relatorio_telefonia::models::StoreAggregate;
    use relatorio_telefonia::services::CallsSpool;
    use relatorio_telefonia::store::ReportStore;

    fn agg(store: &str, recebidas: i64, perdidas: i64) -> StoreAggregate {
        StoreAggregate {
            store: store.to_string(),
            recebidas,
            perdidas,
            pct_perda: if recebidas > 0 {
                perdidas as f64 / recebidas as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    fn estado_com_mes(dir: &tempfile::TempDir) -> Arc<AppState> {
        let store = ReportStore::open_in_memory().unwrap();
        store
            .consolidate(
                "2025-09",
                "2025-09__chamadas.csv",
                &[agg("Loja 01", 100, 10), agg("Loja 02", 50, 5)],
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

    fn corpo(pares: &[(&str, i64)]) -> VolumesBody {
        VolumesBody {
            volumes: pares
                .iter()
                .map(|(loja, vol)| (loja.to_string(), *vol))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_rejeita_loja_faltando_no_corpo() {
        let dir = tempfile::tempdir().unwrap();
        let state = estado_com_mes(&dir);

        let err = apply_volumes(
            State(state),
            Path("2025-09".to_string()),
            Json(corpo(&[("Loja 01", 120)])),
        )
        .await
        .unwrap_err();

        match err {
            AppError::ValidationError(msg) => assert!(msg.contains("Loja 02"), "{}", msg),
            other => panic!("esperava ValidationError, veio {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejeita_volume_menor_que_um() {
        let dir = tempfile::tempdir().unwrap();
        let state = estado_com_mes(&dir);

        let err = apply_volumes(
            State(state.clone()),
            Path("2025-09".to_string()),
            Json(corpo(&[("Loja 01", 0), ("Loja 02", 60)])),
        )
        .await
        .unwrap_err();

        match err {
            AppError::ValidationError(msg) => assert!(msg.contains("Loja 01"), "{}", msg),
            other => panic!("esperava ValidationError, veio {:?}", other),
        }

        // rejeição não aplica nada
        let month_id = state.store.find_month("2025-09").unwrap().unwrap();
        assert_eq!(state.store.pending_volumes(month_id).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_aplica_volumes_completos() {
        let dir = tempfile::tempdir().unwrap();
        let state = estado_com_mes(&dir);

        let resp = apply_volumes(
            State(state),
            Path("2025-09".to_string()),
            Json(corpo(&[("Loja 01", 120), ("Loja 02", 60)])),
        )
        .await
        .unwrap();

        assert_eq!(resp.0["atualizadas"], 2);
        assert_eq!(resp.0["pendentes"], 0);
    }
}
