//! Exportação do resumo mensal em CSV.

use crate::models::MetricRow;
use crate::utils::AppResult;

/// Gera o CSV do resumo (uma linha por loja) na ordem recebida.
pub fn summary_csv(rows: &[MetricRow]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["Loja", "Recebidas", "Perdidas", "Volume", "PctPerda"])?;
    for row in rows {
        wtr.write_record([
            row.store.as_str(),
            &row.recebidas.to_string(),
            &row.perdidas.to_string(),
            &row.volume_total.to_string(),
            &format!("{:.2}", row.pct_perda),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| crate::utils::AppError::InternalError(e.to_string()))?;
    String::from_utf8(bytes)
        .map_err(|e| crate::utils::AppError::InternalError(format!("CSV inválido: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_csv() {
        let rows = vec![MetricRow {
            store: "Loja 01".into(),
            recebidas: 80,
            perdidas: 20,
            volume_total: 200,
            pct_perda: 10.0,
        }];
        let csv = summary_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "Loja,Recebidas,Perdidas,Volume,PctPerda");
        assert_eq!(lines.next().unwrap(), "Loja 01,80,20,200,10.00");
    }
}
