use serde::{Deserialize, Serialize};

/// Agregado por loja produzido pela consolidação de um mês.
///
/// `pct_perda` aqui é provisório (calculado sobre `recebidas`); o valor
/// definitivo é recalculado quando o volume total da loja é informado.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoreAggregate {
    pub store: String,
    pub recebidas: i64,
    pub perdidas: i64,
    pub pct_perda: f64,
}

/// Linha da tabela `metrics` como persistida.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MetricRow {
    pub store: String,
    pub recebidas: i64,
    pub perdidas: i64,
    pub volume_total: i64,
    pub pct_perda: f64,
}

impl MetricRow {
    /// % de perdidas sobre o volume informado (0.0 sem volume).
    pub fn pct_perdidas(&self) -> f64 {
        if self.volume_total > 0 {
            self.perdidas as f64 / self.volume_total as f64 * 100.0
        } else {
            0.0
        }
    }

    /// % de atendidas sobre o volume informado (0.0 sem volume).
    pub fn pct_atendidas(&self) -> f64 {
        if self.volume_total > 0 {
            (self.volume_total - self.perdidas) as f64 / self.volume_total as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Linha do relatório público de um mês.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportRow {
    pub loja: String,
    pub recebidas: i64,
    pub perdidas: i64,
    pub volume: i64,
    pub pct_perdidas: f64,
    pub pct_atendidas: f64,
}

impl From<MetricRow> for ReportRow {
    fn from(m: MetricRow) -> Self {
        let pct_perdidas = m.pct_perdidas();
        let pct_atendidas = m.pct_atendidas();
        ReportRow {
            loja: m.store,
            recebidas: m.recebidas,
            perdidas: m.perdidas,
            volume: m.volume_total,
            pct_perdidas,
            pct_atendidas,
        }
    }
}

/// Resumo de um mês para o painel (contagens de uploads e lojas).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonthSummary {
    pub id: i64,
    pub ym: String,
    pub uploads: i64,
    pub lojas: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_sobre_volume() {
        let m = MetricRow {
            store: "Loja 01".into(),
            recebidas: 80,
            perdidas: 20,
            volume_total: 200,
            pct_perda: 10.0,
        };
        assert!((m.pct_perdidas() - 10.0).abs() < 1e-9);
        assert!((m.pct_atendidas() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_pct_sem_volume_é_zero() {
        let m = MetricRow {
            store: "Loja 01".into(),
            recebidas: 80,
            perdidas: 20,
            volume_total: 0,
            pct_perda: 25.0,
        };
        assert_eq!(m.pct_perdidas(), 0.0);
        assert_eq!(m.pct_atendidas(), 0.0);
    }
}
