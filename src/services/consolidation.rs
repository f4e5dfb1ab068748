//! Consolidação mensal: agregados por loja, ordenação de relatórios e
//! detalhamento de chamadas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CallRecord, ReportRow, StoreAggregate};
use crate::utils::normalization::store_sort_key;

/// Rótulos canônicos usados nos filtros do detalhe por loja.
pub const STATUS_HANDLED: &str = "atendida";
pub const STATUS_EVICTED: &str = "Televendas não atendeu";
pub const STATUS_ABANDONED: &str = "Cliente desistiu";

/// Agrega as chamadas por loja: `recebidas` = total de registros,
/// `perdidas` = registros marcados como perdidos. `pct_perda` é provisório
/// (sobre `recebidas`); o definitivo vem com o volume total.
pub fn aggregate_by_store(calls: &[CallRecord]) -> Vec<StoreAggregate> {
    let mut counts: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for call in calls {
        let entry = counts.entry(call.store.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if call.is_lost {
            entry.1 += 1;
        }
    }

    let mut out: Vec<StoreAggregate> = counts
        .into_iter()
        .map(|(store, (recebidas, perdidas))| StoreAggregate {
            store: store.to_string(),
            recebidas,
            perdidas,
            pct_perda: if recebidas > 0 {
                perdidas as f64 / recebidas as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    out.sort_by_key(|a| store_sort_key(&a.store));
    out
}

/// Ordenações aceitas pelo relatório público.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportOrder {
    #[default]
    Loja,
    LojaDesc,
    PctPerdidasDesc,
    PctPerdidasAsc,
    PctAtendidasDesc,
    PctAtendidasAsc,
    VolumeDesc,
    VolumeAsc,
}

impl ReportOrder {
    /// Resolve o parâmetro `order` da querystring, com aliases legados
    /// (`pct_desc`, `pct_perda_asc`, ...).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "loja_desc" => ReportOrder::LojaDesc,
            "pct_perdidas_desc" | "pct_desc" | "pct_perda_desc" => ReportOrder::PctPerdidasDesc,
            "pct_perdidas_asc" | "pct_asc" | "pct_perda_asc" => ReportOrder::PctPerdidasAsc,
            "pct_atendidas_desc" => ReportOrder::PctAtendidasDesc,
            "pct_atendidas_asc" => ReportOrder::PctAtendidasAsc,
            "volume_desc" => ReportOrder::VolumeDesc,
            "volume_asc" => ReportOrder::VolumeAsc,
            _ => ReportOrder::Loja,
        }
    }
}

/// Ordena as linhas do relatório. Empates caem sempre na ordem de loja.
pub fn sort_report(rows: &mut [ReportRow], order: ReportOrder) {
    match order {
        ReportOrder::Loja => rows.sort_by_key(|r| store_sort_key(&r.loja)),
        ReportOrder::LojaDesc => {
            rows.sort_by_key(|r| store_sort_key(&r.loja));
            rows.reverse();
        }
        ReportOrder::PctPerdidasDesc => rows.sort_by(|a, b| {
            b.pct_perdidas
                .total_cmp(&a.pct_perdidas)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
        ReportOrder::PctPerdidasAsc => rows.sort_by(|a, b| {
            a.pct_perdidas
                .total_cmp(&b.pct_perdidas)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
        ReportOrder::PctAtendidasDesc => rows.sort_by(|a, b| {
            b.pct_atendidas
                .total_cmp(&a.pct_atendidas)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
        ReportOrder::PctAtendidasAsc => rows.sort_by(|a, b| {
            a.pct_atendidas
                .total_cmp(&b.pct_atendidas)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
        ReportOrder::VolumeDesc => rows.sort_by(|a, b| {
            b.volume
                .cmp(&a.volume)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
        ReportOrder::VolumeAsc => rows.sort_by(|a, b| {
            a.volume
                .cmp(&b.volume)
                .then_with(|| store_sort_key(&a.loja).cmp(&store_sort_key(&b.loja)))
        }),
    }
}

/// Filtro de status do detalhe por loja (parâmetro `f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailFilter {
    #[default]
    Todas,
    Atendida,
    Expulsa,
    Desistiu,
    Outros,
}

impl DetailFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "atendida" => DetailFilter::Atendida,
            "expulsa" => DetailFilter::Expulsa,
            "desistiu" => DetailFilter::Desistiu,
            "outros" => DetailFilter::Outros,
            _ => DetailFilter::Todas,
        }
    }

    fn keeps(self, status: &str) -> bool {
        match self {
            DetailFilter::Todas => true,
            DetailFilter::Atendida => status == STATUS_HANDLED,
            DetailFilter::Expulsa => status == STATUS_EVICTED,
            DetailFilter::Desistiu => status == STATUS_ABANDONED,
            DetailFilter::Outros => {
                status != STATUS_HANDLED && status != STATUS_EVICTED && status != STATUS_ABANDONED
            }
        }
    }
}

/// Linha do detalhe por loja.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub data: String,
    pub hora: String,
    pub status: String,
}

/// Contadores por categoria para os badges do detalhe.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StatusBadges {
    pub atendida: i64,
    pub expulsa: i64,
    pub desistiu: i64,
    pub outros: i64,
}

/// Detalhe das chamadas de uma loja, ordenado por data/hora
/// (registros sem timestamp vão pro final).
pub fn store_detail(calls: &[CallRecord], store: &str, filter: DetailFilter) -> Vec<DetailRow> {
    let mut rows: Vec<DetailRow> = calls
        .iter()
        .filter(|c| c.store == store && filter.keeps(&c.status))
        .map(|c| DetailRow {
            data: c.dt.clone(),
            hora: c.hr.clone(),
            status: c.status.clone(),
        })
        .collect();
    rows.sort_by(|a, b| {
        let ka = (a.data == "-", a.data.clone(), a.hora.clone());
        let kb = (b.data == "-", b.data.clone(), b.hora.clone());
        ka.cmp(&kb)
    });
    rows
}

/// Badges de uma loja (contagem por categoria, sem filtro aplicado).
pub fn store_badges(calls: &[CallRecord], store: &str) -> StatusBadges {
    let mut badges = StatusBadges::default();
    for call in calls.iter().filter(|c| c.store == store) {
        match call.status.as_str() {
            STATUS_HANDLED => badges.atendida += 1,
            STATUS_EVICTED => badges.expulsa += 1,
            STATUS_ABANDONED => badges.desistiu += 1,
            _ => badges.outros += 1,
        }
    }
    badges
}

/// Perdidas de uma loja (contagem sobre os registros, para o % real).
pub fn lost_count(calls: &[CallRecord], store: &str) -> i64 {
    calls
        .iter()
        .filter(|c| c.store == store && c.is_lost)
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(store: &str, status: &str, dt: &str, hr: &str, is_lost: bool) -> CallRecord {
        CallRecord {
            store: store.to_string(),
            queue: "Estrela Televendas".to_string(),
            status: status.to_string(),
            dt: dt.to_string(),
            hr: hr.to_string(),
            is_lost,
        }
    }

    fn sample() -> Vec<CallRecord> {
        vec![
            call("Loja 01", "atendida", "2025-09-01", "08:00:00", false),
            call("Loja 01", "Cliente desistiu", "2025-09-01", "09:00:00", true),
            call("Loja 01", "não atendida", "-", "-", true),
            call("Loja 02", "atendida", "2025-09-02", "10:00:00", false),
            call("Loja 10", "Televendas não atendeu", "2025-09-03", "11:00:00", true),
        ]
    }

    #[test]
    fn test_aggregate_by_store() {
        let aggs = aggregate_by_store(&sample());
        assert_eq!(aggs.len(), 3);
        assert_eq!(aggs[0].store, "Loja 01");
        assert_eq!(aggs[0].recebidas, 3);
        assert_eq!(aggs[0].perdidas, 2);
        assert!((aggs[0].pct_perda - 2.0 / 3.0 * 100.0).abs() < 1e-9);
        // ordenação numérica: Loja 02 antes de Loja 10
        assert_eq!(aggs[1].store, "Loja 02");
        assert_eq!(aggs[2].store, "Loja 10");
    }

    #[test]
    fn test_aggregate_vazio() {
        assert!(aggregate_by_store(&[]).is_empty());
    }

    #[test]
    fn test_report_order_aliases() {
        assert_eq!(ReportOrder::parse("pct_desc"), ReportOrder::PctPerdidasDesc);
        assert_eq!(ReportOrder::parse("pct_perda_asc"), ReportOrder::PctPerdidasAsc);
        assert_eq!(ReportOrder::parse("volume_desc"), ReportOrder::VolumeDesc);
        assert_eq!(ReportOrder::parse("qualquer coisa"), ReportOrder::Loja);
    }

    #[test]
    fn test_sort_report() {
        let mut rows = vec![
            ReportRow {
                loja: "Loja 10".into(),
                recebidas: 10,
                perdidas: 1,
                volume: 100,
                pct_perdidas: 1.0,
                pct_atendidas: 99.0,
            },
            ReportRow {
                loja: "Loja 02".into(),
                recebidas: 10,
                perdidas: 5,
                volume: 50,
                pct_perdidas: 10.0,
                pct_atendidas: 90.0,
            },
        ];
        sort_report(&mut rows, ReportOrder::Loja);
        assert_eq!(rows[0].loja, "Loja 02");

        sort_report(&mut rows, ReportOrder::PctPerdidasDesc);
        assert_eq!(rows[0].loja, "Loja 02");

        sort_report(&mut rows, ReportOrder::VolumeDesc);
        assert_eq!(rows[0].loja, "Loja 10");

        sort_report(&mut rows, ReportOrder::LojaDesc);
        assert_eq!(rows[0].loja, "Loja 10");
    }

    #[test]
    fn test_store_detail_ordena_e_filtra() {
        let rows = store_detail(&sample(), "Loja 01", DetailFilter::Todas);
        assert_eq!(rows.len(), 3);
        // sem timestamp vai pro final
        assert_eq!(rows[2].data, "-");

        let rows = store_detail(&sample(), "Loja 01", DetailFilter::Desistiu);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "Cliente desistiu");

        let rows = store_detail(&sample(), "Loja 01", DetailFilter::Outros);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "não atendida");
    }

    #[test]
    fn test_store_badges() {
        let badges = store_badges(&sample(), "Loja 01");
        assert_eq!(badges.atendida, 1);
        assert_eq!(badges.desistiu, 1);
        assert_eq!(badges.outros, 1);
        assert_eq!(badges.expulsa, 0);
        assert_eq!(lost_count(&sample(), "Loja 01"), 2);
    }
}
