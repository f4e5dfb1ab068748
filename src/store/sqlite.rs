//! Persistência SQLite das tabelas `months`, `uploads` e `metrics`.
//!
//! Regras aplicadas pelo schema:
//! - `months.ym` é único (um registro por período);
//! - `metrics` tem UNIQUE(month_id, store) — gravações usam upsert, nunca
//!   duplicam a linha de uma loja;
//! - `uploads` e `metrics` referenciam `months` via FK (`foreign_keys = ON`);
//! - contagens são inteiros não-negativos (CHECK).

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::models::{MetricRow, MonthSummary, StoreAggregate, UploadKind, UploadRecord};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS months (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      ym TEXT UNIQUE NOT NULL,
      created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS uploads (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      month_id INTEGER NOT NULL,
      kind TEXT NOT NULL CHECK (kind IN ('recebidas', 'perdidas')),
      filename TEXT NOT NULL,
      uploaded_at DATETIME DEFAULT CURRENT_TIMESTAMP,
      FOREIGN KEY (month_id) REFERENCES months(id)
    );

    CREATE TABLE IF NOT EXISTS metrics (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      month_id INTEGER NOT NULL,
      store TEXT NOT NULL,
      recebidas INTEGER NOT NULL DEFAULT 0 CHECK (recebidas >= 0),
      perdidas INTEGER NOT NULL DEFAULT 0 CHECK (perdidas >= 0),
      volume_total INTEGER NOT NULL DEFAULT 0 CHECK (volume_total >= 0),
      pct_perda REAL NOT NULL DEFAULT 0.0,
      FOREIGN KEY (month_id) REFERENCES months(id),
      UNIQUE(month_id, store)
    );
";

/// Erros da camada de armazenamento.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("contagem negativa para loja '{store}': recebidas={recebidas} perdidas={perdidas}")]
    NegativeCount {
        store: String,
        recebidas: i64,
        perdidas: i64,
    },
    #[error("mês não encontrado: {0}")]
    MonthNotFound(String),
}

/// Store relacional do serviço (conexão única protegida por mutex).
pub struct ReportStore {
    conn: Mutex<Connection>,
}

impl ReportStore {
    /// Abre (ou cria) o banco no caminho informado e garante o schema.
    pub fn open(path: &Path, busy_timeout_ms: Option<u64>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::configure(&conn, busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Banco em memória (testes).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, DEFAULT_BUSY_TIMEOUT_MS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection, busy_timeout_ms: u64) -> Result<(), StoreError> {
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Probe simples de disponibilidade (usado pelo /ready).
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// ID do mês `AAAA-MM`, criando o registro se ainda não existir.
    pub fn month_id_for(&self, ym: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Self::month_id_for_tx(&conn, ym)
    }

    fn month_id_for_tx(conn: &Connection, ym: &str) -> Result<i64, StoreError> {
        let existing: Option<i64> = conn
            .query_row("SELECT id FROM months WHERE ym = ?1", params![ym], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute("INSERT INTO months (ym) VALUES (?1)", params![ym])?;
        Ok(conn.last_insert_rowid())
    }

    /// ID do mês, sem criar (None quando não consolidado).
    pub fn find_month(&self, ym: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        let id = conn
            .query_row("SELECT id FROM months WHERE ym = ?1", params![ym], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Meses conhecidos, mais recentes primeiro, com contagens para o painel.
    pub fn list_months(&self) -> Result<Vec<MonthSummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.ym,
               (SELECT COUNT(*) FROM uploads u WHERE u.month_id = m.id) AS uploads,
               (SELECT COUNT(*) FROM metrics t WHERE t.month_id = m.id) AS lojas
             FROM months m
             ORDER BY m.ym DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MonthSummary {
                    id: row.get(0)?,
                    ym: row.get(1)?,
                    uploads: row.get(2)?,
                    lojas: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Registra um upload no trilho de auditoria (append-only).
    pub fn record_upload(
        &self,
        month_id: i64,
        kind: UploadKind,
        filename: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO uploads (month_id, kind, filename) VALUES (?1, ?2, ?3)",
            params![month_id, kind.as_str(), filename],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Uploads de um mês, em ordem de chegada.
    pub fn uploads_for_month(&self, month_id: i64) -> Result<Vec<UploadRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, filename, uploaded_at FROM uploads
             WHERE month_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![month_id], |row| {
                let kind: String = row.get(1)?;
                Ok(UploadRecord {
                    id: row.get(0)?,
                    kind: UploadKind::from_str(&kind).unwrap_or(UploadKind::Recebidas),
                    filename: row.get(2)?,
                    uploaded_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Upsert da métrica de uma loja. `pct_perda` é recalculada a partir das
    /// contagens; quando a loja já tem volume informado, o percentual é
    /// recalculado sobre o volume.
    pub fn upsert_metric(
        &self,
        month_id: i64,
        store: &str,
        recebidas: i64,
        perdidas: i64,
    ) -> Result<(), StoreError> {
        if recebidas < 0 || perdidas < 0 {
            return Err(StoreError::NegativeCount {
                store: store.to_string(),
                recebidas,
                perdidas,
            });
        }
        let conn = self.lock()?;
        Self::upsert_metric_tx(&conn, month_id, store, recebidas, perdidas)
    }

    fn upsert_metric_tx(
        conn: &Connection,
        month_id: i64,
        store: &str,
        recebidas: i64,
        perdidas: i64,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO metrics (month_id, store, recebidas, perdidas, volume_total, pct_perda)
             VALUES (?1, ?2, ?3, ?4, 0,
                     CASE WHEN ?3 > 0 THEN CAST(?4 AS REAL) / ?3 * 100.0 ELSE 0.0 END)
             ON CONFLICT(month_id, store) DO UPDATE SET
                recebidas = excluded.recebidas,
                perdidas  = excluded.perdidas,
                pct_perda = CASE
                    WHEN metrics.volume_total > 0
                        THEN CAST(excluded.perdidas AS REAL) / metrics.volume_total * 100.0
                    WHEN excluded.recebidas > 0
                        THEN CAST(excluded.perdidas AS REAL) / excluded.recebidas * 100.0
                    ELSE 0.0 END",
            params![month_id, store, recebidas, perdidas],
        )?;
        Ok(())
    }

    /// Consolida um mês em uma única transação: garante o mês, registra os
    /// uploads de auditoria (uma linha por categoria alimentada pelo arquivo)
    /// e faz upsert das métricas agregadas.
    pub fn consolidate(
        &self,
        ym: &str,
        filename: &str,
        aggregates: &[StoreAggregate],
    ) -> Result<i64, StoreError> {
        for agg in aggregates {
            if agg.recebidas < 0 || agg.perdidas < 0 {
                return Err(StoreError::NegativeCount {
                    store: agg.store.clone(),
                    recebidas: agg.recebidas,
                    perdidas: agg.perdidas,
                });
            }
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let month_id = Self::month_id_for_tx(&tx, ym)?;
        for kind in [UploadKind::Recebidas, UploadKind::Perdidas] {
            tx.execute(
                "INSERT INTO uploads (month_id, kind, filename) VALUES (?1, ?2, ?3)",
                params![month_id, kind.as_str(), filename],
            )?;
        }
        for agg in aggregates {
            Self::upsert_metric_tx(&tx, month_id, &agg.store, agg.recebidas, agg.perdidas)?;
        }
        tx.commit()?;
        Ok(month_id)
    }

    /// Métricas de um mês, ordenadas por loja.
    pub fn metrics_for_month(&self, month_id: i64) -> Result<Vec<MetricRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT store, recebidas, perdidas, volume_total, pct_perda
             FROM metrics WHERE month_id = ?1 ORDER BY store",
        )?;
        let rows = stmt
            .query_map(params![month_id], |row| {
                Ok(MetricRow {
                    store: row.get(0)?,
                    recebidas: row.get(1)?,
                    perdidas: row.get(2)?,
                    volume_total: row.get(3)?,
                    pct_perda: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Métrica de uma loja específica.
    pub fn metric_for_store(
        &self,
        month_id: i64,
        store: &str,
    ) -> Result<Option<MetricRow>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT store, recebidas, perdidas, volume_total, pct_perda
                 FROM metrics WHERE month_id = ?1 AND store = ?2",
                params![month_id, store],
                |row| {
                    Ok(MetricRow {
                        store: row.get(0)?,
                        recebidas: row.get(1)?,
                        perdidas: row.get(2)?,
                        volume_total: row.get(3)?,
                        pct_perda: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Aplica o volume total de uma loja e recalcula `pct_perda` sobre ele.
    /// Retorna quantas linhas foram atualizadas (0 = loja inexistente).
    pub fn apply_volume(
        &self,
        month_id: i64,
        store: &str,
        volume: i64,
    ) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE metrics
             SET volume_total = ?1,
                 pct_perda = CASE WHEN ?1 > 0
                                  THEN CAST(perdidas AS REAL) / ?1 * 100.0
                                  ELSE 0.0 END
             WHERE month_id = ?2 AND store = ?3",
            params![volume, month_id, store],
        )?;
        Ok(changed)
    }

    /// Lojas do mês ainda sem volume informado.
    pub fn pending_volumes(&self, month_id: i64) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM metrics WHERE month_id = ?1 AND volume_total = 0",
            params![month_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Remoção administrativa de um mês (cascata sobre uploads e metrics).
    /// Retorna `false` quando o mês não existe.
    pub fn delete_month(&self, ym: &str) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id: Option<i64> = tx
            .query_row("SELECT id FROM months WHERE ym = ?1", params![ym], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(month_id) = id else {
            return Ok(false);
        };
        tx.execute("DELETE FROM metrics WHERE month_id = ?1", params![month_id])?;
        tx.execute("DELETE FROM uploads WHERE month_id = ?1", params![month_id])?;
        tx.execute("DELETE FROM months WHERE id = ?1", params![month_id])?;
        tx.commit()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReportStore {
        ReportStore::open_in_memory().unwrap()
    }

    fn agg(store: &str, recebidas: i64, perdidas: i64) -> StoreAggregate {
        StoreAggregate {
            store: store.to_string(),
            recebidas,
            perdidas,
            pct_perda: 0.0,
        }
    }

    #[test]
    fn test_month_id_for_é_idempotente() {
        let s = store();
        let a = s.month_id_for("2025-09").unwrap();
        let b = s.month_id_for("2025-09").unwrap();
        assert_eq!(a, b);
        assert_eq!(s.list_months().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_não_duplica_loja() {
        let s = store();
        let mid = s.month_id_for("2025-09").unwrap();
        s.upsert_metric(mid, "Loja 01", 100, 10).unwrap();
        s.upsert_metric(mid, "Loja 01", 120, 30).unwrap();

        let rows = s.metrics_for_month(mid).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recebidas, 120);
        assert_eq!(rows[0].perdidas, 30);
    }

    #[test]
    fn test_pct_perda_recalculada_no_upsert() {
        let s = store();
        let mid = s.month_id_for("2025-09").unwrap();
        s.upsert_metric(mid, "Loja 02", 200, 50).unwrap();

        let row = s.metric_for_store(mid, "Loja 02").unwrap().unwrap();
        assert!((row.pct_perda - 25.0).abs() < 1e-9);

        // recebidas = 0 -> política: 0.0
        s.upsert_metric(mid, "Loja 03", 0, 0).unwrap();
        let row = s.metric_for_store(mid, "Loja 03").unwrap().unwrap();
        assert_eq!(row.pct_perda, 0.0);
    }

    #[test]
    fn test_contagem_negativa_rejeitada() {
        let s = store();
        let mid = s.month_id_for("2025-09").unwrap();
        let err = s.upsert_metric(mid, "Loja 01", -1, 0).unwrap_err();
        assert!(matches!(err, StoreError::NegativeCount { .. }));
    }

    #[test]
    fn test_fk_mês_inexistente() {
        let s = store();
        // month_id 999 não existe; FK deve barrar
        assert!(s.upsert_metric(999, "Loja 01", 10, 1).is_err());
        assert!(s
            .record_upload(999, UploadKind::Recebidas, "x.csv")
            .is_err());
    }

    #[test]
    fn test_volume_recalcula_pct() {
        let s = store();
        let mid = s.month_id_for("2025-09").unwrap();
        s.upsert_metric(mid, "Loja 01", 80, 20).unwrap();

        let changed = s.apply_volume(mid, "Loja 01", 200).unwrap();
        assert_eq!(changed, 1);
        let row = s.metric_for_store(mid, "Loja 01").unwrap().unwrap();
        assert_eq!(row.volume_total, 200);
        assert!((row.pct_perda - 10.0).abs() < 1e-9);

        // novo upsert com volume já aplicado mantém o cálculo sobre o volume
        s.upsert_metric(mid, "Loja 01", 90, 40).unwrap();
        let row = s.metric_for_store(mid, "Loja 01").unwrap().unwrap();
        assert!((row.pct_perda - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_pending_volumes() {
        let s = store();
        let mid = s.month_id_for("2025-09").unwrap();
        s.upsert_metric(mid, "Loja 01", 80, 20).unwrap();
        s.upsert_metric(mid, "Loja 02", 50, 5).unwrap();
        assert_eq!(s.pending_volumes(mid).unwrap(), 2);
        s.apply_volume(mid, "Loja 01", 100).unwrap();
        assert_eq!(s.pending_volumes(mid).unwrap(), 1);
    }

    #[test]
    fn test_consolidate_transacional() {
        let s = store();
        let aggs = vec![agg("Loja 01", 100, 10), agg("Loja 02", 60, 30)];
        let mid = s.consolidate("2025-09", "2025-09__calls.csv", &aggs).unwrap();

        let rows = s.metrics_for_month(mid).unwrap();
        assert_eq!(rows.len(), 2);

        let uploads = s.uploads_for_month(mid).unwrap();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().any(|u| u.kind == UploadKind::Recebidas));
        assert!(uploads.iter().any(|u| u.kind == UploadKind::Perdidas));

        // reconsolidação: métricas sofrem upsert, uploads só crescem
        let mid2 = s.consolidate("2025-09", "2025-09__calls_v2.csv", &aggs).unwrap();
        assert_eq!(mid, mid2);
        assert_eq!(s.metrics_for_month(mid).unwrap().len(), 2);
        assert_eq!(s.uploads_for_month(mid).unwrap().len(), 4);
    }

    #[test]
    fn test_delete_month_em_cascata() {
        let s = store();
        let mid = s
            .consolidate("2025-09", "2025-09__calls.csv", &[agg("Loja 01", 10, 1)])
            .unwrap();
        assert!(s.delete_month("2025-09").unwrap());
        assert!(s.find_month("2025-09").unwrap().is_none());
        assert!(s.metrics_for_month(mid).unwrap().is_empty());
        assert!(s.uploads_for_month(mid).unwrap().is_empty());
        assert!(!s.delete_month("2025-09").unwrap());
    }

    #[test]
    fn test_persistência_em_arquivo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        {
            let s = ReportStore::open(&path, None).unwrap();
            let mid = s.month_id_for("2025-10").unwrap();
            s.upsert_metric(mid, "Loja 07", 42, 7).unwrap();
        }
        let s = ReportStore::open(&path, None).unwrap();
        let mid = s.find_month("2025-10").unwrap().unwrap();
        let row = s.metric_for_store(mid, "Loja 07").unwrap().unwrap();
        assert_eq!(row.recebidas, 42);
    }
}
