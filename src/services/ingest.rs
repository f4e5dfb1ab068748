//! Leitura e normalização das planilhas mensais de chamadas.
//!
//! O export do sistema de telefonia varia de formato: delimitador, nomes de
//! colunas e grafias de status mudam entre versões. Este módulo detecta o
//! delimitador, escolhe as colunas de loja/fila/status por heurística,
//! traduz os status para os rótulos canônicos em PT-BR e marca as chamadas
//! perdidas.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::CallRecord;
use crate::utils::normalization::{normalize_store, normalize_string, strip_accents};
use crate::utils::{AppError, AppResult};

const STORE_KEYS: &[&str] = &["loja", "store", "unidade", "filial", "site", "branch", "origem"];
const QUEUE_KEYS: &[&str] = &["queue", "fila", "skill", "department", "grupo", "setor"];
const STATUS_KEYS: &[&str] = &[
    "status", "result", "disposition", "motivo", "outcome", "termina", "final",
];

/// Mapeia trechos de status crus para os rótulos canônicos em PT-BR.
/// A ordem importa: o primeiro trecho contido no status cru vence.
const STATUS_PT: &[(&str, &str)] = &[
    ("evicted system", "Televendas não atendeu"),
    ("evicted by system", "Televendas não atendeu"),
    ("abandoned", "Cliente desistiu"),
    ("no answer", "não atendida"),
    ("no-answer", "não atendida"),
    ("not answered", "não atendida"),
    ("nao atend", "não atendida"),
    ("timeout", "tempo esgotado"),
    ("cancel", "cancelada"),
    ("handled", "atendida"),
    ("completed", "atendida"),
    ("connected", "atendida"),
    ("success", "atendida"),
    ("answer", "atendida"),
    ("atend", "atendida"),
];

/// Rótulos que contam como chamada perdida.
pub const LOST_PT: &[&str] = &[
    "cliente desistiu",
    "não atendida",
    "tempo esgotado",
    "cancelada",
    "televendas não atendeu",
];

static RE_TIME_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)date|data|start|hora|time|timestamp").unwrap());

static RE_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})").unwrap());

/// Modo de match da fila alvo.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueMatchMode {
    /// Ignora acentos/pontuação; exige o token `estrela` e um de
    /// `televendas|tele|tlv`.
    #[default]
    Smart,
    /// Substring: exige `estrela` e `tele` no nome da fila.
    Contains,
    /// Nome exato da fila.
    Exact,
}

/// Filtro de fila aplicado na ingestão.
#[derive(Debug, Clone)]
pub struct QueueFilter {
    pub mode: QueueMatchMode,
    pub target: String,
}

impl Default for QueueFilter {
    fn default() -> Self {
        QueueFilter {
            mode: QueueMatchMode::Smart,
            target: "Estrela Televendas".to_string(),
        }
    }
}

impl QueueFilter {
    pub fn matches(&self, queue: &str) -> bool {
        match self.mode {
            QueueMatchMode::Exact => queue.trim() == self.target,
            QueueMatchMode::Contains => {
                let low = strip_accents(queue).to_lowercase();
                low.contains("estrela") && (low.contains("tele") || low.contains("televenda"))
            }
            QueueMatchMode::Smart => {
                let norm = normalize_string(queue);
                let tokens: Vec<&str> = norm.split_whitespace().collect();
                let has_estrela = tokens.contains(&"estrela") || norm.contains("estrela");
                let has_tele = tokens.iter().any(|t| matches!(*t, "televendas" | "tele" | "tlv"))
                    || norm.contains("tele")
                    || norm.contains("televenda");
                has_estrela && has_tele
            }
        }
    }
}

/// Traduz um status cru para o rótulo canônico em PT-BR.
/// Status desconhecidos passam adiante como vieram (`-` quando vazio).
pub fn translate_status(raw: &str) -> String {
    let base = strip_accents(raw).to_lowercase();
    let base = base.trim();
    for (key, pt) in STATUS_PT {
        if base.contains(key) {
            return (*pt).to_string();
        }
    }
    if raw.trim().is_empty() {
        "-".to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Indica se um rótulo canônico conta como perdida.
pub fn status_is_lost(status: &str) -> bool {
    let low = status.to_lowercase();
    LOST_PT.iter().any(|s| *s == low)
}

// ---------- leitura da tabela ----------

/// Detecta o delimitador testando `,` `;` `|` `\t` sobre a primeira linha.
fn detect_delimiter(sample: &str) -> u8 {
    let first_line = sample.lines().next().unwrap_or("");
    for d in [b',', b';', b'|', b'\t'] {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(d)
            .has_headers(false)
            .flexible(true)
            .from_reader(first_line.as_bytes());
        if let Some(Ok(rec)) = rdr.records().next() {
            if rec.len() > 1 {
                return d;
            }
        }
    }
    b','
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_table(path: &Path) -> AppResult<Table> {
    let raw = fs::read_to_string(path)?;
    let delimiter = detect_delimiter(&raw);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.len() < 2 {
        return Err(AppError::IngestError(format!(
            "não consegui detectar o delimitador do CSV: {}",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let mut row: Vec<String> = rec.iter().map(|v| v.trim().to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

// ---------- detecção de colunas ----------

fn find_candidates(headers: &[String], keys: &[&str]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let low = h.to_lowercase();
            keys.iter().any(|k| low.contains(k))
        })
        .map(|(i, _)| i)
        .collect()
}

static RE_STORE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bloja\b|\bfilial\b|\bbranch\b|\bsite\b|\blj\b").unwrap());

/// Fração das células que parecem um rótulo de loja.
fn looks_like_store_values(rows: &[Vec<String>], col: usize) -> f64 {
    let mut hits = 0usize;
    let mut total = 0usize;
    for row in rows {
        let v = &row[col];
        if v.is_empty() {
            continue;
        }
        total += 1;
        if RE_STORE_WORD.is_match(v) || normalize_store(v).is_some() {
            hits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn pick_store_column(table: &Table) -> usize {
    let cand = find_candidates(&table.headers, STORE_KEYS);
    if !cand.is_empty() {
        return cand
            .into_iter()
            .max_by(|a, b| {
                looks_like_store_values(&table.rows, *a)
                    .total_cmp(&looks_like_store_values(&table.rows, *b))
            })
            .unwrap_or(0);
    }
    // fallback: evita colunas de tempo e escolhe a que mais parece loja
    let non_time: Vec<usize> = (0..table.headers.len())
        .filter(|i| !RE_TIME_HEADER.is_match(&table.headers[*i]))
        .collect();
    if non_time.is_empty() {
        return 0;
    }
    non_time
        .into_iter()
        .max_by(|a, b| {
            looks_like_store_values(&table.rows, *a)
                .total_cmp(&looks_like_store_values(&table.rows, *b))
        })
        .unwrap_or(0)
}

fn pick_first_or_fallback(headers: &[String], keys: &[&str], fallback: usize) -> usize {
    find_candidates(headers, keys)
        .into_iter()
        .next()
        .unwrap_or_else(|| fallback.min(headers.len() - 1))
}

// ---------- data/hora ----------

/// Heurística dayfirst: se a maioria dos primeiros números passa de 12,
/// o formato é dia/mês.
fn guess_dayfirst(values: &[&String]) -> bool {
    let mut hits = 0usize;
    let mut total = 0usize;
    for v in values.iter().take(300) {
        if let Some(caps) = RE_DMY.captures(v) {
            total += 1;
            let d1: u32 = caps[1].parse().unwrap_or(0);
            if d1 > 12 {
                hits += 1;
            }
        }
    }
    if total == 0 {
        true
    } else {
        hits as f64 > total as f64 * 0.6
    }
}

fn parse_epoch(v: &str) -> Option<NaiveDateTime> {
    let n: i64 = v.trim().parse().ok()?;
    if n >= 1_000_000_000_000 {
        chrono::DateTime::from_timestamp_millis(n).map(|dt| dt.naive_utc())
    } else if n >= 1_000_000_000 {
        chrono::DateTime::from_timestamp(n, 0).map(|dt| dt.naive_utc())
    } else {
        None
    }
}

fn parse_text(v: &str, dayfirst: bool) -> Option<NaiveDateTime> {
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    const DT_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt);
        }
    }
    let day_formats: &[&str] = if dayfirst {
        &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M", "%d-%m-%Y %H:%M:%S"]
    } else {
        &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M", "%m-%d-%Y %H:%M:%S"]
    };
    for fmt in day_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt);
        }
    }
    let date_only = if dayfirst { "%d/%m/%Y" } else { "%m/%d/%Y" };
    for fmt in ["%Y-%m-%d", date_only] {
        if let Ok(d) = NaiveDate::parse_from_str(v, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Prioriza colunas com timezone no nome, depois início/hora.
fn score_time_column(name: &str) -> i32 {
    let n = name.to_lowercase();
    let mut score = 0;
    if n.contains("america") && (n.contains("sao_paulo") || n.contains("sao paulo")) {
        score += 5;
    }
    if n.contains("start") || n.contains("inicio") {
        score += 2;
    }
    if n.contains("time") || n.contains("hora") {
        score += 1;
    }
    score
}

/// Melhor coluna de data/hora da tabela: aceita epoch em s/ms ou texto.
/// Retorna os timestamps por linha quando pelo menos 20% parseiam.
fn best_datetime_series(table: &Table) -> Option<Vec<Option<NaiveDateTime>>> {
    let mut cols: Vec<usize> = (0..table.headers.len())
        .filter(|i| RE_TIME_HEADER.is_match(&table.headers[*i]))
        .collect();
    cols.sort_by_key(|i| std::cmp::Reverse(score_time_column(&table.headers[*i])));

    for col in cols {
        let values: Vec<&String> = table.rows.iter().map(|r| &r[col]).collect();
        let dayfirst = guess_dayfirst(&values);
        let parsed: Vec<Option<NaiveDateTime>> = values
            .iter()
            .map(|v| parse_epoch(v).or_else(|| parse_text(v, dayfirst)))
            .collect();
        let ok = parsed.iter().filter(|p| p.is_some()).count();
        if ok >= 1.max(table.rows.len() / 5) {
            return Some(parsed);
        }
    }
    None
}

// ---------- parser principal ----------

/// Lê a planilha de chamadas, filtra a fila alvo (quando detectada) e
/// normaliza cada linha em um [`CallRecord`].
pub fn load_calls(path: &Path, filter: &QueueFilter) -> AppResult<Vec<CallRecord>> {
    let table = read_table(path)?;

    let store_col = pick_store_column(&table);
    let queue_col = pick_first_or_fallback(&table.headers, QUEUE_KEYS, 1);
    let status_col =
        pick_first_or_fallback(&table.headers, STATUS_KEYS, table.headers.len() - 1);

    tracing::info!(
        "Colunas escolhidas -> loja: '{}' | fila: '{}' | status: '{}'",
        table.headers[store_col],
        table.headers[queue_col],
        table.headers[status_col]
    );

    let timestamps = best_datetime_series(&table);
    if timestamps.is_none() {
        tracing::warn!("Nenhuma coluna de data/hora convincente em {}", path.display());
    }

    // Filtra a fila alvo; sem match em nenhuma linha, usa todas as filas.
    let queue_mask: Vec<bool> = table
        .rows
        .iter()
        .map(|r| filter.matches(&r[queue_col]))
        .collect();
    let queue_detected = queue_mask.iter().any(|m| *m);
    if !queue_detected {
        tracing::warn!("Fila alvo não detectada; usando todas as filas");
    }

    // Normaliza lojas; se poucas forem reconhecidas na coluna escolhida,
    // tenta extrair de qualquer coluna.
    let mut stores: Vec<Option<String>> = table
        .rows
        .iter()
        .map(|r| normalize_store(&r[store_col]))
        .collect();
    let kept = table.rows.len();
    let recognized = stores.iter().filter(|s| s.is_some()).count();
    if kept > 0 && recognized < 1.max(kept / 5) {
        tracing::warn!("Poucas lojas reconhecidas na coluna escolhida; varrendo todas as colunas");
        stores = table
            .rows
            .iter()
            .map(|r| r.iter().find_map(|v| normalize_store(v)))
            .collect();
    }

    let mut out = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        if queue_detected && !queue_mask[i] {
            continue;
        }
        let Some(store) = stores[i].clone() else {
            continue;
        };
        let (dt, hr) = match timestamps.as_ref().and_then(|ts| ts[i]) {
            Some(ts) => (
                ts.format("%Y-%m-%d").to_string(),
                ts.format("%H:%M:%S").to_string(),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        let status = translate_status(&row[status_col]);
        let is_lost = status_is_lost(&status);
        out.push(CallRecord {
            store,
            queue: row[queue_col].clone(),
            status,
            dt,
            hr,
            is_lost,
        });
    }

    if out.is_empty() {
        return Err(AppError::IngestError(format!(
            "nenhuma loja reconhecida após normalização em {}",
            path.display()
        )));
    }

    tracing::info!(
        "Planilha {} processada: {} linhas úteis",
        path.display(),
        out.len()
    );
    Ok(out)
}
