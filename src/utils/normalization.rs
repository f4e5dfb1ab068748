//! Funções de normalização para lojas, meses e status
//!
//! Este módulo fornece utilitários para normalizar strings vindas das
//! planilhas (acentos, pontuação, variações de grafia) antes de qualquer
//! comparação ou persistência.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

static RE_LOJA_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\bloja\b|\bfilial\b|\blj\b)\D*?(\d{1,3})").unwrap());

static RE_YM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-?(\d{2})$").unwrap());

static RE_TRAILING_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*$").unwrap());

/// Remove acentos via NFKD (Normalization Form Compatibility Decomposition).
///
/// # Exemplos
/// ```
/// use relatorio_telefonia::utils::normalization::strip_accents;
///
/// assert_eq!(strip_accents("não atendida"), "nao atendida");
/// assert_eq!(strip_accents("Açaí"), "Acai");
/// ```
pub fn strip_accents(input: &str) -> String {
    input.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Remove acentos, converte para lowercase, remove caracteres especiais e
/// colapsa espaços.
///
/// # Exemplos
/// ```
/// use relatorio_telefonia::utils::normalization::normalize_string;
///
/// assert_eq!(normalize_string("Estrela - Televendas"), "estrela televendas");
/// assert_eq!(normalize_string("  Loja   09  "), "loja 09");
/// ```
pub fn normalize_string(input: &str) -> String {
    strip_accents(input)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extrai o número da loja e normaliza para `Loja NN`.
///
/// Aceita "Loja 9", "Filial-09", "LJ 21", "Loja21" e valores só numéricos.
pub fn normalize_store(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(caps) = RE_LOJA_NUM.captures(s) {
        let n: u32 = caps[1].parse().ok()?;
        return Some(format!("Loja {:02}", n));
    }
    // fallback: valor só com dígitos ("21", "Loja-21" sem palavra chave etc.)
    let onlynum: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if !onlynum.is_empty() && onlynum == s.chars().filter(|c| !c.is_whitespace()).collect::<String>() {
        let n: u32 = onlynum.parse().ok()?;
        if (1..=999).contains(&n) {
            return Some(format!("Loja {:02}", n));
        }
    }
    None
}

/// Sanitiza o rótulo do mês para `AAAA-MM` (aceita `/` como separador).
pub fn sanitize_ym(ym: &str) -> Option<String> {
    let ym = ym.trim().replace('/', "-");
    let caps = RE_YM.captures(&ym)?;
    let month: u32 = caps[2].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(format!("{}-{}", &caps[1], &caps[2]))
}

/// Chave de ordenação por número da loja (lojas sem número vão pro final).
pub fn store_sort_key(store: &str) -> (u32, String) {
    let n = RE_TRAILING_NUM
        .captures(store)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(u32::MAX);
    (n, store.to_string())
}

/// Slug URL-safe para nomes de loja ("Loja 09" -> "loja-09").
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in strip_accents(s).to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Resolve um slug de volta para o nome original dentro das opções conhecidas.
pub fn deslug<'a>(target: &str, options: &'a [String]) -> Option<&'a String> {
    let tgt = slug(target);
    options.iter().find(|o| slug(o) == tgt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_accents() {
        assert_eq!(strip_accents("não atendida"), "nao atendida");
        assert_eq!(strip_accents("Cliente desistiu"), "Cliente desistiu");
        assert_eq!(strip_accents("tempo esgotado"), "tempo esgotado");
        assert_eq!(strip_accents("Açaí"), "Acai");
    }

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("Estrela - Televendas"), "estrela televendas");
        assert_eq!(normalize_string("  ESTRELA   TLV  "), "estrela tlv");
        assert_eq!(normalize_string(""), "");
    }

    #[test]
    fn test_normalize_store() {
        assert_eq!(normalize_store("Loja 9").as_deref(), Some("Loja 09"));
        assert_eq!(normalize_store("Filial-09").as_deref(), Some("Loja 09"));
        assert_eq!(normalize_store("LJ 21").as_deref(), Some("Loja 21"));
        assert_eq!(normalize_store("Loja21").as_deref(), Some("Loja 21"));
        assert_eq!(normalize_store("21").as_deref(), Some("Loja 21"));
        assert_eq!(normalize_store("loja 102").as_deref(), Some("Loja 102"));
        assert_eq!(normalize_store("Matriz"), None);
        assert_eq!(normalize_store(""), None);
    }

    #[test]
    fn test_sanitize_ym() {
        assert_eq!(sanitize_ym("2025-09").as_deref(), Some("2025-09"));
        assert_eq!(sanitize_ym("2025/09").as_deref(), Some("2025-09"));
        assert_eq!(sanitize_ym("202509").as_deref(), Some("2025-09"));
        assert_eq!(sanitize_ym("2025-13"), None);
        assert_eq!(sanitize_ym("25-09"), None);
        assert_eq!(sanitize_ym("setembro"), None);
    }

    #[test]
    fn test_store_sort_key() {
        let mut lojas = vec!["Loja 10".to_string(), "Loja 02".to_string(), "Loja 09".to_string()];
        lojas.sort_by_key(|s| store_sort_key(s));
        assert_eq!(lojas, vec!["Loja 02", "Loja 09", "Loja 10"]);
    }

    #[test]
    fn test_slug_roundtrip() {
        assert_eq!(slug("Loja 09"), "loja-09");
        let options = vec!["Loja 09".to_string(), "Loja 21".to_string()];
        assert_eq!(deslug("loja-09", &options), Some(&options[0]));
        assert_eq!(deslug("loja-99", &options), None);
    }
}
