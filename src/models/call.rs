use serde::{Deserialize, Serialize};

/// Registro individual de chamada extraído da planilha mensal.
///
/// `dt` e `hr` são strings já formatadas (`AAAA-MM-DD` / `HH:MM:SS`);
/// registros sem data/hora utilizável carregam `-`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub store: String,
    pub queue: String,
    pub status: String,
    pub dt: String,
    pub hr: String,
    pub is_lost: bool,
}

/// Categoria do upload no trilho de auditoria (tabela `uploads`).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Recebidas,
    Perdidas,
}

impl UploadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadKind::Recebidas => "recebidas",
            UploadKind::Perdidas => "perdidas",
        }
    }
}

impl std::fmt::Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linha da tabela `uploads` (trilha de auditoria, append-only).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadRecord {
    pub id: i64,
    pub kind: UploadKind,
    pub filename: String,
    pub uploaded_at: String,
}

impl std::str::FromStr for UploadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recebidas" => Ok(UploadKind::Recebidas),
            "perdidas" => Ok(UploadKind::Perdidas),
            other => Err(format!("categoria de upload desconhecida: {}", other)),
        }
    }
}
