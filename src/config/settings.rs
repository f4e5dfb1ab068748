use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::QueueMatchMode;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngestSettings {
    /// Diretório onde as planilhas mensais ficam spooladas ({ym}__nome.csv).
    #[serde(default = "default_calls_dir")]
    pub calls_dir: String,
    #[serde(default)]
    pub queue_match_mode: QueueMatchMode,
    #[serde(default = "default_queue_target")]
    pub queue_target: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "app.db".to_string()
}

fn default_calls_dir() -> String {
    "uploads/calls".to_string()
}

fn default_queue_target() -> String {
    "Estrela Televendas".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            busy_timeout_ms: None,
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            calls_dir: default_calls_dir(),
            queue_match_mode: QueueMatchMode::default(),
            queue_target: default_queue_target(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Overrides diretos por variável de ambiente
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", path)?;
        }
        if let Ok(dir) = std::env::var("CALLS_DIR") {
            builder = builder.set_override("ingest.calls_dir", dir)?;
        }

        builder = builder.add_source(Environment::with_prefix("RELATORIO").separator("__"));

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Filtro de fila montado a partir das configurações de ingestão.
    pub fn queue_filter(&self) -> crate::services::QueueFilter {
        crate::services::QueueFilter {
            mode: self.ingest.queue_match_mode,
            target: self.ingest.queue_target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sem_arquivos() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.database.path, "app.db");
        assert_eq!(s.ingest.queue_target, "Estrela Televendas");
        assert_eq!(s.ingest.queue_match_mode, QueueMatchMode::Smart);
    }
}
