//! Diretório de planilhas mensais já recebidas.
//!
//! Os arquivos seguem a convenção `{AAAA-MM}__{nome-original}`; a
//! consolidação sempre usa o arquivo mais recente do mês.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::utils::AppResult;

#[derive(Debug, Clone)]
pub struct CallsSpool {
    dir: PathBuf,
}

impl CallsSpool {
    /// Abre o spool, criando o diretório se necessário.
    pub fn open(dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(CallsSpool {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn month_prefix(ym: &str) -> String {
        format!("{}__", ym)
    }

    /// Arquivo mais recente do mês (`{ym}__*`), por data de modificação.
    pub fn latest_file(&self, ym: &str) -> AppResult<Option<PathBuf>> {
        let prefix = Self::month_prefix(ym);
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }
            let mtime = entry.metadata()?.modified()?;
            if newest.as_ref().map(|(t, _)| mtime > *t).unwrap_or(true) {
                newest = Some((mtime, entry.path()));
            }
        }
        Ok(newest.map(|(_, p)| p))
    }

    /// Remove todos os arquivos do mês. Retorna quantos foram removidos.
    pub fn remove_month(&self, ym: &str) -> AppResult<usize> {
        let prefix = Self::month_prefix(ym);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
