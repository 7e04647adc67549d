//! Tipos de erro das funções de processamento.
//!
//! Define [`ProcessingError`] com variantes para falhas de transferência,
//! respostas HTTP não-2xx, erros de armazenamento e falhas de estágio.
//! Cada variante é classificada em um [`FailureKind`] pelo executor.

use thiserror::Error;

use crate::error::FailureKind;

/// Erros que uma função de processamento pode retornar.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// O localizador de origem não é uma URL utilizável.
    #[error("invalid source locator {url}: {reason}")]
    InvalidSource { url: String, reason: String },

    /// Falha de rede ao buscar a origem (DNS, conexão recusada, corpo truncado).
    #[error("could not reach {url}: {source}")]
    Transfer {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A origem respondeu com um status diferente de 2xx.
    #[error("transfer from {url} returned status {status}")]
    TransferStatus { url: String, status: u16 },

    /// Falha ao gravar o artefato no armazenamento local.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Um estágio do pipeline falhou.
    #[error("stage {stage} failed: {message}")]
    Stage { stage: String, message: String },
}

impl ProcessingError {
    /// Classificação registrada no job quando este erro o encerra.
    pub fn kind(&self) -> FailureKind {
        match self {
            ProcessingError::InvalidSource { .. }
            | ProcessingError::Transfer { .. }
            | ProcessingError::TransferStatus { .. } => FailureKind::Transfer,
            ProcessingError::Io(_) | ProcessingError::Stage { .. } => FailureKind::Processing,
        }
    }
}
