//! Configuração do PAPI carregada a partir de `papi.toml`.
//!
//! A struct [`PapiConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `PAPI_HOST`, `PAPI_PORT` e `PAPI_OUTPUT_DIR`
//! têm precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::executor::ExecutorConfig;
use crate::processing::{DownloadProcessor, DubbingPipeline, Processor};

/// Nome do arquivo procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "papi.toml";

/// Qual função de processamento os jobs executam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Apenas baixa e copia a mídia de origem.
    Download,
    /// Baixa e executa os estágios simulados de dublagem.
    Dubbing,
}

/// Configuração de nível superior carregada de `papi.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PapiConfig {
    /// Endereço de escuta do servidor HTTP.
    #[serde(default = "default_host")]
    pub host: String,

    /// Porta do servidor HTTP.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Diretório onde os artefatos produzidos são gravados.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Máximo de jobs em processamento simultâneo.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Tempo máximo de processamento de um job, em segundos.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Timeout das requisições de download, em segundos.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_processor")]
    pub processor: ProcessorKind,

    /// Duração de cada estágio simulado de dublagem, em milissegundos.
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data/outputs")
}

fn default_max_concurrent_jobs() -> usize {
    4
}

// 10 minutos.
fn default_job_timeout_secs() -> u64 {
    600
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_processor() -> ProcessorKind {
    ProcessorKind::Dubbing
}

fn default_stage_delay_ms() -> u64 {
    500
}

impl Default for PapiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            output_dir: default_output_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            processor: default_processor(),
            stage_delay_ms: default_stage_delay_ms(),
        }
    }
}

impl PapiConfig {
    /// Carrega a configuração de `papi.toml` no diretório atual.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Carrega a configuração do caminho informado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<PapiConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Variáveis de ambiente têm precedência sobre o arquivo.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var("PAPI_HOST").filter(|v| !v.is_empty()) {
            self.host = host;
        }
        if let Some(port) = var("PAPI_PORT").filter(|v| !v.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("invalid PAPI_PORT `{port}`"))?;
        }
        if let Some(dir) = var("PAPI_OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Constrói a função de processamento selecionada.
    pub fn build_processor(&self) -> Result<Arc<dyn Processor>> {
        let download = DownloadProcessor::new(&self.output_dir, self.download_timeout())
            .context("failed to build HTTP client")?;
        let processor: Arc<dyn Processor> = match self.processor {
            ProcessorKind::Download => Arc::new(download),
            ProcessorKind::Dubbing => Arc::new(DubbingPipeline::new(download, self.stage_delay())),
        };
        Ok(processor)
    }
}
