//! Interface de linha de comando do PAPI baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, run)
//! e flags globais (--config, --max-concurrent, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::ProcessorKind;

/// PAPI — serviço assíncrono de processamento de mídia.
#[derive(Debug, Parser)]
#[command(name = "papi", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Máximo de jobs processados em paralelo.
    #[arg(long, global = true)]
    pub max_concurrent: Option<usize>,

    /// Função de processamento executada pelos jobs.
    #[arg(long, global = true)]
    pub processor: Option<ProcessorArg>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Argumento de processador aceito pela CLI, mapeado para [`ProcessorKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProcessorArg {
    /// Apenas baixa a mídia de origem.
    Download,
    /// Baixa e executa a dublagem simulada.
    Dubbing,
}

impl From<ProcessorArg> for ProcessorKind {
    fn from(arg: ProcessorArg) -> Self {
        match arg {
            ProcessorArg::Download => ProcessorKind::Download,
            ProcessorArg::Dubbing => ProcessorKind::Dubbing,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia o servidor HTTP de jobs.
    Serve {
        /// Porta de escuta (sobrepõe a configuração).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Processa uma única mídia localmente e acompanha o job até o fim.
    Run {
        /// URL da mídia de origem.
        source_url: String,

        /// Idioma alvo da dublagem (pode ser repetido).
        #[arg(long = "lang", short = 'l')]
        languages: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "papi",
            "run",
            "https://cdn.example.com/talk.mp4",
            "--lang",
            "pt",
            "-l",
            "es",
        ]);
        match cli.command {
            Command::Run {
                source_url,
                languages,
            } => {
                assert_eq!(source_url, "https://cdn.example.com/talk.mp4");
                assert_eq!(languages, vec!["pt", "es"]);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "papi",
            "--config",
            "/etc/papi.toml",
            "--max-concurrent",
            "2",
            "--processor",
            "download",
            "--verbose",
            "serve",
            "--port",
            "9000",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("/etc/papi.toml"));
        assert_eq!(cli.max_concurrent, Some(2));
        assert!(matches!(cli.processor, Some(ProcessorArg::Download)));
        assert!(matches!(cli.command, Command::Serve { port: Some(9000) }));
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["papi", "serve"]);
        assert_eq!(cli.config, PathBuf::from("papi.toml"));
        assert!(!cli.verbose);
        assert!(cli.processor.is_none());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
