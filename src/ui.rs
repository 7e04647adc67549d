//! Interface de terminal do PAPI — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! um job submetido pelo subcomando `run`.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{Job, JobState};

/// Indicador visual de progresso para um job no terminal.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com a origem do job.
    pub fn start(source_url: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{}: {source_url}", JobState::Queued));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para refletir o estado atual.
    pub fn update(&self, job: &Job) {
        self.pb
            .set_message(format!("{}: {}", job.state, job.input.source_url));
    }

    /// Finaliza o spinner e exibe o resultado final do job.
    pub fn complete(&self, job: &Job) {
        self.pb.finish_and_clear();
        match (&job.result, &job.error) {
            (Some(artifact), _) => println!(
                "  {} Job {} done: {}",
                self.green.apply_to("✓"),
                job.id,
                artifact.location.display()
            ),
            (None, Some(failure)) => {
                println!("  {} Job {} failed: {failure}", self.red.apply_to("✗"), job.id)
            }
            (None, None) => println!(
                "  {} Job {} stopped in {}",
                self.yellow.apply_to("?"),
                job.id,
                job.state
            ),
        }
    }

    /// Imprime o snapshot do job em JSON com estilo colorido.
    pub fn print_job(&self, job: &Job) {
        let style = match job.state {
            JobState::Done => &self.green,
            JobState::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Job ───"));
        println!("{}", serde_json::to_string_pretty(job).unwrap_or_default());
    }
}
