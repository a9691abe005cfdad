use crate::engines::genetics::Genome;
use log::{info, warn};
use std::sync::mpsc::Sender;

/// What one generation produced, reported after its hall of fame update.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub generation: usize,
    /// Lowest fitness in the generation; `+inf` when nothing scored.
    pub best_fitness: f64,
    /// Mean over finite fitness values only.
    pub mean_fitness: Option<f64>,
    pub evaluated: usize,
    /// Members whose fitness was not finite (NaN scores are stored as `+inf`).
    pub non_finite: usize,
    pub hall_of_fame_size: usize,
}

impl GenerationSummary {
    pub fn from_evaluated(generation: usize, evaluated: &[Genome], hall_of_fame_size: usize) -> Self {
        let scores: Vec<f64> = evaluated.iter().filter_map(Genome::fitness).collect();
        let finite: Vec<f64> = scores.iter().copied().filter(|f| f.is_finite()).collect();
        let mean_fitness = if finite.is_empty() {
            None
        } else {
            Some(finite.iter().sum::<f64>() / finite.len() as f64)
        };

        Self {
            generation,
            best_fitness: scores.iter().copied().fold(f64::INFINITY, f64::min),
            mean_fitness,
            evaluated: evaluated.len(),
            non_finite: scores.len() - finite.len(),
            hall_of_fame_size,
        }
    }
}

/// Observer for [`EvolutionEngine::run`](super::EvolutionEngine::run).
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, summary: &GenerationSummary);
}

impl<C: ProgressCallback + ?Sized> ProgressCallback for &mut C {
    fn on_generation_start(&mut self, generation: usize) {
        (**self).on_generation_start(generation);
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        (**self).on_generation_complete(summary);
    }
}

pub struct LoggingProgressCallback;

impl ProgressCallback for LoggingProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        info!("Generation {} starting...", generation + 1);
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        match summary.mean_fitness {
            Some(mean) => info!(
                "Generation {} complete. Best fitness: {:.6}, mean: {:.6}, Hall of Fame size: {}",
                summary.generation + 1,
                summary.best_fitness,
                mean,
                summary.hall_of_fame_size
            ),
            None => info!(
                "Generation {} complete. No finite fitness, Hall of Fame size: {}",
                summary.generation + 1,
                summary.hall_of_fame_size
            ),
        }
        if summary.non_finite > 0 {
            warn!(
                "  {}/{} genomes had non-finite fitness",
                summary.non_finite, summary.evaluated
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete(GenerationSummary),
}

/// Forwards progress to another thread. A dropped receiver is ignored.
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(summary.clone()));
    }
}
