//! Background pattern generation with status messages over a channel.

use crate::buffer::PixelBuffer;
use crate::pipeline::{run_pipeline_with_progress, PatternConfig, PatternResult, Stage};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

#[derive(Debug, Clone)]
pub enum PipelineStatus {
    Begin,
    Progress(Stage),
    Done(Box<PatternResult>),
    Error(String),
}

impl PipelineStatus {
    /// `Done` and `Error` are the last message a job sends.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Done(_) | PipelineStatus::Error(_))
    }
}

/// Run the pipeline on its own thread, off the rayon pool. The receiver sees
/// `Begin`, one `Progress` per stage, then exactly one of `Done` or `Error`.
/// Dropping the receiver does not cancel the job; its remaining messages are
/// discarded.
pub fn spawn_pipeline(buffer: PixelBuffer, config: PatternConfig) -> Receiver<PipelineStatus> {
    let (tx, rx) = channel();
    let spawn_tx = tx.clone();
    let spawned = thread::Builder::new()
        .name("jewelstitch-pipeline".into())
        .spawn(move || run_job(buffer, &config, &tx));
    if let Err(e) = spawned {
        log::warn!("Failed to start pattern worker: {}", e);
        let _ = spawn_tx.send(PipelineStatus::Error(format!(
            "Failed to start pattern worker: {}",
            e
        )));
    }
    rx
}

fn run_job(buffer: PixelBuffer, config: &PatternConfig, tx: &Sender<PipelineStatus>) {
    let _ = tx.send(PipelineStatus::Begin);
    let outcome = run_pipeline_with_progress(buffer, config, |stage| {
        let _ = tx.send(PipelineStatus::Progress(stage));
    });
    let status = match outcome {
        Ok(result) => PipelineStatus::Done(Box::new(result)),
        Err(e) => {
            log::warn!("Background pattern job failed: {}", e);
            PipelineStatus::Error(e.to_string())
        }
    };
    let _ = tx.send(status);
}
