//! Per-stage progress for a personalization run.
//!
//! Stages move strictly forward: `pending -> active -> completed`. A skipped
//! stage goes straight to `completed`. Only `reset` moves a stage back.

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FetchingAnalysis,
    PersonalizingCv,
    Analyzing,
    Ranking,
    GeneratingLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageProgress {
    pub stage: Stage,
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub state: PipelineState,
    pub stages: Vec<StageProgress>,
}

impl ProgressSnapshot {
    fn new(stages: &[Stage]) -> Self {
        Self {
            state: PipelineState::Idle,
            stages: stages
                .iter()
                .map(|&stage| StageProgress {
                    stage,
                    status: StageStatus::Pending,
                })
                .collect(),
        }
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|p| p.stage == stage)
            .map(|p| p.status)
    }

    fn derive_state(&mut self) {
        self.state = if self.stages.iter().all(|p| p.status == StageStatus::Pending) {
            PipelineState::Idle
        } else if self.stages.iter().all(|p| p.status == StageStatus::Completed) {
            PipelineState::Done
        } else {
            PipelineState::Running
        };
    }
}

/// Publishes progress snapshots to any number of watchers.
pub struct ProgressTracker {
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new(stages: &[Stage]) -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::new(stages));
        Self { tx }
    }

    /// `fetching-analysis -> personalizing-cv`
    pub fn basic() -> Self {
        Self::new(&[Stage::FetchingAnalysis, Stage::PersonalizingCv])
    }

    /// `analyzing -> ranking -> (personalizing-cv | generating-letter)`
    pub fn full() -> Self {
        Self::new(&[
            Stage::Analyzing,
            Stage::Ranking,
            Stage::PersonalizingCv,
            Stage::GeneratingLetter,
        ])
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Logs each published snapshot for `run_id` until the tracker is dropped.
    /// Snapshots published in quick succession may be coalesced.
    pub fn spawn_logger(&self, run_id: Uuid) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let stages = snapshot
                    .stages
                    .iter()
                    .map(|p| format!("{:?}={:?}", p.stage, p.status))
                    .collect::<Vec<_>>()
                    .join(", ");
                debug!(%run_id, state = ?snapshot.state, "Progress: {stages}");
            }
        })
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.tx.borrow().status(stage)
    }

    pub fn start(&self, stage: Stage) -> bool {
        self.advance(stage, StageStatus::Active)
    }

    pub fn complete(&self, stage: Stage) -> bool {
        self.advance(stage, StageStatus::Completed)
    }

    /// Marks a stage done without running it.
    pub fn skip(&self, stage: Stage) -> bool {
        self.advance(stage, StageStatus::Completed)
    }

    pub fn reset(&self) {
        self.tx.send_modify(|snapshot| {
            for progress in &mut snapshot.stages {
                progress.status = StageStatus::Pending;
            }
            snapshot.derive_state();
        });
    }

    fn advance(&self, stage: Stage, to: StageStatus) -> bool {
        let mut moved = false;
        self.tx.send_if_modified(|snapshot| {
            let Some(progress) = snapshot.stages.iter_mut().find(|p| p.stage == stage) else {
                return false;
            };
            if progress.status >= to {
                return false;
            }
            progress.status = to;
            snapshot.derive_state();
            moved = true;
            true
        });
        if !moved {
            warn!(stage = ?stage, to = ?to, "Ignoring progress transition that does not move forward");
        }
        moved
    }
}
