//! Admission chain every command passes before its handler runs.
//!
//! Stages run in order. The first stage that does not return
//! `Verdict::Continue` decides the outcome.

use crate::allow_list::AllowList;
use crate::command::Command;
use crate::error::CommandError;
use crate::flood_gate::FloodGate;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// Drop silently, no reply.
    Drop(CommandError),
    /// Refuse with a reply.
    Reject(CommandError),
}

/// Context a stage sees for one inbound command.
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    pub chat_id: i64,
    pub command: &'a Command,
    pub now: Instant,
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn inspect(&self, admission: &Admission<'_>) -> Verdict;
}

/// Global flood protection. Every command counts.
pub struct FloodStage {
    gate: Arc<Mutex<FloodGate>>,
}

impl FloodStage {
    pub fn new(gate: Arc<Mutex<FloodGate>>) -> Self {
        Self { gate }
    }
}

impl Stage for FloodStage {
    fn name(&self) -> &'static str {
        "flood"
    }

    fn inspect(&self, admission: &Admission<'_>) -> Verdict {
        if self.gate.lock().admit_at(admission.now) {
            Verdict::Continue
        } else {
            Verdict::Drop(CommandError::RateLimited)
        }
    }
}

/// Restricts board-changing commands to allow-listed chats.
pub struct AllowListStage {
    allow_list: AllowList,
}

impl AllowListStage {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }
}

impl Stage for AllowListStage {
    fn name(&self) -> &'static str {
        "allow-list"
    }

    fn inspect(&self, admission: &Admission<'_>) -> Verdict {
        if !admission.command.kind.is_restricted() || self.allow_list.check(admission.chat_id) {
            Verdict::Continue
        } else {
            Verdict::Reject(CommandError::NotPermitted(admission.chat_id))
        }
    }
}

#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Stage>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn run(&self, admission: &Admission<'_>) -> Verdict {
        for stage in &self.stages {
            match stage.inspect(admission) {
                Verdict::Continue => {}
                verdict => {
                    log::debug!(
                        "Stage '{}' stopped /{} from chat {}: {:?}",
                        stage.name(),
                        admission.command.kind.name(),
                        admission.chat_id,
                        verdict
                    );
                    return verdict;
                }
            }
        }
        Verdict::Continue
    }
}
