//! One baguette fact per day.
//!
//! The dispenser caches the fact it served. Until `reset` is called (the
//! midnight task does this) every further request gets `AlreadyServed`.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactOutcome {
    Served(String),
    AlreadyServed,
    NoFacts,
}

#[derive(Debug, Default)]
pub struct FactDispenser {
    served: Option<String>,
}

/// Read facts from a text file, one per line. A missing file has no facts.
pub fn load_facts(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        log::warn!("Fact file {:?} not found", path);
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts from {:?}", path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

impl FactDispenser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_served(&self) -> bool {
        self.served.is_some()
    }

    /// Pick today's fact from `facts`, unless one was already served.
    pub fn serve<R: Rng + ?Sized>(&mut self, facts: &[String], rng: &mut R) -> FactOutcome {
        if self.served.is_some() {
            return FactOutcome::AlreadyServed;
        }
        match facts.choose(rng) {
            Some(fact) => {
                self.served = Some(fact.clone());
                FactOutcome::Served(fact.clone())
            }
            None => FactOutcome::NoFacts,
        }
    }

    pub fn reset(&mut self) {
        self.served = None;
    }
}
