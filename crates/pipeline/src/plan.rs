// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The declarative pipeline plan.
//!
//! The plan binds stages to pools and defines succession; the dispatcher
//! reads it and reacts to completion events, so extensions can install a
//! different plan without touching stage code.

use serde::{Deserialize, Serialize};

/// One stage's place in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBinding {
    pub stage: String,
    pub pool: String,
    /// Enqueue priority for this stage's jobs
    pub priority: i32,
    /// Mandatory stages gate document completion
    pub mandatory: bool,
    /// Whether this stage needs an accelerator pool; the dispatcher
    /// refuses cross-placement in either direction
    pub gpu: bool,
}

impl StageBinding {
    fn new(stage: &str, pool: &str, priority: i32, mandatory: bool, gpu: bool) -> Self {
        Self {
            stage: stage.to_string(),
            pool: pool.to_string(),
            priority,
            mandatory,
            gpu,
        }
    }
}

/// Ordered stage chain plus the OCR detour.
///
/// `extract` either chains to `normalize` directly or detours through
/// `ocr` when no embedded text was found; `ocr` rejoins at `normalize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    chain: Vec<StageBinding>,
    ocr: StageBinding,
}

impl PipelinePlan {
    /// The standard document pipeline:
    /// extract → normalize → chunk → ner → embed, with the OCR detour.
    ///
    /// NER runs after chunking so mentions attach to real chunk ids.
    pub fn standard() -> Self {
        Self {
            chain: vec![
                StageBinding::new("extract", "extract", 10, true, false),
                StageBinding::new("normalize", "normalize", 8, true, false),
                StageBinding::new("chunk", "chunk", 6, true, false),
                StageBinding::new("ner", "ner", 4, true, false),
                StageBinding::new("embed", "embed", 2, true, true),
            ],
            ocr: StageBinding::new("ocr", "ocr", 9, false, true),
        }
    }

    pub fn first(&self) -> &StageBinding {
        &self.chain[0]
    }

    pub fn binding(&self, stage: &str) -> Option<&StageBinding> {
        if self.ocr.stage == stage {
            return Some(&self.ocr);
        }
        self.chain.iter().find(|b| b.stage == stage)
    }

    /// The stage that runs after `stage` completes. The OCR detour
    /// rejoins the chain at the stage following extract.
    pub fn successor(&self, stage: &str) -> Option<&StageBinding> {
        if stage == self.ocr.stage {
            return self.chain.iter().skip_while(|b| b.stage != "extract").nth(1);
        }
        let index = self.chain.iter().position(|b| b.stage == stage)?;
        self.chain.get(index + 1)
    }

    pub fn ocr_binding(&self) -> &StageBinding {
        &self.ocr
    }

    pub fn last(&self) -> &StageBinding {
        &self.chain[self.chain.len() - 1]
    }

    /// Stages that must record success before a document is `complete`.
    pub fn mandatory_stages(&self) -> Vec<&str> {
        self.chain
            .iter()
            .filter(|b| b.mandatory)
            .map(|b| b.stage.as_str())
            .collect()
    }

    /// Every binding, chain plus detour.
    pub fn bindings(&self) -> impl Iterator<Item = &StageBinding> {
        self.chain.iter().chain(std::iter::once(&self.ocr))
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
