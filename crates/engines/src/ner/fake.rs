// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted NER model for tests.

use super::{NerModel, RawMention};
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;

pub struct FakeNer {
    mentions: Mutex<Vec<RawMention>>,
}

impl FakeNer {
    pub fn new(mentions: Vec<RawMention>) -> Self {
        Self {
            mentions: Mutex::new(mentions),
        }
    }
}

#[async_trait]
impl NerModel for FakeNer {
    fn name(&self) -> &str {
        "fake-ner"
    }

    async fn extract(&self, _text: &str) -> Result<Vec<RawMention>, EngineError> {
        Ok(self.mentions.lock().clone())
    }
}
