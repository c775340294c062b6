// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    exact = { "document.ingested", "document.ingested", true },
    exact_miss = { "document.ingested", "document.processed", false },
    single_wildcard = { "shard.*.created", "shard.claims.created", true },
    wildcard_wrong_depth = { "shard.*.created", "shard.created", false },
    wildcard_extra_depth = { "shard.*.created", "shard.a.b.created", false },
    trailing_wildcard = { "document.*", "document.failed", true },
    trailing_wildcard_deep = { "document.*", "document.a.b", false },
    rest = { "stage.**", "stage.extract.completed", true },
    rest_single = { "stage.**", "stage.extract", true },
    rest_empty_suffix = { "stage.**", "stage", false },
    all = { "**", "anything.at.all", true },
)]
fn matching(pattern: &str, topic: &str, expected: bool) {
    let p = TopicPattern::parse(pattern).unwrap();
    assert_eq!(p.matches(topic), expected, "{pattern} vs {topic}");
}

#[test]
fn rejects_empty() {
    assert_eq!(TopicPattern::parse(""), Err(TopicPatternError::Empty));
}

#[test]
fn rejects_interior_rest() {
    assert!(matches!(
        TopicPattern::parse("a.**.b"),
        Err(TopicPatternError::RestNotLast(_))
    ));
}

#[test]
fn display_round_trips() {
    let p = TopicPattern::parse("stage.*.completed").unwrap();
    assert_eq!(p.to_string(), "stage.*.completed");
}
