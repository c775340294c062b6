// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    cpu_light = { ResourceTier::CpuLight, false },
    cpu_ner = { ResourceTier::CpuNer, false },
    cpu_extract = { ResourceTier::CpuExtract, false },
    gpu_embed = { ResourceTier::GpuEmbed, true },
    gpu_paddle = { ResourceTier::GpuPaddle, true },
    gpu_qwen = { ResourceTier::GpuQwen, true },
)]
fn gpu_tiers(tier: ResourceTier, gpu: bool) {
    assert_eq!(tier.is_gpu(), gpu);
}

#[test]
fn tier_serde_uses_kebab_names() {
    let json = serde_json::to_string(&ResourceTier::GpuEmbed).unwrap();
    assert_eq!(json, "\"gpu-embed\"");
    let back: ResourceTier = serde_json::from_str("\"cpu-light\"").unwrap();
    assert_eq!(back, ResourceTier::CpuLight);
}

#[test]
fn builder_clamps_concurrency() {
    let pool = PoolDef::new("x", ResourceTier::CpuLight).max_concurrency(0);
    assert_eq!(pool.max_concurrency, 1);
}

#[test]
fn default_pools_cover_every_stage() {
    let pools = default_pools();
    let names: Vec<&str> = pools.iter().map(|p| p.name.as_str()).collect();
    for stage in ["extract", "normalize", "ner", "chunk", "embed", "ocr"] {
        assert!(names.contains(&stage), "missing pool {stage}");
    }
}

#[test]
fn pool_def_round_trips() {
    let pool = PoolDef::new("embed", ResourceTier::GpuEmbed)
        .max_concurrency(2)
        .job_timeout(Duration::from_secs(300));
    let json = serde_json::to_string(&pool).unwrap();
    let back: PoolDef = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "embed");
    assert_eq!(back.job_timeout, Duration::from_secs(300));
}
