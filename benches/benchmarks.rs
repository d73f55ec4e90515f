//! Benchmark suite for confgate subsystems.
//!
//! This module provides performance benchmarks for:
//! - Schema validation
//! - Configuration diffing
//! - Quality gate runs over generated projects
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

use confgate::config::diff::diff;
use confgate::quality::{CheckOptions, GateConfig, QualityGate, RuleRegistry};
use confgate::Validator;

/// A configuration document with `agents` agent entries.
fn config_with_agents(agents: usize, model: &str) -> Value {
    let agents: serde_json::Map<String, Value> = (0..agents)
        .map(|i| {
            (
                format!("agent-{}", i),
                json!({ "role": format!("role {}", i), "model": model }),
            )
        })
        .collect();
    json!({
        "version": "1.0.0",
        "model": model,
        "agents": agents,
        "skills": ["core/lint", "core/test"],
        "hooks": { "preTask": ["echo start"], "postTask": [] },
        "qualityGate": { "enabled": true, "severity": "warn" }
    })
}

/// Create a temporary project with `count` source files.
fn create_project_with_files(count: usize) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(temp.path().join("src")).expect("Failed to create src");
    for i in 0..count {
        let content: String = (0..40)
            .map(|line| format!("export const value{}_{} = {};\n", i, line, line))
            .collect();
        fs::write(temp.path().join(format!("src/module_{}.ts", i)), content)
            .expect("Failed to write source file");
    }
    temp
}

// ============================================================================
// Validation Benchmarks
// ============================================================================

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");

    for agents in [1, 25, 100] {
        let document = config_with_agents(agents, "sonnet");
        group.throughput(Throughput::Elements(agents as u64));

        for validator in [Validator::new(), Validator::fallback()] {
            group.bench_with_input(
                BenchmarkId::new(validator.backend_name(), agents),
                &document,
                |b, doc| b.iter(|| black_box(validator.validate(black_box(doc), "config"))),
            );
        }
    }

    group.finish();
}

// ============================================================================
// Diff Benchmarks
// ============================================================================

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_diff");

    for agents in [10, 100, 500] {
        let left = config_with_agents(agents, "sonnet");
        let right = config_with_agents(agents, "opus");
        group.throughput(Throughput::Elements(agents as u64));
        group.bench_with_input(
            BenchmarkId::new("agents", agents),
            &(left, right),
            |b, (l, r)| b.iter(|| black_box(diff(black_box(l), black_box(r)))),
        );
    }

    group.finish();
}

// ============================================================================
// Gate Benchmarks
// ============================================================================

fn bench_gate_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_run");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let registry = RuleRegistry::with_builtins();

    for size in [10, 50, 100] {
        let temp_dir = create_project_with_files(size);
        let gate = QualityGate::with_config(temp_dir.path(), GateConfig::default(), &registry)
            .with_reporters(Vec::new());

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("builtin_rules", size), |b| {
            b.iter(|| black_box(runtime.block_on(gate.check(CheckOptions::new()))))
        });
    }

    group.finish();
}

criterion_group!(validation_benches, bench_validation);
criterion_group!(diff_benches, bench_diff);
criterion_group!(gate_benches, bench_gate_run);

criterion_main!(validation_benches, diff_benches, gate_benches);
