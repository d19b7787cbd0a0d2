//! Test: the `simdex` binary end to end
//!
//! Each test writes its inputs and a settings file into a temp workspace and
//! runs the compiled binary against them.

use std::path::Path;
use std::process::{Command, Output};

use crate::common::random_vectors;
use simdex::clustering::Codebook;
use simdex::hashing::{LshBank, LshParams};
use tempfile::TempDir;

fn run_simdex(workspace: &Path, settings: &str, args: &[&str]) -> Output {
    let config = workspace.join("settings.toml");
    std::fs::write(&config, settings).unwrap();
    Command::new(env!("CARGO_BIN_EXE_simdex"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .current_dir(workspace)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_vectors(path: &Path, vectors: &[Vec<f64>]) {
    let lines: Vec<String> = vectors
        .iter()
        .map(|v| v.iter().map(f64::to_string).collect::<Vec<_>>().join(", "))
        .collect();
    std::fs::write(path, lines.join("\n")).unwrap();
}

#[test]
fn test_aggregate_uses_configured_vlad_levels() {
    let temp_dir = TempDir::new().unwrap();
    let codebook_path = temp_dir.path().join("codebook-2.dat");
    Codebook::from_means(vec![vec![0.0, 0.0], vec![10.0, 10.0]])
        .unwrap()
        .write_clusters(&codebook_path)
        .unwrap();
    let features_path = temp_dir.path().join("features.txt");
    write_vectors(
        &features_path,
        &[vec![1.0, 0.0], vec![0.0, 1.0], vec![9.0, 10.0]],
    );

    let output = run_simdex(
        temp_dir.path(),
        "[aggregation]\nvlad_quantization_levels = 0\n",
        &[
            "aggregate",
            "--codebook",
            codebook_path.to_str().unwrap(),
            "--input",
            features_path.to_str().unwrap(),
            "--tokens",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("BOVW: v0 v0 v1"), "{stdout}");
    assert!(stdout.contains("VLAD (0 levels)"), "{stdout}");
}

#[test]
fn test_hash_search_finds_exact_match() {
    let temp_dir = TempDir::new().unwrap();
    let vectors = random_vectors(20, 4, 1.0, 71);
    let input = temp_dir.path().join("vectors.txt");
    write_vectors(&input, &vectors);

    let bank_path = temp_dir.path().join("lsh.bank");
    let params = LshParams {
        dimensions: 4,
        num_function_bundles: 8,
        bin_length: 4.0,
        dilation: 1.0,
    };
    LshBank::generate(&params, Some(3))
        .unwrap()
        .write(&bank_path)
        .unwrap();

    let query: Vec<String> = vectors[5].iter().map(f64::to_string).collect();
    let output = run_simdex(
        temp_dir.path(),
        "debug = true\n\n[lsh]\nbin_length = 4.0\n",
        &[
            "search",
            "--input",
            input.to_str().unwrap(),
            "--query",
            &query.join(","),
            "--bank",
            bank_path.to_str().unwrap(),
            "--kind",
            "lsh",
            "--limit",
            "3",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().unwrap();
    assert_eq!(first.split_whitespace().next(), Some("5"), "{stdout}");
    assert!(stdout.lines().count() <= 3);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEBUG: hashed 20 vectors into 'cli_lsh'"), "{stderr}");
}

#[test]
fn test_errors_carry_status_and_suggestions() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_simdex(
        temp_dir.path(),
        "",
        &["search", "--input", "missing.txt", "--query", "1,2"],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error [FILE_READ_ERROR]"), "{stderr}");
    assert!(stderr.contains("Suggestions:"), "{stderr}");
    assert!(!stderr.contains("DEBUG:"));

    let vectors = temp_dir.path().join("few.txt");
    write_vectors(&vectors, &random_vectors(10, 2, 1.0, 72));
    let output = run_simdex(
        temp_dir.path(),
        "",
        &["search", "--input", vectors.to_str().unwrap(), "--query", "0,0"],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error [CORPUS_TOO_SMALL]"), "{stderr}");
}
