//! Integration tests for dry-run planning.

use pdfmerge::MergeError;
use pdfmerge::config::{Config, OverwriteMode};
use pdfmerge::merge::{MergeInput, MergeRequest, Merger};
use tempfile::TempDir;

use crate::common::create_pdf;

#[tokio::test]
async fn test_plan_does_not_create_output() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = create_pdf(temp_dir.path(), "b.pdf", "B", 2);
    let output = temp_dir.path().join("out.pdf");

    let plan = Merger::new()
        .plan(&MergeRequest::to_file(
            vec![MergeInput::new(&a, "3,1").unwrap(), MergeInput::all(&b)],
            &output,
        ))
        .await
        .unwrap();

    assert!(!output.exists(), "Output file should not be created in dry run");
    assert_eq!(plan.total_pages, 4);
    assert_eq!(plan.inputs[0].page_count, 3);
    assert_eq!(plan.inputs[0].selected, vec![3, 1]);
    assert_eq!(plan.inputs[1].selected, vec![1, 2]);
    assert_eq!(plan.inputs[1].size, std::fs::metadata(&b).unwrap().len());
}

#[tokio::test]
async fn test_plan_reports_out_of_range() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);

    let err = Merger::new()
        .plan(&MergeRequest::to_memory(vec![MergeInput::new(&a, "1-5").unwrap()]))
        .await
        .unwrap_err();

    match err {
        MergeError::InvalidPageRange { path, source } => {
            assert_eq!(path, a);
            assert!(source.is_bounds());
        }
        other => panic!("expected InvalidPageRange, got {other:?}"),
    }
}

#[tokio::test]
async fn test_plan_validates_all_inputs() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 1);
    let missing = temp_dir.path().join("missing.pdf");

    let err = Merger::new()
        .plan(&MergeRequest::to_memory(vec![
            MergeInput::all(&a),
            MergeInput::all(&missing),
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::FileNotFound { ref path } if *path == missing));
}

#[tokio::test]
async fn test_plan_respects_existing_output() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 1);
    let output = temp_dir.path().join("exists.pdf");
    std::fs::write(&output, b"keep me").unwrap();

    let config = Config {
        inputs: vec![MergeInput::all(&a)],
        output: output.clone(),
        dry_run: true,
        verbose: false,
        quiet: true,
        overwrite_mode: OverwriteMode::NoClobber,
        jobs: Some(1),
        recent_store: None,
    };
    config.validate().unwrap();

    let merger = config.merger().unwrap();
    let err = merger.plan(&config.request(true)).await.unwrap_err();
    assert!(matches!(err, MergeError::OutputExists { .. }));

    let mut forced = config.clone();
    forced.overwrite_mode = OverwriteMode::Force;
    let plan = merger.plan(&forced.request(false)).await.unwrap();
    assert_eq!(plan.total_pages, 1);
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
}

#[tokio::test]
async fn test_plan_json_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);

    let plan = Merger::new()
        .plan(&MergeRequest::to_memory(vec![MergeInput::new(&a, "3-2").unwrap()]))
        .await
        .unwrap();

    let json = pdfmerge::output::to_json(&plan).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["totalPages"], 2);
    assert_eq!(value["inputs"][0]["pageCount"], 3);
    assert_eq!(value["inputs"][0]["selected"], serde_json::json!([3, 2]));
}
