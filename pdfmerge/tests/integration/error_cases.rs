//! Integration tests for error handling and edge cases.

use pdfmerge::MergeError;
use pdfmerge::merge::{CancellationToken, MergeInput, MergeRequest, Merger};
use pdfmerge::pdf::PdfError;
use pdfmerge::validation::Validator;
use tempfile::TempDir;

use crate::common::{Fixture, create_pdf};

async fn merge(request: &MergeRequest) -> pdfmerge::Result<()> {
    Merger::new()
        .merge(request, &CancellationToken::new())
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_error_nonexistent_input() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 1);
    let missing = temp_dir.path().join("missing.pdf");
    let output = temp_dir.path().join("out.pdf");

    let err = merge(&MergeRequest::to_file(
        vec![MergeInput::all(&a), MergeInput::all(&missing)],
        &output,
    ))
    .await
    .unwrap_err();

    assert!(matches!(err, MergeError::FileNotFound { ref path } if *path == missing));
    assert_eq!(err.exit_code(), 2);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_error_empty_input_list() {
    let err = merge(&MergeRequest::to_memory(Vec::new())).await.unwrap_err();
    assert!(matches!(err, MergeError::NoFilesToMerge));
}

#[tokio::test]
async fn test_error_not_a_pdf() {
    let temp_dir = TempDir::new().unwrap();
    let text = temp_dir.path().join("notes.pdf");
    std::fs::write(&text, b"just some text").unwrap();

    let err = merge(&MergeRequest::to_memory(vec![MergeInput::all(&text)]))
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::NotAPdf { .. }));
}

#[tokio::test]
async fn test_error_directory_input() {
    let temp_dir = TempDir::new().unwrap();
    let err = merge(&MergeRequest::to_memory(vec![MergeInput::all(temp_dir.path())]))
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::NotAFile { .. }));
}

#[tokio::test]
async fn test_error_truncated_pdf() {
    let temp_dir = TempDir::new().unwrap();
    let bytes = Fixture::new("A", 2).to_bytes();
    let truncated = temp_dir.path().join("truncated.pdf");
    std::fs::write(&truncated, &bytes[..bytes.len() / 3]).unwrap();

    let err = merge(&MergeRequest::to_memory(vec![MergeInput::all(&truncated)]))
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::InvalidPdf { .. }), "got {err:?}");
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_error_encrypted_pdf() {
    let temp_dir = TempDir::new().unwrap();
    let locked = Fixture::new("A", 1).encrypted().write(temp_dir.path(), "locked.pdf");

    let err = merge(&MergeRequest::to_memory(vec![MergeInput::all(&locked)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MergeError::InvalidPdf {
            source: PdfError::Encrypted,
            ..
        }
    ));
}

#[tokio::test]
async fn test_error_page_out_of_range_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = create_pdf(temp_dir.path(), "b.pdf", "B", 2);
    let output = temp_dir.path().join("out.pdf");

    let err = merge(&MergeRequest::to_file(
        vec![MergeInput::all(&a), MergeInput::new(&b, "2-4").unwrap()],
        &output,
    ))
    .await
    .unwrap_err();

    match &err {
        MergeError::InvalidPageRange { path, source } => {
            assert_eq!(*path, b);
            assert!(source.is_bounds());
        }
        other => panic!("expected InvalidPageRange, got {other:?}"),
    }
    assert!(!output.exists());
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_error_malformed_range_expression() {
    for expression in ["1--2", "0", "a-b", "3,", "-2"] {
        let err = MergeInput::new("doc.pdf", expression).unwrap_err();
        match err {
            MergeError::InvalidPageRange { source, .. } => {
                assert!(source.is_syntax(), "{expression} should be a syntax error")
            }
            other => panic!("expected InvalidPageRange, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_error_output_exists_without_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 1);
    let output = temp_dir.path().join("out.pdf");
    std::fs::write(&output, b"original").unwrap();

    let err = merge(&MergeRequest::to_file(vec![MergeInput::all(&a)], &output))
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::OutputExists { .. }));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(std::fs::read(&output).unwrap(), b"original");
}

#[tokio::test]
async fn test_cancelled_request_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);
    let output = temp_dir.path().join("out.pdf");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Merger::new()
        .merge(
            &MergeRequest::to_file(vec![MergeInput::all(&a), MergeInput::all(&a)], &output),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::Cancelled));
    assert!(err.is_fatal());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_failed_request_does_not_affect_concurrent_one() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);
    let good_output = temp_dir.path().join("good.pdf");

    let merger = Merger::new();
    let cancel = CancellationToken::new();
    let good = MergeRequest::to_file(vec![MergeInput::all(&a), MergeInput::all(&a)], &good_output);
    let bad = MergeRequest::to_memory(vec![MergeInput::new(&a, "9").unwrap()]);

    let (ok, failed) = tokio::join!(merger.merge(&good, &cancel), merger.merge(&bad, &cancel));
    assert_eq!(ok.unwrap().statistics.total_pages, 4);
    assert!(failed.is_err());
    assert!(good_output.is_file());
}

#[tokio::test]
async fn test_validate_files_mixed() {
    let temp_dir = TempDir::new().unwrap();
    let good = create_pdf(temp_dir.path(), "good.pdf", "A", 3);
    let locked = Fixture::new("L", 1).encrypted().write(temp_dir.path(), "locked.pdf");
    let missing = temp_dir.path().join("missing.pdf");

    let report = Validator::new()
        .validate_files(&[good, locked, missing])
        .await;

    assert_eq!(report.files_valid, 1);
    assert_eq!(report.files_failed, 2);
    assert_eq!(report.total_pages, 3);
    assert!(report.files[1].reason.as_deref().unwrap().contains("encrypted"));
}

#[tokio::test]
async fn test_file_info() {
    let temp_dir = TempDir::new().unwrap();
    let path = Fixture::new("A", 4).version("1.6").compressed().write(temp_dir.path(), "a.pdf");

    let info = Validator::new().file_info(&path).await.unwrap();
    assert_eq!(info.name, "a.pdf");
    assert_eq!(info.page_count, 4);
    assert_eq!(info.version, "1.6");
    assert_eq!(info.page_dimensions, Some((612.0, 792.0)));
}
