//! Integration tests for basic PDF merging operations.

use pdfmerge::merge::{
    CancellationToken, MergeInput, MergeOutput, MergeRequest, Merger, merge_to_bytes,
};
use pdfmerge::pdf::Document;
use pdfmerge::store::RecentFiles;
use rstest::rstest;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{
    Fixture, assert_pages_self_contained, assert_references_resolve, create_pdf, load, page_texts,
};

async fn merge_file(request: &MergeRequest) -> Vec<u8> {
    let outcome = Merger::new()
        .merge(request, &CancellationToken::new())
        .await
        .expect("merge should succeed");
    match outcome.output {
        MergeOutput::File(path) => std::fs::read(path).unwrap(),
        MergeOutput::Memory(bytes) => bytes,
    }
}

#[tokio::test]
async fn test_merge_two_files_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = create_pdf(temp_dir.path(), "b.pdf", "B", 2);
    let output = temp_dir.path().join("merged.pdf");

    let request = MergeRequest::to_file(vec![MergeInput::all(&a), MergeInput::all(&b)], &output);
    let outcome = Merger::new()
        .merge(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.output, MergeOutput::File(output.clone()));
    assert_eq!(outcome.statistics.files_merged, 2);
    assert_eq!(outcome.statistics.total_pages, 5);
    assert!(!outcome.statistics.copied_verbatim);

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(outcome.statistics.output_size, bytes.len() as u64);
    assert_eq!(page_texts(&bytes), vec!["A1", "A2", "A3", "B1", "B2"]);
    assert_references_resolve(&bytes);
    assert_pages_self_contained(&bytes);
}

#[rstest]
#[case("3,1", "2-1", &["A3", "A1", "B2", "B1"])]
#[case("1-3", "all", &["A1", "A2", "A3", "B1", "B2"])]
#[case("2, 2", "2", &["A2", "A2", "B2"])]
#[case("3-1", "1", &["A3", "A2", "A1", "B1"])]
#[tokio::test]
async fn test_merge_page_ranges(
    #[case] range_a: &str,
    #[case] range_b: &str,
    #[case] expected: &[&str],
) {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = create_pdf(temp_dir.path(), "b.pdf", "B", 2);

    let request = MergeRequest::to_memory(vec![
        MergeInput::new(&a, range_a).unwrap(),
        MergeInput::new(&b, range_b).unwrap(),
    ]);
    let bytes = merge_file(&request).await;

    assert_eq!(page_texts(&bytes), expected);
    assert_references_resolve(&bytes);
}

#[tokio::test]
async fn test_single_file_all_pages_is_copied_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 4);
    let output = temp_dir.path().join("copy.pdf");

    let outcome = Merger::new()
        .merge(
            &MergeRequest::to_file(vec![MergeInput::all(&a)], &output),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(outcome.statistics.copied_verbatim);
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&a).unwrap());
}

#[tokio::test]
async fn test_single_file_with_range_is_rebuilt() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 4);

    let (bytes, stats) = merge_to_bytes(vec![MergeInput::new(&a, "2-3").unwrap()])
        .await
        .unwrap();

    assert!(!stats.copied_verbatim);
    assert_eq!(stats.total_pages, 2);
    assert_eq!(page_texts(&bytes), vec!["A2", "A3"]);
}

#[tokio::test]
async fn test_merge_compressed_inputs() {
    let temp_dir = TempDir::new().unwrap();
    let a = Fixture::new("Zip", 2).compressed().write(temp_dir.path(), "a.pdf");
    let b = create_pdf(temp_dir.path(), "b.pdf", "Raw", 1);

    let (bytes, _) = merge_to_bytes(vec![MergeInput::all(&a), MergeInput::all(&b)])
        .await
        .unwrap();

    assert_eq!(page_texts(&bytes), vec!["Zip1", "Zip2", "Raw1"]);
    assert_references_resolve(&bytes);
}

#[tokio::test]
async fn test_merge_same_file_twice() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);

    let (bytes, stats) = merge_to_bytes(vec![MergeInput::all(&a), MergeInput::all(&a)])
        .await
        .unwrap();

    assert_eq!(stats.total_pages, 4);
    assert_eq!(page_texts(&bytes), vec!["A1", "A2", "A1", "A2"]);
    assert_references_resolve(&bytes);
}

#[tokio::test]
async fn test_output_version_is_highest_input_version() {
    let temp_dir = TempDir::new().unwrap();
    let a = Fixture::new("A", 1).version("1.4").write(temp_dir.path(), "a.pdf");
    let b = Fixture::new("B", 1).version("1.7").write(temp_dir.path(), "b.pdf");

    let (bytes, _) = merge_to_bytes(vec![MergeInput::all(&a), MergeInput::all(&b)])
        .await
        .unwrap();

    assert!(bytes.starts_with(b"%PDF-1.7"));
    assert_eq!(load(&bytes).version, "1.7");
}

#[tokio::test]
async fn test_output_reads_back_with_own_parser() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = Fixture::new("B", 2).compressed().write(temp_dir.path(), "b.pdf");

    let (bytes, stats) = merge_to_bytes(vec![
        MergeInput::new(&a, "2").unwrap(),
        MergeInput::all(&b),
    ])
    .await
    .unwrap();

    let doc = Document::parse(&bytes).unwrap();
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.objects().len(), stats.objects_written);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 3);
    let b = create_pdf(temp_dir.path(), "b.pdf", "B", 2);
    let out1 = temp_dir.path().join("one.pdf");
    let out2 = temp_dir.path().join("two.pdf");

    let merger = Merger::new();
    let cancel = CancellationToken::new();
    let first = MergeRequest::to_file(vec![MergeInput::all(&a), MergeInput::all(&b)], &out1);
    let second = MergeRequest::to_file(
        vec![MergeInput::new(&b, "2-1").unwrap(), MergeInput::new(&a, "1").unwrap()],
        &out2,
    );

    let (r1, r2) = tokio::join!(merger.merge(&first, &cancel), merger.merge(&second, &cancel));
    r1.unwrap();
    r2.unwrap();

    assert_eq!(
        page_texts(&std::fs::read(&out1).unwrap()),
        vec!["A1", "A2", "A3", "B1", "B2"]
    );
    assert_eq!(page_texts(&std::fs::read(&out2).unwrap()), vec!["B2", "B1", "A1"]);
}

#[tokio::test]
async fn test_overwrite_replaces_existing_output() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);
    let output = temp_dir.path().join("out.pdf");
    std::fs::write(&output, b"old contents").unwrap();

    let request = MergeRequest::to_file(vec![MergeInput::new(&a, "2").unwrap()], &output)
        .overwrite(true);
    let bytes = merge_file(&request).await;

    assert_eq!(page_texts(&bytes), vec!["A2"]);
}

#[tokio::test]
async fn test_output_directory_is_created() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 1);
    let output = temp_dir.path().join("nested").join("dir").join("out.pdf");

    merge_file(&MergeRequest::to_file(
        vec![MergeInput::all(&a), MergeInput::all(&a)],
        &output,
    ))
    .await;

    assert!(output.is_file());
}

#[tokio::test]
async fn test_successful_merge_is_recorded_in_recent_files() {
    let temp_dir = TempDir::new().unwrap();
    let a = create_pdf(temp_dir.path(), "a.pdf", "A", 2);
    let output = temp_dir.path().join("out.pdf");
    let store = Arc::new(RecentFiles::open(temp_dir.path().join("recent.json")).unwrap());

    Merger::new()
        .with_recent_store(Arc::clone(&store))
        .merge(
            &MergeRequest::to_file(vec![MergeInput::all(&a), MergeInput::all(&a)], &output),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let entries = RecentFiles::open(temp_dir.path().join("recent.json"))
        .unwrap()
        .list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, output);
    assert_eq!(entries[0].page_count, 4);
    assert_eq!(entries[0].size, std::fs::metadata(&output).unwrap().len());
}
