//! Submission validation, staging, inline analysis and shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use clausewise::config::ServiceConfig;
use clausewise::jobs::{JobStatus, JobStore};
use clausewise::processor::ExtractorRegistry;
use clausewise::service::DEFAULT_JOB_TYPE;
use clausewise::{AnalysisService, SubmitError, Upload};

use common::{blank_upload, contract_text, contract_upload, failing_upload, TestHarness};

#[tokio::test]
async fn test_rejected_submissions_leave_nothing_behind() {
    let h = TestHarness::with_config(|c| c.max_files(2).max_file_size(1024));

    let cases: Vec<(&str, Vec<Upload>)> = vec![
        ("no files", vec![]),
        (
            "missing filename",
            vec![Upload {
                filename: None,
                bytes: b"data".to_vec(),
            }],
        ),
        ("wrong extension", vec![contract_upload("contract.docx")]),
        (
            "too many files",
            vec![
                contract_upload("a.pdf"),
                contract_upload("b.pdf"),
                contract_upload("c.pdf"),
            ],
        ),
        ("too large", vec![Upload::new("big.pdf", vec![b'x'; 1025])]),
    ];

    for (name, uploads) in cases {
        let result = h.service.submit(DEFAULT_JOB_TYPE, uploads).await;
        assert!(result.is_err(), "case '{}' should be rejected", name);
    }

    assert!(h.store.is_empty());
    assert_eq!(h.workspace_count(), 0);
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn test_rejection_reasons() {
    let h = TestHarness::new();

    let err = h.service.submit(DEFAULT_JOB_TYPE, vec![]).await.unwrap_err();
    assert!(matches!(err, SubmitError::NoFiles));

    let err = h
        .service
        .submit(DEFAULT_JOB_TYPE, vec![contract_upload("notes.txt")])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File notes.txt is not a supported document type");

    let four = (0..4).map(|i| contract_upload(&format!("{}.pdf", i))).collect();
    let err = h.service.submit(DEFAULT_JOB_TYPE, four).await.unwrap_err();
    assert!(matches!(err, SubmitError::TooManyFiles { count: 4, max: 3 }));
}

#[tokio::test]
async fn test_service_without_analyzer_refuses_work() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.uploads.temp_root = Some(temp.path().to_path_buf());
    let store = Arc::new(JobStore::new(10, Duration::from_secs(300)));
    let service = AnalysisService::new(&config, store, Arc::new(ExtractorRegistry::new()), None);

    let err = service
        .submit(DEFAULT_JOB_TYPE, vec![contract_upload("a.pdf")])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AnalyzerUnavailable));

    let err = service
        .analyze_sync(vec![contract_upload("a.pdf")])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AnalyzerUnavailable));

    let health = service.health();
    assert_eq!(health.status, "healthy");
    assert!(!health.ai_enabled);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_names_are_sanitized() {
    let h = TestHarness::new();
    let uploads = vec![
        Upload::new("../../etc/lease.pdf", contract_text("Lease").into_bytes()),
        Upload::new("C:\\Users\\me\\nda.PDF", contract_text("NDA").into_bytes()),
    ];

    let id = h.service.submit(DEFAULT_JOB_TYPE, uploads).await.unwrap();
    let view = h.service.wait(id.as_str()).await.unwrap();

    let result = view.result.unwrap();
    assert_eq!(result["files"], serde_json::json!(["lease.pdf", "nda.PDF"]));
    assert_eq!(h.workspace_count(), 0);
}

#[tokio::test]
async fn test_duplicate_names_are_both_analyzed() {
    let h = TestHarness::new();
    let uploads = vec![contract_upload("a.pdf"), contract_upload("a.pdf")];

    let id = h.service.submit(DEFAULT_JOB_TYPE, uploads).await.unwrap();
    let view = h.service.wait(id.as_str()).await.unwrap();

    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.result.unwrap()["total_documents"], 2);
}

#[tokio::test]
async fn test_analyze_sync_returns_report() {
    let h = TestHarness::new();
    let report = h
        .service
        .analyze_sync(vec![contract_upload("a.pdf"), failing_upload("b.pdf")])
        .await
        .unwrap();

    assert_eq!(report.status, "completed");
    assert_eq!(report.files, vec!["a.pdf"]);
    assert_eq!(report.total_documents, 1);
    assert_eq!(report.total_clauses_analyzed, 2);
    assert_eq!(report.legal_analysis[0].clause_id, 1);
    assert!(report.response_info.text_truncated);
    assert!(h.store.is_empty());
    assert_eq!(h.workspace_count(), 0);
}

#[tokio::test]
async fn test_analyze_sync_with_nothing_analyzable() {
    let h = TestHarness::new();
    let report = h
        .service
        .analyze_sync(vec![blank_upload("a.pdf")])
        .await
        .unwrap();

    assert_eq!(report.total_documents, 0);
    assert!(report.legal_analysis.is_empty());
    assert_eq!(report.message, "Successfully analyzed 0 legal documents");
}

#[tokio::test]
async fn test_shutdown_waits_for_running_jobs() {
    let h = TestHarness::gated();
    let first = h
        .service
        .submit(DEFAULT_JOB_TYPE, vec![contract_upload("a.pdf")])
        .await
        .unwrap();
    let second = h
        .service
        .submit(DEFAULT_JOB_TYPE, vec![contract_upload("b.pdf")])
        .await
        .unwrap();

    h.release(2);
    h.service.shutdown().await;

    for id in [&first, &second] {
        assert_eq!(h.raw_status(id.as_str()), Some(JobStatus::Completed));
    }
    assert_eq!(h.workspace_count(), 0);
}

#[tokio::test]
async fn test_sweeper_expires_unpolled_jobs() {
    let h = TestHarness::gated_with_config(|c| c.sweep_interval_secs(1));
    h.service.start_sweeper();
    h.service.start_sweeper();

    let id = h
        .service
        .submit(DEFAULT_JOB_TYPE, vec![contract_upload("a.pdf")])
        .await
        .unwrap();
    h.wait_until(id.as_str(), |v| v.status == JobStatus::Processing)
        .await;

    h.clock.advance(Duration::from_secs(301));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.raw_status(id.as_str()) != Some(JobStatus::Failed) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "sweeper never expired the job"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    h.release(1);
    h.service.shutdown().await;
    let view = h.service.get_status(id.as_str()).unwrap();
    assert_eq!(view.error.as_deref(), Some("Job timed out after 5 minutes"));
}

#[tokio::test]
async fn test_health_reports_ai_enabled() {
    let h = TestHarness::new();
    let health = h.service.health();
    assert!(health.ai_enabled);
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}
