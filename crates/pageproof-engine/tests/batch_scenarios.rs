//! End-to-end batch validation scenarios
//!
//! Exercises the orchestrator through real tokio scheduling with scripted
//! providers: caching across runs, the global concurrency bound, failure
//! isolation and timeout containment.

use pageproof_engine::{
    AnalysisResult, BatchOrchestrator, ContentRef, DocumentId, EngineConfig, FailureKind,
    MethodVersion, PageOutcome, PromptContext, Severity, UnitExecutor, Violation, WorkUnit,
};
use pageproof_test_utils::{
    init_test_logging, page_bytes, seeded_rasterizer, PageScript, ScriptedProvider,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn clean_batch_scores_and_misses_cache_on_first_run() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(2, 3);

    let orchestrator = BatchOrchestrator::new(
        EngineConfig::new().with_concurrency(4),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    );
    let report = orchestrator.run(&docs).await;

    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.total_pages, 6);
    assert_eq!(report.analyzed_pages, 6);
    assert_eq!(report.cached_pages, 0);
    assert_eq!(report.failed_pages, 0);
    assert_eq!(report.cache_hit_rate, 0.0);
    assert!((report.average_score - 9.0).abs() < 1e-9);
    assert!(report.passed());
    assert_eq!(provider.call_count(), 6);
}

#[tokio::test]
async fn second_run_is_served_entirely_from_cache() {
    init_test_logging();
    let cache_dir = tempfile::tempdir().unwrap();
    let config = || {
        EngineConfig::new()
            .with_concurrency(4)
            .with_cache_dir(cache_dir.path())
    };

    let first_provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(2, 3);
    let rasterizer = Arc::new(rasterizer);

    let first_report = BatchOrchestrator::new(
        config(),
        Arc::clone(&first_provider),
        Arc::clone(&rasterizer),
    )
    .run(&docs)
    .await;
    assert_eq!(first_provider.call_count(), 6);

    // Fresh orchestrator and provider, same cache directory: zero provider
    // calls, identical scores.
    let second_provider = Arc::new(ScriptedProvider::new(2.0));
    let second_report = BatchOrchestrator::new(
        config(),
        Arc::clone(&second_provider),
        Arc::clone(&rasterizer),
    )
    .run(&docs)
    .await;

    assert_eq!(second_provider.call_count(), 0);
    assert_eq!(second_report.cached_pages, 6);
    assert_eq!(second_report.analyzed_pages, 0);
    assert_eq!(second_report.cache_hit_rate, 100.0);
    assert_eq!(second_report.average_score, first_report.average_score);
    for (a, b) in first_report.documents.iter().zip(&second_report.documents) {
        assert_eq!(a.aggregate_score, b.aggregate_score);
        assert_eq!(a.passed, b.passed);
    }
}

#[tokio::test]
async fn method_version_change_invalidates_cache() {
    init_test_logging();
    let cache_dir = tempfile::tempdir().unwrap();
    let (rasterizer, docs) = seeded_rasterizer(1, 2);
    let rasterizer = Arc::new(rasterizer);
    let config = || EngineConfig::new().with_cache_dir(cache_dir.path());

    let v1 = Arc::new(ScriptedProvider::new(9.0));
    BatchOrchestrator::new(config(), Arc::clone(&v1), Arc::clone(&rasterizer))
        .run(&docs)
        .await;

    let v2 = Arc::new(
        ScriptedProvider::new(9.0)
            .with_method(MethodVersion::new("scripted", "v2")),
    );
    BatchOrchestrator::new(config(), Arc::clone(&v2), Arc::clone(&rasterizer))
        .run(&docs)
        .await;

    // New prompt revision must not be served stale entries.
    assert_eq!(v2.call_count(), 2);
}

#[tokio::test]
async fn provider_concurrency_stays_within_the_global_bound() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(8.0).with_latency(Duration::from_millis(10)));
    // 5 documents x 10 pages queued upfront, bound of 5.
    let (rasterizer, docs) = seeded_rasterizer(5, 10);

    let report = BatchOrchestrator::new(
        EngineConfig::new().with_concurrency(5).with_cache_enabled(false),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    )
    .run(&docs)
    .await;

    assert_eq!(report.total_pages, 50);
    assert_eq!(provider.call_count(), 50);
    assert!(
        provider.peak_concurrency() <= 5,
        "peak concurrency {} exceeded bound",
        provider.peak_concurrency()
    );
}

#[tokio::test]
async fn one_failing_page_does_not_sink_its_siblings() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(2, 3);
    provider.script(
        page_bytes("doc-0.pdf", 2),
        PageScript::Fail("503 from upstream".to_string()),
    );

    let report = BatchOrchestrator::new(
        EngineConfig::new(),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    )
    .run(&docs)
    .await;

    let flawed = &report.documents[0];
    assert_eq!(flawed.failed_pages, 1);
    assert_eq!(flawed.successful_pages, 2);
    // Mean over the two surviving pages only.
    assert!((flawed.aggregate_score - 9.0).abs() < 1e-9);

    let clean = &report.documents[1];
    assert_eq!(clean.failed_pages, 0);
    assert!(clean.passed);
    assert_eq!(report.failed_pages, 1);
}

#[tokio::test]
async fn hanging_page_times_out_without_blocking_the_batch() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(1, 4);
    provider.script(page_bytes("doc-0.pdf", 3), PageScript::Hang);

    let config = EngineConfig::new()
        .with_concurrency(2)
        .with_page_timeout(Duration::from_secs(1));
    let started = std::time::Instant::now();
    let report = BatchOrchestrator::new(config, Arc::clone(&provider), Arc::new(rasterizer))
        .run(&docs)
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    let verdict = &report.documents[0];
    assert_eq!(verdict.failed_pages, 1);
    assert_eq!(verdict.successful_pages, 3);
}

#[tokio::test]
async fn panicking_analysis_is_contained_by_the_task_boundary() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(1, 3);
    provider.script(
        page_bytes("doc-0.pdf", 1),
        PageScript::Panic("heuristic exploded".to_string()),
    );

    let report = BatchOrchestrator::new(
        EngineConfig::new(),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    )
    .run(&docs)
    .await;

    let verdict = &report.documents[0];
    assert_eq!(verdict.total_pages, 3);
    assert_eq!(verdict.failed_pages, 1);
    assert_eq!(verdict.successful_pages, 2);
}

#[tokio::test]
async fn unreadable_document_fails_alone() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, mut docs) = seeded_rasterizer(1, 2);
    // Not registered with the rasterizer: inspection and rasterization fail.
    docs.push("missing.pdf".into());

    let report = BatchOrchestrator::new(
        EngineConfig::new(),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    )
    .run(&docs)
    .await;

    assert!(!report.passed());
    let good = &report.documents[0];
    assert!(good.passed);

    let broken = &report.documents[1];
    assert_eq!(broken.total_pages, 0);
    assert!(!broken.passed);
    assert!(broken.error.is_some());
    // "failed to process" is distinct from "scored below threshold".
    assert!(good.error.is_none());
}

#[tokio::test]
async fn critical_violation_fails_a_high_scoring_document() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.5));
    let (rasterizer, docs) = seeded_rasterizer(1, 2);
    provider.script(
        page_bytes("doc-0.pdf", 2),
        PageScript::Score(
            AnalysisResult::with_score(9.5).with_violation(Violation::new(
                "font.forbidden",
                Severity::Critical,
                "unlicensed display face on page 2",
            )),
        ),
    );

    let report = BatchOrchestrator::new(
        EngineConfig::new(),
        Arc::clone(&provider),
        Arc::new(rasterizer),
    )
    .run(&docs)
    .await;

    let verdict = &report.documents[0];
    assert!(verdict.aggregate_score >= 9.0);
    assert!(!verdict.passed);
    assert!(!report.passed());
}

#[tokio::test]
async fn parse_failures_carry_their_own_kind() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    provider.script(
        b"only page".to_vec(),
        PageScript::Garble("response was prose, not JSON".to_string()),
    );

    let executor = UnitExecutor::new(
        Arc::clone(&provider),
        None,
        PromptContext::default(),
        Duration::from_secs(5),
    );
    let unit = WorkUnit::new(
        DocumentId::new("brief"),
        1,
        ContentRef::from_bytes(b"only page".to_vec()),
    );
    let result = executor.execute(&unit).await;
    match result.outcome {
        PageOutcome::Failure { kind, .. } => assert_eq!(kind, FailureKind::Parse),
        PageOutcome::Success { .. } => panic!("expected parse failure"),
    }
}

#[tokio::test]
async fn disabled_cache_always_pays_the_provider() {
    init_test_logging();
    let provider = Arc::new(ScriptedProvider::new(9.0));
    let (rasterizer, docs) = seeded_rasterizer(1, 2);
    let rasterizer = Arc::new(rasterizer);
    let config = || EngineConfig::new().with_cache_enabled(false);

    BatchOrchestrator::new(config(), Arc::clone(&provider), Arc::clone(&rasterizer))
        .run(&docs)
        .await;
    let report = BatchOrchestrator::new(config(), Arc::clone(&provider), Arc::clone(&rasterizer))
        .run(&docs)
        .await;

    assert_eq!(provider.call_count(), 4);
    assert_eq!(report.cached_pages, 0);
}
