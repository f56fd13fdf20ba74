use std::collections::VecDeque;
use std::time::Duration;

use kb_ingest_core::contract::{
    IngestionJob, IngestionJobStatus, IngestionStatistics, MockIngestionService, MockSleeper,
};
use kb_ingest_core::ingestion::{
    poll_until_terminal, start_ingestion, JobOutcome, PollError, PollOptions,
};
use tokio_util::sync::CancellationToken;

fn job(status: IngestionJobStatus) -> IngestionJob {
    IngestionJob {
        ingestion_job_id: "JOB1".to_string(),
        knowledge_base_id: "KB1".to_string(),
        data_source_id: "DS1".to_string(),
        status,
        failure_reasons: vec![],
        statistics: None,
    }
}

/// Service mock that answers successive status queries from `statuses`.
fn service_answering(statuses: Vec<IngestionJob>) -> MockIngestionService {
    let count = statuses.len();
    let mut queue = VecDeque::from(statuses);
    let mut service = MockIngestionService::new();
    service
        .expect_get_ingestion_job()
        .times(count)
        .returning(move |kb, ds, job_id| {
            assert_eq!(kb, "KB1");
            assert_eq!(ds, "DS1");
            assert_eq!(job_id, "JOB1");
            Ok(queue.pop_front().expect("No more statuses queued"))
        });
    service
}

#[tokio::test]
async fn polls_until_complete_sleeping_between_queries() {
    let service = service_answering(vec![
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::Complete),
    ]);

    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == Duration::from_secs(30))
        .times(2)
        .returning(|_| ());

    let report = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .expect("Polling should reach COMPLETE");

    assert_eq!(report.polls, 3);
    assert_eq!(report.sleeps, 2);
    assert!(report.outcome.is_success());
    assert_eq!(report.outcome, JobOutcome::Complete { statistics: None });
}

#[tokio::test]
async fn terminal_on_first_query_never_sleeps() {
    let mut complete = job(IngestionJobStatus::Complete);
    complete.statistics = Some(IngestionStatistics {
        documents_scanned: 2,
        new_documents_indexed: 2,
        ..Default::default()
    });
    let service = service_answering(vec![complete]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let report = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.polls, 1);
    assert_eq!(report.sleeps, 0);
    match report.outcome {
        JobOutcome::Complete { statistics: Some(stats) } => assert_eq!(stats.documents_scanned, 2),
        other => panic!("Expected completion with statistics, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_job_reports_every_reason_verbatim() {
    let mut failed = job(IngestionJobStatus::Failed);
    failed.failure_reasons = vec!["disk full".to_string(), "timeout".to_string()];
    let service = service_answering(vec![job(IngestionJobStatus::Starting), failed]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(1).returning(|_| ());

    let report = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(report.outcome.is_failure());
    assert_eq!(
        report.outcome,
        JobOutcome::Failed {
            reasons: vec!["disk full".to_string(), "timeout".to_string()]
        }
    );
    let lines = report.outcome.report_lines();
    assert!(lines.contains(&"- disk full".to_string()));
    assert!(lines.contains(&"- timeout".to_string()));
}

#[tokio::test]
async fn stopped_job_is_neither_success_nor_failure() {
    let service = service_answering(vec![
        job(IngestionJobStatus::Stopping),
        job(IngestionJobStatus::Stopped),
    ]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(1).returning(|_| ());

    let report = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, JobOutcome::Stopped);
    assert!(!report.outcome.is_success());
    assert!(!report.outcome.is_failure());
}

#[tokio::test]
async fn unknown_status_keeps_polling() {
    let service = service_answering(vec![
        job(IngestionJobStatus::from("SOMETHING_NEW")),
        job(IngestionJobStatus::Complete),
    ]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(1).returning(|_| ());

    let report = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(report.polls, 2);
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn gives_up_once_max_wait_would_be_exceeded() {
    // 10s interval, 25s budget: two sleeps fit, the third would not.
    let service = service_answering(vec![
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
    ]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(2).returning(|_| ());

    let options = PollOptions {
        interval: Duration::from_secs(10),
        max_wait: Some(Duration::from_secs(25)),
    };
    let err = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &options,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        PollError::TimedOut {
            job_id,
            last_status,
            waited,
        } => {
            assert_eq!(job_id, "JOB1");
            assert_eq!(last_status, IngestionJobStatus::InProgress);
            assert_eq!(waited, Duration::from_secs(20));
        }
        other => panic!("Expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_token_stops_polling_instead_of_sleeping() {
    let service = service_answering(vec![job(IngestionJobStatus::InProgress)]);

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &cancel,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PollError::Cancelled { .. }), "got {err:?}");
}

#[tokio::test]
async fn status_query_error_propagates() {
    let mut service = MockIngestionService::new();
    service
        .expect_get_ingestion_job()
        .times(1)
        .returning(|_, _, _| Err("throttled".into()));

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let err = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &PollOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        PollError::Status { job_id, source } => {
            assert_eq!(job_id, "JOB1");
            assert_eq!(source.to_string(), "throttled");
        }
        other => panic!("Expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn start_ingestion_issues_exactly_one_call() {
    let mut service = MockIngestionService::new();
    service
        .expect_start_ingestion_job()
        .withf(|kb, ds, description| {
            kb == "KB1" && ds == "DS1" && description == "First Ingestion"
        })
        .times(1)
        .returning(|_, _, _| Ok(job(IngestionJobStatus::Starting)));

    let started = start_ingestion(&service, "KB1", "DS1", "First Ingestion")
        .await
        .expect("Start should succeed");
    assert_eq!(started.ingestion_job_id, "JOB1");
}

#[tokio::test]
async fn start_ingestion_error_propagates() {
    let mut service = MockIngestionService::new();
    service
        .expect_start_ingestion_job()
        .times(1)
        .returning(|_, _, _| Err("ConflictException: job already running".into()));

    let err = start_ingestion(&service, "KB1", "DS1", "First Ingestion")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ConflictException"));
}

#[tokio::test]
async fn zero_interval_is_raised_so_max_wait_still_applies() {
    // Raised to 1s: three sleeps fit in a 3s budget, the fourth query gives up.
    let service = service_answering(vec![
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
        job(IngestionJobStatus::InProgress),
    ]);

    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == Duration::from_secs(1))
        .times(3)
        .returning(|_| ());

    let options = PollOptions {
        interval: Duration::ZERO,
        max_wait: Some(Duration::from_secs(3)),
    };
    let err = poll_until_terminal(
        &service,
        &sleeper,
        "KB1",
        "DS1",
        "JOB1",
        &options,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        PollError::TimedOut { waited, .. } => assert_eq!(waited, Duration::from_secs(3)),
        other => panic!("Expected timeout, got {other:?}"),
    }
}
