//! End-to-end pipeline runs against board fixtures

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use noticewatch_common::clock::ManualClock;
use noticewatch_common::config::{
    AppConfig, BoardSchema, HttpConfig, LedgerConfig, ObservabilityConfig, RuntimeConfig,
    ScheduleConfig, SourceConfig, TelegramConfig,
};
use noticewatch_common::errors::{AppError, Result};
use noticewatch_common::ledger::{DedupLedger, InMemoryLedger};
use noticewatch_common::models::NoticeCategory;
use noticewatch_crawler::{PageFetcher, StaticFetcher};
use noticewatch_notifier::RecordingNotifier;
use noticewatch_worker::{NoticePipeline, Schedule, Scheduler};
use std::sync::Arc;
use std::time::Duration;

const SCHOOL_URL: &str = "https://www.example.ac.kr/kor/notice.do";
const DEPT_URL: &str = "https://cs.example.ac.kr/scholarship.do";

const SCHOOL_BOARD: &str = include_str!("fixtures/school_board.html");
const DEPT_BOARD: &str = include_str!("fixtures/dept_board.html");

fn source(name: &str, url: &str, prefix: &str, suffix: Option<&str>, category: NoticeCategory) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        base_url: None,
        id_prefix: prefix.to_string(),
        id_suffix: suffix.map(str::to_string),
        category,
        label: None,
        keywords: vec!["장학".to_string()],
        schema: BoardSchema::default(),
    }
}

fn config(heartbeat: bool) -> AppConfig {
    AppConfig {
        telegram: TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: -100200,
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 5,
            disable_preview: true,
        },
        ledger: LedgerConfig::default(),
        http: HttpConfig::default(),
        schedule: ScheduleConfig::default(),
        runtime: RuntimeConfig {
            utc_offset_hours: 9,
            heartbeat_when_empty: heartbeat,
        },
        observability: ObservabilityConfig::default(),
        sources: vec![
            source("school", SCHOOL_URL, "school", None, NoticeCategory::SchoolGeneral),
            source(
                "dept-scholarship",
                DEPT_URL,
                "dept",
                Some("scholarship"),
                NoticeCategory::DeptScholarship,
            ),
        ],
    }
}

fn boards() -> StaticFetcher {
    StaticFetcher::new()
        .with_page(SCHOOL_URL, SCHOOL_BOARD)
        .with_page(DEPT_URL, DEPT_BOARD)
}

/// 11:00 on 2026-03-02 in UTC+9
fn morning_run() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap()))
}

struct Setup {
    pipeline: NoticePipeline,
    ledger: Arc<InMemoryLedger>,
    notifier: Arc<RecordingNotifier>,
}

fn setup(fetcher: impl PageFetcher + 'static, heartbeat: bool) -> Setup {
    let cfg = config(heartbeat);
    let clock = morning_run();
    let ledger = Arc::new(InMemoryLedger::with_clock(cfg.expiry_policy(), clock.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = NoticePipeline::from_config(&cfg, Arc::new(fetcher), ledger.clone(), notifier.clone())
        .unwrap()
        .with_clock(clock);

    Setup {
        pipeline,
        ledger,
        notifier,
    }
}

#[tokio::test]
async fn test_delivers_matching_notices_once() {
    let s = setup(boards(), false);

    let first = s.pipeline.run().await;
    assert_eq!(first.total_delivered(), 2);
    assert_eq!(
        first.delivered_ids().collect::<Vec<_>>(),
        vec!["school_3120", "school_3119"]
    );
    assert_eq!(first.sources[0].scraped, 3);
    assert_eq!(first.sources[0].matched, 2);
    assert_eq!(s.ledger.len().await, 2);
    assert!(s.ledger.contains("school_3120").await.unwrap());
    assert!(s.ledger.contains("school_3119").await.unwrap());
    assert!(!s.ledger.contains("school_3118").await.unwrap());

    let second = s.pipeline.run().await;
    assert_eq!(second.total_delivered(), 0);
    assert_eq!(second.sources[0].already_seen, 2);
    assert_eq!(s.notifier.count().await, 2);
}

#[tokio::test]
async fn test_messages_follow_board_order_and_format() {
    let s = setup(boards(), false);
    s.pipeline.run().await;

    let messages = s.notifier.messages().await;
    assert_eq!(
        messages[0],
        "[School Notice]\n\
         Title: 2026학년도 1학기 국가장학금 2차 신청 안내\n\
         Link: https://www.example.ac.kr/kor/notice.do?mode=view&articleNo=3120\n\
         Posted: 2026-03-02"
    );
    assert!(messages[1].contains("Title: 교내 근로장학생 모집"));
}

#[tokio::test]
async fn test_yesterdays_rows_are_ignored() {
    let s = setup(boards(), false);
    let report = s.pipeline.run().await;

    let dept = &report.sources[1];
    assert_eq!(dept.source, "dept-scholarship");
    assert!(!dept.is_failed());
    assert_eq!(dept.scraped, 0);
    assert!(dept.delivered.is_empty());
}

#[tokio::test]
async fn test_failing_source_does_not_block_others() {
    let fetcher = StaticFetcher::new()
        .with_status(SCHOOL_URL, 503, "Service Unavailable")
        .with_page(DEPT_URL, DEPT_BOARD);
    let s = setup(fetcher, false);
    let report = s.pipeline.run().await;
    assert_eq!(report.failed_sources(), vec!["school"]);
    assert!(!report.all_sources_failed());

    // Same, with the healthy board holding matches
    let fetcher = StaticFetcher::new()
        .with_page(SCHOOL_URL, SCHOOL_BOARD)
        .with_status(DEPT_URL, 500, "oops");
    let s = setup(fetcher, false);
    let report = s.pipeline.run().await;
    assert_eq!(report.failed_sources(), vec!["dept-scholarship"]);
    assert_eq!(report.total_delivered(), 2);
    assert_eq!(s.notifier.count().await, 2);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_next_run() {
    let s = setup(boards(), false);
    s.notifier.fail_when_contains("근로장학생").await;

    let first = s.pipeline.run().await;
    assert_eq!(first.delivered_ids().collect::<Vec<_>>(), vec!["school_3120"]);
    assert_eq!(first.sources[0].failed_deliveries, vec!["school_3119".to_string()]);
    assert!(!s.ledger.contains("school_3119").await.unwrap());

    s.notifier.clear_failures().await;
    let second = s.pipeline.run().await;
    assert_eq!(second.delivered_ids().collect::<Vec<_>>(), vec!["school_3119"]);
    assert!(s.ledger.contains("school_3119").await.unwrap());
}

struct UnreachableLedger;

#[async_trait]
impl DedupLedger for UnreachableLedger {
    async fn contains(&self, _id: &str) -> Result<bool> {
        Err(AppError::Ledger {
            message: "connection refused".to_string(),
        })
    }

    async fn mark_processed(&self, _id: &str) -> Result<()> {
        Err(AppError::Ledger {
            message: "connection refused".to_string(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Err(AppError::Ledger {
            message: "connection refused".to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

#[tokio::test]
async fn test_unreachable_ledger_still_delivers() {
    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = NoticePipeline::from_config(
        &config(false),
        Arc::new(boards()),
        Arc::new(UnreachableLedger),
        notifier.clone(),
    )
    .unwrap()
    .with_clock(morning_run());

    let report = pipeline.run().await;
    assert_eq!(report.total_delivered(), 2);
    assert_eq!(notifier.count().await, 2);
}

#[tokio::test]
async fn test_heartbeat_once_per_empty_run() {
    let s = setup(StaticFetcher::new().with_page(DEPT_URL, DEPT_BOARD).with_page(SCHOOL_URL, DEPT_BOARD), true);
    let report = s.pipeline.run().await;

    assert!(report.is_empty_run());
    assert!(report.heartbeat_sent);
    let messages = s.notifier.messages().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("No new notices found.\nChecked at: 2026-03-02 11:00"));
}

#[tokio::test]
async fn test_no_heartbeat_when_disabled_or_delivered() {
    let s = setup(StaticFetcher::new().with_page(DEPT_URL, DEPT_BOARD).with_page(SCHOOL_URL, DEPT_BOARD), false);
    let report = s.pipeline.run().await;
    assert!(!report.heartbeat_sent);
    assert_eq!(s.notifier.count().await, 0);

    let s = setup(boards(), true);
    let report = s.pipeline.run().await;
    assert!(!report.heartbeat_sent);
    assert_eq!(s.notifier.count().await, 2);
}

#[tokio::test]
async fn test_no_heartbeat_when_every_board_fails() {
    let fetcher = StaticFetcher::new()
        .with_status(SCHOOL_URL, 503, "Service Unavailable")
        .with_status(DEPT_URL, 502, "Bad Gateway");
    let s = setup(fetcher, true);
    let report = s.pipeline.run().await;

    assert!(report.all_sources_failed());
    assert!(!report.heartbeat_sent);
    assert_eq!(s.notifier.count().await, 0);
}

struct StalledFetcher;

#[async_trait]
impl PageFetcher for StalledFetcher {
    async fn fetch(&self, _source_name: &str, _url: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }
}

#[tokio::test]
async fn test_run_abandoned_after_timeout() {
    let s = setup(StalledFetcher, false);
    let scheduler = Scheduler::new(
        Arc::new(s.pipeline),
        Schedule::Interval(Duration::from_secs(3600)),
        false,
        Duration::from_millis(50),
    );

    assert!(scheduler.run_once().await.is_none());
    assert_eq!(s.notifier.count().await, 0);
}

#[tokio::test]
async fn test_scheduler_runs_on_start_then_stops() {
    let s = setup(boards(), false);
    let scheduler = Scheduler::new(
        Arc::new(s.pipeline),
        Schedule::Interval(Duration::from_secs(3600)),
        true,
        Duration::from_secs(10),
    );

    let runs = scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(runs, 1);
    assert_eq!(s.notifier.count().await, 2);
}
