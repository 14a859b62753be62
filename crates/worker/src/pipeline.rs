//! Notice pipeline
//!
//! One run: fetch every board concurrently, keep same-day keyword matches,
//! drop what the ledger already has, deliver the rest and mark them.
//! A notice is marked only after the notifier confirmed the send, so a failed
//! send is retried next run and a crash between send and mark can only cause a
//! duplicate.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use futures::future::join_all;
use noticewatch_common::clock::{Clock, SystemClock};
use noticewatch_common::config::{AppConfig, SourceConfig};
use noticewatch_common::errors::Result;
use noticewatch_common::ledger::DedupLedger;
use noticewatch_common::metrics::{self, RunMetrics};
use noticewatch_common::models::{DeliveryReport, Notice, SourceReport};
use noticewatch_crawler::{parse_board, BoardExtractor, KeywordFilter, PageFetcher};
use noticewatch_notifier::{render_heartbeat, Notifier};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// A configured board, ready to be scraped
pub struct WatchedSource {
    name: String,
    url: String,
    extractor: BoardExtractor,
    filter: KeywordFilter,
}

impl WatchedSource {
    /// Compiles the board schema; a bad selector or date format fails here
    pub fn from_config(source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            name: source.name.clone(),
            url: source.url.clone(),
            extractor: BoardExtractor::from_source(source)?,
            filter: KeywordFilter::new(source.keywords.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct NoticePipeline {
    sources: Vec<WatchedSource>,
    fetcher: Arc<dyn PageFetcher>,
    ledger: Arc<dyn DedupLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    heartbeat_when_empty: bool,
}

impl NoticePipeline {
    pub fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        ledger: Arc<dyn DedupLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(WatchedSource::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sources,
            fetcher,
            ledger,
            notifier,
            clock: Arc::new(SystemClock),
            offset: config.utc_offset(),
            heartbeat_when_empty: config.runtime.heartbeat_when_empty,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_heartbeat(mut self, enabled: bool) -> Self {
        self.heartbeat_when_empty = enabled;
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Run the pipeline once over every source
    pub async fn run(&self) -> DeliveryReport {
        self.run_with_id(Uuid::new_v4()).await
    }

    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn run_with_id(&self, run_id: Uuid) -> DeliveryReport {
        let run_metrics = RunMetrics::start();
        let started_at = self.clock.now();
        let today = self.clock.today_in(self.offset);

        info!(%today, "Run started");

        let sources = join_all(
            self.sources
                .iter()
                .map(|source| self.process_source(source, today, started_at)),
        )
        .await;

        let mut report = DeliveryReport {
            run_id,
            started_at,
            finished_at: started_at,
            sources,
            heartbeat_sent: false,
        };

        if report.is_empty_run() && !report.all_sources_failed() && self.heartbeat_when_empty {
            report.heartbeat_sent = self.send_heartbeat().await;
        } else if report.all_sources_failed() {
            warn!("Every source failed, heartbeat suppressed");
        }

        report.finished_at = self.clock.now();

        let failed_sources = report.failed_sources();
        run_metrics.finish(report.total_delivered(), failed_sources.len());
        info!(
            delivered = report.total_delivered(),
            failed_deliveries = report.total_failed_deliveries(),
            failed_sources = ?failed_sources,
            heartbeat = report.heartbeat_sent,
            "Run finished"
        );

        report
    }

    #[instrument(skip_all, fields(source = %source.name))]
    async fn process_source(
        &self,
        source: &WatchedSource,
        today: NaiveDate,
        observed_at: DateTime<Utc>,
    ) -> SourceReport {
        let html = match self.fetcher.fetch(&source.name, &source.url).await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, url = %source.url, "Board fetch failed");
                metrics::record_source_failure(&source.name);
                return SourceReport::failed(&source.name, e.to_string());
            }
        };

        // The DOM stays inside this call; only owned notices cross the awaits below
        let notices = match parse_board(&html, &source.extractor, today, observed_at) {
            Ok(notices) => notices,
            Err(e) => {
                error!(error = %e, "Board parse failed");
                metrics::record_source_failure(&source.name);
                return SourceReport::failed(&source.name, e.to_string());
            }
        };

        let mut report = SourceReport::new(&source.name);
        report.scraped = notices.len();

        let matched: Vec<Notice> = notices
            .into_iter()
            .filter(|notice| source.filter.matches(&notice.title))
            .collect();
        report.matched = matched.len();
        metrics::record_source(&source.name, report.scraped, report.matched);

        for notice in matched {
            if self.ledger.is_processed(&notice.id).await {
                debug!(notice_id = %notice.id, "Already delivered");
                report.already_seen += 1;
                continue;
            }

            match self.notifier.send_notice(&notice).await {
                Ok(()) => {
                    metrics::record_delivery(&source.name, true);
                    info!(
                        notice_id = %notice.id,
                        keyword = source.filter.matched_keyword(&notice.title).unwrap_or_default(),
                        "Notice delivered"
                    );
                    if let Err(e) = self.ledger.mark_processed(&notice.id).await {
                        warn!(notice_id = %notice.id, error = %e, "Failed to mark notice as delivered");
                        metrics::record_ledger_error("mark");
                    }
                    report.delivered.push(notice.id);
                }
                Err(e) => {
                    metrics::record_delivery(&source.name, false);
                    warn!(notice_id = %notice.id, error = %e, "Delivery failed, will retry next run");
                    report.failed_deliveries.push(notice.id);
                }
            }
        }

        report
    }

    async fn send_heartbeat(&self) -> bool {
        let checked_at = self
            .clock
            .now()
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        match self.notifier.send_message(&render_heartbeat(&checked_at)).await {
            Ok(()) => {
                info!("Heartbeat sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send heartbeat");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use noticewatch_common::clock::ManualClock;
    use noticewatch_common::config::{
        BoardSchema, HttpConfig, LedgerConfig, ObservabilityConfig, RuntimeConfig, ScheduleConfig,
        TelegramConfig,
    };
    use noticewatch_common::errors::AppError;
    use noticewatch_common::ledger::{ExpiryPolicy, InMemoryLedger};
    use noticewatch_common::models::NoticeCategory;
    use noticewatch_crawler::StaticFetcher;
    use noticewatch_notifier::RecordingNotifier;

    const BOARD: &str = "https://www.example.ac.kr/notice.do";

    fn page(rows: &[(&str, &str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(no, title, date)| {
                format!(
                    r#"<tr><td class="b-num-box">{no}</td><td class="b-title-box"><a href="?articleNo={no}"><span class="b-title">{title}</span></a></td><td>-</td><td>{date}</td></tr>"#
                )
            })
            .collect();
        format!("<table><tbody>{rows}</tbody></table>")
    }

    fn config() -> AppConfig {
        AppConfig {
            telegram: TelegramConfig {
                bot_token: "123:abc".into(),
                chat_id: 1,
                api_base: "https://api.telegram.org".into(),
                timeout_secs: 5,
                disable_preview: true,
            },
            ledger: LedgerConfig::default(),
            http: HttpConfig::default(),
            schedule: ScheduleConfig::default(),
            runtime: RuntimeConfig::default(),
            observability: ObservabilityConfig::default(),
            sources: vec![SourceConfig {
                name: "school".into(),
                url: BOARD.into(),
                base_url: None,
                id_prefix: "school".into(),
                id_suffix: None,
                category: NoticeCategory::SchoolGeneral,
                label: None,
                keywords: vec!["장학".into()],
                schema: BoardSchema::default(),
            }],
        }
    }

    struct Harness {
        pipeline: NoticePipeline,
        ledger: Arc<InMemoryLedger>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(fetcher: StaticFetcher) -> Harness {
        // 11:00 in UTC+9 on 2026-03-02
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap(),
        ));
        let cfg = config();
        let ledger = Arc::new(InMemoryLedger::with_clock(
            cfg.expiry_policy(),
            clock.clone(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let pipeline = NoticePipeline::from_config(
            &cfg,
            Arc::new(fetcher),
            ledger.clone(),
            notifier.clone(),
        )
        .unwrap()
        .with_clock(clock);

        Harness {
            pipeline,
            ledger,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_heartbeat_text_uses_local_time() {
        let h = harness(StaticFetcher::new().with_page(BOARD, page(&[("1", "휴강", "2026.03.02")])));
        let report = h.pipeline.run().await;

        assert!(report.heartbeat_sent);
        assert_eq!(
            h.notifier.messages().await,
            vec!["No new notices found.\nChecked at: 2026-03-02 11:00".to_string()]
        );
    }

    #[tokio::test]
    async fn test_already_seen_counted() {
        let h = harness(StaticFetcher::new().with_page(BOARD, page(&[("7", "장학 안내", "2026.03.02")])));
        h.ledger.mark_processed("school_7").await.unwrap();

        let report = h.pipeline.with_heartbeat(false).run().await;
        let source = &report.sources[0];
        assert_eq!(source.scraped, 1);
        assert_eq!(source.matched, 1);
        assert_eq!(source.already_seen, 1);
        assert!(source.delivered.is_empty());
        assert_eq!(h.notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_parse_failure_reported_per_source() {
        let h = harness(StaticFetcher::new().with_page(BOARD, "<p>점검 중</p>"));
        let report = h.pipeline.run().await;

        assert!(report.all_sources_failed());
        assert!(report.sources[0]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("container selector matched nothing"));
        assert!(!report.heartbeat_sent);
        assert_eq!(h.notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_board_still_sends_heartbeat() {
        let h = harness(StaticFetcher::new().with_page(BOARD, "<table><tbody></tbody></table>"));
        let report = h.pipeline.run().await;

        assert!(report.sources[0].error.is_none());
        assert_eq!(report.sources[0].scraped, 0);
        assert!(report.heartbeat_sent);
    }

    #[test]
    fn test_bad_schema_rejected_at_construction() {
        let mut cfg = config();
        cfg.sources[0].schema.title_selector = "td[".into();
        let err = NoticePipeline::from_config(
            &cfg,
            Arc::new(StaticFetcher::new()),
            Arc::new(InMemoryLedger::new(ExpiryPolicy::Rolling {
                window: std::time::Duration::from_secs(60),
            })),
            Arc::new(RecordingNotifier::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
