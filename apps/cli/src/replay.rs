use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use lervi_core::{EventKind, FlushOutcome, Metadata, Scheduler};
use serde::Deserialize;
use tokio::{fs, time::sleep};

/// One line of a replay file.
#[derive(Debug, Deserialize)]
pub struct ReplayLine {
    pub event: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub tracked: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub batches: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub pending: usize,
}

impl ReplayReport {
    fn record(&mut self, outcome: &FlushOutcome) {
        match outcome {
            FlushOutcome::Skipped => {}
            FlushOutcome::Delivered { events, .. } => {
                self.delivered += events;
                self.batches += 1;
            }
            FlushOutcome::Requeued {
                events, dropped, ..
            } => {
                self.requeued += events;
                self.dropped += dropped;
            }
            FlushOutcome::Abandoned { events } => self.dropped += events,
        }
    }
}

pub fn parse_replay(content: &str) -> Result<Vec<ReplayLine>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", i + 1))
        })
        .collect()
}

pub async fn load_replay(path: &Path) -> Result<Vec<ReplayLine>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_replay(&content)
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Track every line, then fire the unload hook and wait for deliveries.
pub async fn replay(
    scheduler: &Scheduler,
    tenant: &str,
    lines: &[ReplayLine],
    pace: Duration,
) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();
    scheduler.initialize(tenant);

    let pb = progress_bar(lines.len())?;
    for line in lines {
        match line.event.parse::<EventKind>() {
            Ok(kind) => {
                scheduler.track(kind, line.metadata.clone());
                report.tracked += 1;
                pb.set_message(kind.to_string());
            }
            Err(e) => {
                report.skipped += 1;
                pb.println(format!("{} {}", style("skipped:").yellow(), e));
            }
        }
        pb.inc(1);

        if !pace.is_zero() {
            sleep(pace).await;
        }
    }
    pb.finish_and_clear();

    scheduler.lifecycle().unload();
    for outcome in scheduler.drain().await {
        report.record(&outcome);
    }
    report.pending = scheduler.buffered_len();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lervi_core::{
        CollectorRequest, CollectorResponse, IdentityManager, MemoryStore, TelemetryConfig,
        Transport,
    };

    use super::*;

    #[derive(Default)]
    struct CountingCollector {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Transport for CountingCollector {
        async fn post(&self, request: &CollectorRequest) -> lervi_core::Result<CollectorResponse> {
            let body: serde_json::Value = serde_json::from_slice(&request.body)?;
            let events = body["events"].as_array().map(Vec::len).unwrap_or_default();
            self.batches.lock().unwrap().push(events);
            Ok(CollectorResponse {
                status: 202,
                body: String::new(),
            })
        }
    }

    #[test]
    fn parses_lines_and_ignores_blanks() {
        let lines = parse_replay(
            r#"{"event": "page_view", "metadata": {"path": "/hotel-sol"}}

{"event": "booking_confirmed"}
"#,
        )
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].event, "page_view");
        assert_eq!(lines[0].metadata.as_ref().unwrap()["path"], "/hotel-sol");
        assert!(lines[1].metadata.is_none());
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_replay("{\"event\": \"page_view\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = ReplayReport::default();
        report.record(&FlushOutcome::Delivered {
            events: 5,
            attempts: 1,
        });
        report.record(&FlushOutcome::Requeued {
            events: 3,
            dropped: 1,
            reason: "HTTP 503".to_string(),
        });
        report.record(&FlushOutcome::Skipped);

        assert_eq!(report.delivered, 5);
        assert_eq!(report.batches, 1);
        assert_eq!(report.requeued, 3);
        assert_eq!(report.dropped, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn replay_flushes_everything_on_unload() {
        let collector = Arc::new(CountingCollector::default());
        let scheduler = Scheduler::builder(TelemetryConfig {
            collector_url: "http://collector.test/api".to_string(),
            ..TelemetryConfig::default()
        })
        .identity(IdentityManager::new(Arc::new(MemoryStore::new())))
        .transport(Arc::clone(&collector) as Arc<dyn Transport>)
        .build()
        .unwrap();

        let lines = parse_replay(
            &["page_view", "search_dates", "room_view", "nope", "start_booking", "otp_requested", "otp_verified", "booking_confirmed"]
                .iter()
                .map(|e| format!("{{\"event\": \"{e}\"}}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
        .unwrap();

        let report = replay(&scheduler, "hotel-sol", &lines, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report.tracked, 7);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 7);
        assert_eq!(report.pending, 0);
        assert_eq!(*collector.batches.lock().unwrap(), vec![5, 2]);
    }
}
