//! Staleness sweep command.

use anyhow::Result;
use pgjq_config::ReaperConfig;
use pgjq_core::SweepReport;
use pgjq_engine::Pgjq;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval as every};
use tracing::{info, warn};

use super::print_json;

async fn sweep(pgjq: &Pgjq, queue: Option<&str>) -> pgjq_core::Result<SweepReport> {
    match queue {
        Some(queue) => pgjq.mark_stale_jobs(queue).await,
        None => pgjq.mark_all_stale_jobs().await,
    }
}

/// Period of the sweep loop: `--interval` wins, `--watch` falls back to the configured
/// interval, and neither means a single sweep.
pub fn sweep_interval(
    watch: bool,
    interval: Option<Duration>,
    config: &ReaperConfig,
) -> Option<Duration> {
    match interval {
        Some(interval) => Some(interval),
        None if watch => Some(config.interval),
        None => None,
    }
}

/// Sweep once, or every `interval` until Ctrl-C.
pub async fn run(pgjq: &Pgjq, queue: Option<&str>, interval: Option<Duration>) -> Result<()> {
    let Some(interval) = interval else {
        return print_json(&sweep(pgjq, queue).await?);
    };

    info!(queue = queue.unwrap_or("*"), ?interval, "Starting reaper");
    let mut ticker = every(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep(pgjq, queue).await {
                    Ok(report) if !report.is_empty() => print_json(&report)?,
                    Ok(_) => {}
                    // Transient store errors should not stop the loop.
                    Err(e) if e.is_retryable() => warn!(error = %e, "Sweep failed"),
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping reaper");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgjq_config::{PgjqConfig, VariableContext, parse_config};
    use serde_json::json;

    #[tokio::test]
    async fn test_single_sweep_on_memory_store() {
        let mut config = PgjqConfig::default();
        config.engine.default_stale_after = Duration::from_millis(1);
        let pgjq = Pgjq::in_memory(&config);
        pgjq.create_queue("emails").await.unwrap();
        let id = pgjq.enqueue("emails", json!({}), None, 0).await.unwrap();
        pgjq.dequeue("emails").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = sweep(&pgjq, Some("emails")).await.unwrap();
        assert_eq!(report.requeued, vec![id]);

        let report = sweep(&pgjq, None).await.unwrap();
        assert!(report.is_empty());
        run(&pgjq, None, None).await.unwrap();
    }

    #[test]
    fn test_watch_uses_configured_interval() {
        let kdl = r#"
            reaper {
                interval "45s"
            }
        "#;
        let config = parse_config(kdl, &VariableContext::new()).unwrap();

        assert_eq!(sweep_interval(false, None, &config.reaper), None);
        assert_eq!(
            sweep_interval(true, None, &config.reaper),
            Some(Duration::from_secs(45))
        );
        assert_eq!(
            sweep_interval(true, Some(Duration::from_secs(5)), &config.reaper),
            Some(Duration::from_secs(5))
        );
        assert_eq!(sweep_interval(false, None, &ReaperConfig::default()), None);
        assert_eq!(
            sweep_interval(true, None, &ReaperConfig::default()),
            Some(Duration::from_secs(30))
        );
    }
}
