//! System configuration parsing.

use kdl::{KdlDocument, KdlNode};
use pgjq_core::ReclaimPolicy;
use pgjq_core::listing::DEFAULT_MAX_PER_PAGE;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::nodes::{
    field, require_bool, require_bounded, require_duration, require_positive_duration,
    require_string,
};
use crate::{ConfigError, ConfigResult, VariableContext};

/// System-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PgjqConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub reaper: ReaperConfig,
    pub chart: ChartConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. Usually supplied through `${env.DATABASE_URL}`.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Bound on waiting for a pooled connection.
    pub acquire_timeout: Duration,
    /// Apply the bundled migrations on connect.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            run_migrations: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on every public call.
    pub call_timeout: Duration,
    /// Window used when a producer does not pass one.
    pub default_stale_after: Duration,
    /// When set, every claim replaces the job's window with this one.
    pub claim_stale_after: Option<Duration>,
    /// Claims after which an expired job becomes `stale` instead of pending.
    pub max_reads: Option<i32>,
    pub max_per_page: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            default_stale_after: Duration::from_secs(10 * 60),
            claim_stale_after: None,
            max_reads: None,
            max_per_page: DEFAULT_MAX_PER_PAGE,
        }
    }
}

impl EngineConfig {
    pub fn reclaim_policy(&self) -> ReclaimPolicy {
        ReclaimPolicy {
            max_reads: self.max_reads,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Pause between sweeps when the reaper loop is running.
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Time covered by a jobs chart, ending now.
    pub span: Duration,
    /// Number of points in the chart.
    pub buckets: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            span: Duration::from_secs(24 * 60 * 60),
            buckets: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep after finding the queue empty.
    pub poll_interval: Duration,
    /// Sleep after a store error.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Read and parse a configuration file, interpolating the process environment.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PgjqConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, &VariableContext::from_process_env())
}

/// Parse system configuration from KDL text.
///
/// Sections and settings that are absent keep their defaults.
pub fn parse_config(kdl: &str, vars: &VariableContext) -> ConfigResult<PgjqConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = PgjqConfig::default();
    let mut seen = HashSet::new();

    for node in doc.nodes() {
        let section = node.name().value();
        if !seen.insert(section.to_string()) {
            return Err(ConfigError::Duplicate(format!("section '{}'", section)));
        }
        match section {
            "database" => parse_database(node, vars, &mut config.database)?,
            "engine" => parse_engine(node, vars, &mut config.engine)?,
            "reaper" => parse_reaper(node, vars, &mut config.reaper)?,
            "chart" => parse_chart(node, vars, &mut config.chart)?,
            "worker" => parse_worker(node, vars, &mut config.worker)?,
            "logging" => parse_logging(node, vars, &mut config.logging)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes().iter())
}

fn parse_database(
    node: &KdlNode,
    vars: &VariableContext,
    database: &mut DatabaseConfig,
) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("database", child);
        match child.name().value() {
            "url" => {
                let url = require_string(&field, child, vars)?;
                validate_database_url(&field, &url)?;
                database.url = Some(url);
            }
            "max-connections" => {
                database.max_connections = require_bounded(&field, child, 1u32, 1000)?;
            }
            "acquire-timeout" => {
                database.acquire_timeout = require_positive_duration(&field, child, vars)?;
            }
            "run-migrations" => database.run_migrations = require_bool(&field, child)?,
            _ => {}
        }
    }
    Ok(())
}

/// Accept only `postgres://` and `postgresql://` URLs.
pub fn validate_database_url(field: &str, raw: &str) -> ConfigResult<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::invalid(field, format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{}', expected postgres", other),
        )),
    }
}

fn parse_engine(
    node: &KdlNode,
    vars: &VariableContext,
    engine: &mut EngineConfig,
) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("engine", child);
        match child.name().value() {
            "call-timeout" => {
                engine.call_timeout = require_positive_duration(&field, child, vars)?;
            }
            "default-stale-after" => {
                engine.default_stale_after = require_positive_duration(&field, child, vars)?;
            }
            "claim-stale-after" => {
                engine.claim_stale_after = Some(require_positive_duration(&field, child, vars)?);
            }
            "max-reads" => {
                engine.max_reads = Some(require_bounded(&field, child, 1i32, i32::MAX)?);
            }
            "max-per-page" => {
                engine.max_per_page = require_bounded(&field, child, 1u32, 100_000)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_reaper(
    node: &KdlNode,
    vars: &VariableContext,
    reaper: &mut ReaperConfig,
) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("reaper", child);
        if child.name().value() == "interval" {
            reaper.interval = require_positive_duration(&field, child, vars)?;
        }
    }
    Ok(())
}

fn parse_chart(node: &KdlNode, vars: &VariableContext, chart: &mut ChartConfig) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("chart", child);
        match child.name().value() {
            "span" => chart.span = require_positive_duration(&field, child, vars)?,
            "buckets" => chart.buckets = require_bounded(&field, child, 1u32, 1000)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_worker(
    node: &KdlNode,
    vars: &VariableContext,
    worker: &mut WorkerConfig,
) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("worker", child);
        match child.name().value() {
            "poll-interval" => worker.poll_interval = require_positive_duration(&field, child, vars)?,
            "error-backoff" => worker.error_backoff = require_duration(&field, child, vars)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_logging(
    node: &KdlNode,
    vars: &VariableContext,
    logging: &mut LoggingConfig,
) -> ConfigResult<()> {
    for child in children(node) {
        let field = field("logging", child);
        match child.name().value() {
            "filter" => logging.filter = require_string(&field, child, vars)?,
            "format" => {
                logging.format = match require_string(&field, child, vars)?.as_str() {
                    "pretty" => LogFormat::Pretty,
                    "json" => LogFormat::Json,
                    other => {
                        return Err(ConfigError::invalid(
                            field,
                            format!("unknown log format: {}", other),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
