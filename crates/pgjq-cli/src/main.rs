//! pgjq CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "pgjq")]
#[command(about = "Administer pgjq job queues", long_about = None)]
struct Cli {
    /// Path to a pgjq.kdl configuration file
    #[arg(long, env = "PGJQ_CONFIG")]
    config: Option<PathBuf>,

    /// PostgreSQL connection string, overrides the configuration file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage queues
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Manage jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Show live metrics for one queue or all of them
    Metrics {
        /// Queue name; all queues when omitted
        queue: Option<String>,
        /// Sum over every queue
        #[arg(long, conflicts_with = "queue")]
        total: bool,
    },
    /// Show per-status job counts over time
    Chart {
        /// Queue name
        queue: String,
    },
    /// Return expired claims to their queues
    Reap {
        /// Queue name
        #[arg(required_unless_present = "all")]
        queue: Option<String>,
        /// Sweep every queue
        #[arg(long, conflicts_with = "queue")]
        all: bool,
        /// Keep sweeping at the configured reaper interval until interrupted
        #[arg(long)]
        watch: bool,
        /// Keep sweeping at this interval (e.g. 30s) until interrupted
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Apply the bundled database migrations
    Migrate,
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "pgjq.kdl")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Create a queue
    Create {
        name: String,
        /// Succeed if the queue already exists
        #[arg(long)]
        if_not_exists: bool,
    },
    /// Drop a queue and all of its jobs
    Drop { name: String },
    /// Check whether a queue exists
    Exists { name: String },
    /// List queues with their job counts
    List,
    /// Delete every job in a queue
    Purge { name: String },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Enqueue a job
    Enqueue {
        queue: String,
        /// JSON payload
        payload: String,
        /// Higher runs first
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        priority: i32,
        /// Visibility window (e.g. 30s, 10m); defaults to the configured window
        #[arg(long, value_parser = parse_interval)]
        stale_after: Option<Duration>,
        /// JSON headers stored alongside the payload
        #[arg(long)]
        headers: Option<String>,
    },
    /// Claim the next job
    Dequeue { queue: String },
    /// Mark a claimed job completed
    Ack { queue: String, id: i64 },
    /// Mark a claimed job failed
    Nack { queue: String, id: i64 },
    /// Cancel a job that has not finished
    Cancel { queue: String, id: i64 },
    /// Delete a job
    Delete { queue: String, id: i64 },
    /// Show a job
    Get { queue: String, id: i64 },
    /// List jobs page by page
    List {
        queue: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        per_page: u32,
        /// job_id, read_ct, enqueued_at, dequeued_at, status or priority
        #[arg(long, default_value = "job_id")]
        sort_by: String,
        /// asc or desc
        #[arg(long, default_value = "asc")]
        sort_dir: String,
        /// Only jobs in these statuses (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
    },
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    pgjq_config::parse_duration("interval", s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Validate { path } = &cli.command {
        return commands::validate(path);
    }

    let config = commands::load(cli.config.as_deref(), cli.database_url)?;
    telemetry::init(&config.logging)?;

    match cli.command {
        Commands::Migrate => commands::migrate(&config).await?,
        Commands::Queue { command } => {
            let pgjq = commands::connect(&config).await?;
            let result = match command {
                QueueCommands::Create {
                    name,
                    if_not_exists,
                } => commands::queues::create(&pgjq, &name, if_not_exists).await,
                QueueCommands::Drop { name } => commands::queues::drop(&pgjq, &name).await,
                QueueCommands::Exists { name } => commands::queues::exists(&pgjq, &name).await,
                QueueCommands::List => commands::queues::list(&pgjq).await,
                QueueCommands::Purge { name } => commands::queues::purge(&pgjq, &name).await,
            };
            pgjq.shutdown().await;
            result?;
        }
        Commands::Job { command } => {
            let pgjq = commands::connect(&config).await?;
            let result = match command {
                JobCommands::Enqueue {
                    queue,
                    payload,
                    priority,
                    stale_after,
                    headers,
                } => {
                    commands::jobs::enqueue(
                        &pgjq,
                        &queue,
                        &payload,
                        priority,
                        stale_after,
                        headers.as_deref(),
                    )
                    .await
                }
                JobCommands::Dequeue { queue } => commands::jobs::dequeue(&pgjq, &queue).await,
                JobCommands::Ack { queue, id } => commands::jobs::ack(&pgjq, &queue, id).await,
                JobCommands::Nack { queue, id } => commands::jobs::nack(&pgjq, &queue, id).await,
                JobCommands::Cancel { queue, id } => {
                    commands::jobs::cancel(&pgjq, &queue, id).await
                }
                JobCommands::Delete { queue, id } => {
                    commands::jobs::delete(&pgjq, &queue, id).await
                }
                JobCommands::Get { queue, id } => commands::jobs::get(&pgjq, &queue, id).await,
                JobCommands::List {
                    queue,
                    page,
                    per_page,
                    sort_by,
                    sort_dir,
                    statuses,
                } => {
                    commands::jobs::list(
                        &pgjq, &queue, page, per_page, &sort_by, &sort_dir, &statuses,
                    )
                    .await
                }
            };
            pgjq.shutdown().await;
            result?;
        }
        Commands::Metrics { queue, total } => {
            let pgjq = commands::connect(&config).await?;
            let result = commands::metrics::show(&pgjq, queue.as_deref(), total).await;
            pgjq.shutdown().await;
            result?;
        }
        Commands::Chart { queue } => {
            let pgjq = commands::connect(&config).await?;
            let result = commands::metrics::chart(&pgjq, &queue).await;
            pgjq.shutdown().await;
            result?;
        }
        Commands::Reap {
            queue,
            all: _,
            watch,
            interval,
        } => {
            let interval = commands::reap::sweep_interval(watch, interval, &config.reaper);
            let pgjq = commands::connect(&config).await?;
            let result = commands::reap::run(&pgjq, queue.as_deref(), interval).await;
            pgjq.shutdown().await;
            result?;
        }
        // Handled above, before any configuration is loaded.
        Commands::Validate { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_job_enqueue() {
        let cli = Cli::try_parse_from([
            "pgjq",
            "job",
            "enqueue",
            "emails",
            r#"{"to":"a@example.com"}"#,
            "--priority",
            "-3",
            "--stale-after",
            "45s",
        ])
        .unwrap();

        match cli.command {
            Commands::Job {
                command:
                    JobCommands::Enqueue {
                        queue,
                        priority,
                        stale_after,
                        headers,
                        ..
                    },
            } => {
                assert_eq!(queue, "emails");
                assert_eq!(priority, -3);
                assert_eq!(stale_after, Some(Duration::from_secs(45)));
                assert_eq!(headers, None);
            }
            _ => panic!("expected job enqueue"),
        }
    }

    #[test]
    fn test_reap_requires_queue_or_all() {
        assert!(Cli::try_parse_from(["pgjq", "reap"]).is_err());
        assert!(Cli::try_parse_from(["pgjq", "reap", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["pgjq", "reap", "emails", "--all"]).is_err());

        let cli = Cli::try_parse_from(["pgjq", "reap", "emails", "--interval", "2m"]).unwrap();
        match cli.command {
            Commands::Reap { interval, .. } => {
                assert_eq!(interval, Some(Duration::from_secs(120)));
            }
            _ => panic!("expected reap"),
        }

        let cli = Cli::try_parse_from(["pgjq", "reap", "--all", "--watch"]).unwrap();
        match cli.command {
            Commands::Reap { watch, interval, .. } => {
                assert!(watch);
                assert_eq!(interval, None);
            }
            _ => panic!("expected reap"),
        }
    }

    #[test]
    fn test_bad_interval_rejected() {
        assert!(Cli::try_parse_from(["pgjq", "reap", "--all", "--interval", "soon"]).is_err());
    }

    #[test]
    fn test_job_list_statuses() {
        let cli = Cli::try_parse_from([
            "pgjq", "job", "list", "emails", "--status", "pending", "--status", "active",
        ])
        .unwrap();
        match cli.command {
            Commands::Job {
                command: JobCommands::List { statuses, page, .. },
            } => {
                assert_eq!(statuses, vec!["pending", "active"]);
                assert_eq!(page, 1);
            }
            _ => panic!("expected job list"),
        }
    }
}
