//! Marina CLI — operator surface for the media-URL validation pipeline.
//!
//! Set DATABASE_URL and PUBLIC_BASE_URL (see Config for the full list).

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

use marina_cli::{init_tracing, truncate_string};
use marina_core::Config;
use marina_db::{PgDocumentStore, ReportRepository};
use marina_queue::create_queue;
use marina_validator::{Classifier, HttpProbe, RepairService, Reporter, ValidationService};
use marina_worker::RepairWorker;

#[derive(Parser)]
#[command(name = "marina", about = "Media-URL validation and repair")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and classify every configured collection, write a report
    Validate {
        /// Also enqueue a repair task for each repairable URL
        #[arg(long)]
        enqueue_repairs: bool,
    },
    /// Publish repair tasks for repairable URLs and apply them
    Repair {
        /// Run without an in-process worker (an external worker must consume
        /// the tasks)
        #[arg(long)]
        no_worker: bool,
    },
    /// Run the repair worker until interrupted
    Worker,
    /// Inspect past runs
    Report {
        #[command(subcommand)]
        sub: ReportCommands,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Latest validation report
    Latest,
    /// Recent validation reports
    List {
        /// Maximum number of reports
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Recent repair runs with their fixed URLs
    History {
        /// Maximum number of runs
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize report")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context(
        "Failed to load configuration. Set DATABASE_URL and PUBLIC_BASE_URL",
    )?;
    init_tracing(config.is_production());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    sqlx::migrate!("../marina-db/migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let queue = create_queue(&config, Some(pool.clone()))?;
    let store = Arc::new(PgDocumentStore::new(pool.clone()));
    let reporter = Reporter::new(ReportRepository::new(pool));

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { enqueue_repairs } => {
            let probe = Arc::new(HttpProbe::new(&config)?);
            let service = ValidationService::new(
                store,
                Arc::new(Classifier::new(probe)),
                queue,
                Some(reporter),
                &config,
                enqueue_repairs,
            );
            let report = service.run().await?;
            print_json(&report)?;
        }
        Commands::Repair { no_worker } => {
            let worker = if no_worker {
                None
            } else {
                Some(RepairWorker::start(queue.clone(), store.clone(), &config).await?)
            };

            let service = RepairService::new(store, queue, Some(reporter), &config);
            let report = service.run().await?;
            print_json(&report)?;

            if let Some(worker) = worker {
                worker.close().await;
            }
        }
        Commands::Worker => {
            let handle = RepairWorker::start(queue, store, &config).await?;
            tracing::info!("Repair worker running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            handle.close().await;
            tracing::info!("Repair worker stopped");
        }
        Commands::Report { sub } => match sub {
            ReportCommands::Latest => match reporter.latest_report().await? {
                Some(report) => print_json(&report)?,
                None => println!("No validation reports yet"),
            },
            ReportCommands::List { limit } => {
                print_json(&reporter.list_reports(limit).await?)?;
            }
            ReportCommands::History { limit } => {
                for (report, records) in reporter.repair_history(limit).await? {
                    println!(
                        "{}  {}  attempted={} fixed={} already_fixed={} skipped={} failed={}",
                        report.created_at.format("%Y-%m-%d %H:%M:%S"),
                        report.id,
                        report.attempted,
                        report.fixed,
                        report.already_fixed,
                        report.skipped,
                        report.failed,
                    );
                    for record in records {
                        println!(
                            "    {}/{} {}: {} -> {}",
                            record.collection,
                            record.doc_id,
                            record.field_path,
                            truncate_string(&record.old_url, 48),
                            truncate_string(&record.new_url, 48),
                        );
                    }
                }
            }
        },
    }

    Ok(())
}
