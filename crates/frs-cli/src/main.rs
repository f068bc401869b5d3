//! `frs-etl`: loads the FRS operational database into the star-schema
//! warehouse.
//!
//! # Usage
//!
//! ```text
//! frs-etl init
//! frs-etl run --mode historical
//! frs-etl run --job dim_mata_kuliah --job fact_pengambilan_kelas --json
//! frs-etl watermark fact_persetujuan_frs
//! frs-etl verify
//! ```
//!
//! Paths and defaults come from `etl.toml` (or `--config`) and `FRS_ETL_*`
//! environment variables; see [`settings::EtlConfig`].

mod settings;
mod summary;

use std::path::PathBuf;

use anyhow::{Context as _, bail, ensure};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use frs_core::{
  FactTable, Table,
  pipeline::{self, EtlContext, LoadMode, RunOptions},
  watermark,
};
use frs_store_sqlite::{SqliteSource, SqliteWarehouse};
use settings::EtlConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "frs-etl", version, about = "FRS data warehouse loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "etl.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the ETL jobs.
  Run {
    /// `historical` or `incremental`; overrides the configured mode.
    #[arg(long)]
    mode: Option<LoadMode>,

    /// Effective date of SCD2 changes (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Restrict the run to these tables. Repeatable; dependency order is kept.
    #[arg(long = "job", value_name = "TABLE", value_parser = Table::parse)]
    jobs: Vec<Table>,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
  },
  /// Print the current watermark of a fact table.
  Watermark {
    #[arg(value_name = "FACT_TABLE")]
    fact: FactTable,
  },
  /// Check SCD2 timelines and fact key uniqueness.
  Verify,
  /// Create the warehouse schema.
  Init,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = EtlConfig::load(&cli.config)?;

  match cli.command {
    Command::Run { mode, today, jobs, json } => {
      run(&cfg, mode, today, jobs, json).await
    }
    Command::Watermark { fact } => {
      let warehouse = open_warehouse(&cfg).await?;
      let mark = watermark::watermark(&warehouse, fact)
        .await
        .with_context(|| format!("failed to read the watermark of {fact}"))?;
      match mark {
        Some(date) => println!("{fact}: {date}"),
        None => println!("{fact}: none (table is empty)"),
      }
      Ok(())
    }
    Command::Verify => {
      let warehouse = open_warehouse(&cfg).await?;
      let report = pipeline::verify(&warehouse)
        .await
        .context("verification failed to run")?;
      print!("{}", summary::verify_report(&report));
      if !report.is_clean() {
        bail!("warehouse integrity check failed");
      }
      Ok(())
    }
    Command::Init => {
      open_warehouse(&cfg).await?;
      println!("warehouse schema ready at {}", cfg.warehouse_path.display());
      Ok(())
    }
  }
}

async fn run(
  cfg: &EtlConfig,
  mode: Option<LoadMode>,
  today: Option<NaiveDate>,
  jobs: Vec<Table>,
  json: bool,
) -> anyhow::Result<()> {
  ensure!(
    cfg.source_path.exists(),
    "source database {} does not exist",
    cfg.source_path.display()
  );
  let source = SqliteSource::open(&cfg.source_path)
    .await
    .with_context(|| format!("failed to open source at {:?}", cfg.source_path))?;
  let warehouse = open_warehouse(cfg).await?;

  let options = RunOptions::new(
    mode.unwrap_or(cfg.mode),
    today
      .or(cfg.today)
      .unwrap_or_else(|| chrono::Local::now().date_naive()),
  )
  .with_jobs(jobs);

  let report = match EtlContext::new(source, warehouse, options).run().await {
    Ok(report) => report,
    Err(err) => {
      if let Some(conflict) = err.conflict_report() {
        let rendered = serde_json::to_string_pretty(conflict)
          .context("failed to render the conflict report")?;
        eprintln!("{rendered}");
      }
      return Err(err).context("ETL run failed");
    }
  };

  if json {
    println!(
      "{}",
      serde_json::to_string_pretty(&report).context("failed to render report")?
    );
  } else {
    print!("{}", summary::run_report(&report));
  }
  Ok(())
}

async fn open_warehouse(cfg: &EtlConfig) -> anyhow::Result<SqliteWarehouse> {
  SqliteWarehouse::open(&cfg.warehouse_path)
    .await
    .with_context(|| {
      format!("failed to open warehouse at {:?}", cfg.warehouse_path)
    })
}
