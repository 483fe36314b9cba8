mod db;
mod fetcher;
mod normalize;
mod pipeline;
mod raw;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::db::VerificationReport;
use crate::fetcher::ApiClient;
use crate::normalize::Card;
use crate::pipeline::{BuildReport, PipelineContext};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "swu_cards", about = "Star Wars Unlimited card database builder")]
struct Cli {
    /// SQLite file to use (overrides SWU_DB_PATH / swu.toml)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop the card tables, fetch every card from the API and rebuild them
    Build {
        /// Cards requested per page
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Report counts and integrity checks for the current database
    Verify,
    /// Print one card with its aspects, keywords, traits and arenas as JSON
    Show {
        /// Card id
        id: String,
    },
    /// Cards overview table
    Overview {
        /// Filter by type (Leader, Base, Unit, Event, Upgrade)
        #[arg(short = 't', long = "type")]
        card_type: Option<String>,
        /// Filter by set code (e.g. "SOR")
        #[arg(short, long)]
        set: Option<String>,
        /// Filter by aspect (e.g. "Villainy")
        #[arg(short, long)]
        aspect: Option<String>,
        /// Name contains
        #[arg(short = 'q', long)]
        name: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    info!("Database: {}", settings.db_path.display());

    let result = match cli.command {
        Commands::Build { page_size } => {
            let page_size = page_size.unwrap_or(settings.page_size).max(1);
            let client = ApiClient::new(&settings)?;
            let ctx = PipelineContext::open(&settings.db_path)?.with_progress(true);
            info!("Building card database from {}", client.endpoint());
            let report = pipeline::run(&ctx, &client, page_size).await?;
            print_build(&report);
            Ok(())
        }
        Commands::Verify => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let report = db::verify(&conn)?;
            print_verification(&report);
            Ok(())
        }
        Commands::Show { id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            match db::fetch_card(&conn, &id)? {
                Some(view) => {
                    println!("{}", Card::from_row(view.card.clone()));
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&view).context("Failed to encode card")?
                    );
                }
                None => println!("No card with id {}. Run 'build' first?", id),
            }
            Ok(())
        }
        Commands::Overview {
            card_type,
            set,
            aspect,
            name,
            limit,
        } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let filter = db::OverviewFilter {
                card_type: card_type.as_deref(),
                set_code: set.as_deref(),
                aspect: aspect.as_deref(),
                name: name.as_deref(),
            };
            let rows = db::fetch_overview(&conn, &filter, limit)?;
            if rows.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            println!(
                "{:>6} | {:<28} | {:<8} | {:<9} | {:>4} | {:>7} | {:<20}",
                "Id", "Card", "Type", "Set", "Cost", "Atk/Hp", "Aspects"
            );
            println!("{}", "-".repeat(100));

            for r in &rows {
                let name = if r.subtitle.is_empty() {
                    r.name.clone()
                } else {
                    format!("{}, {}", r.name, r.subtitle)
                };
                let set = format!("{} {}", r.set_code, r.card_number);
                let cost = r.energy_cost.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
                let stats = match (r.attack, r.health) {
                    (Some(a), Some(h)) => format!("{}/{}", a, h),
                    (None, Some(h)) => format!("-/{}", h),
                    _ => "-".into(),
                };
                println!(
                    "{:>6} | {:<28} | {:<8} | {:<9} | {:>4} | {:>7} | {:<20}",
                    truncate(&r.id, 6),
                    truncate(&name, 28),
                    truncate(&r.card_type, 8),
                    truncate(&set, 9),
                    cost,
                    stats,
                    truncate(&r.aspects, 20)
                );
            }

            println!("\n{} cards", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_build(report: &BuildReport) {
    println!(
        "Fetched {} cards: {} stored, {} skipped.",
        report.fetched,
        report.stored,
        report.skipped_total()
    );
    for (reason, count) in &report.skipped {
        println!("  skipped ({}): {}", reason, count);
    }
    println!();
    print_verification(&report.verification);
}

fn print_verification(r: &VerificationReport) {
    println!("Total cards: {}", r.total_cards);

    println!("\nCard types:");
    for (card_type, count) in &r.by_type {
        println!("  {:<12} {}", card_type, count);
    }

    println!("\nRelated rows:");
    println!("  Aspects:  {}", r.child_rows.aspects);
    println!("  Keywords: {}", r.child_rows.keywords);
    println!("  Traits:   {}", r.child_rows.traits);
    println!("  Arenas:   {}", r.child_rows.arenas);

    println!("\nIntegrity checks:");
    for (label, count) in &r.integrity {
        println!("  {:<30} {}", label, count);
    }

    println!("\nRelated data coverage:");
    println!("  Cards with aspects:  {}", r.coverage.aspects);
    println!("  Cards with keywords: {}", r.coverage.keywords);
    println!("  Cards with traits:   {}", r.coverage.traits);
    println!("  Cards with arenas:   {}", r.coverage.arenas);
    println!("  Orphaned rows:       {}", r.orphans);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("Luke", 6), "Luke");
        assert_eq!(truncate("Darth Vader, Dark Lord", 10), "Darth V...");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_secs(75)), "1m 15s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn cli_parses_overview_filters() {
        let cli = Cli::try_parse_from([
            "swu_cards", "--db", "x.sqlite", "overview", "-t", "Leader", "-a", "Villainy", "-n", "5",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.sqlite")));
        match cli.command {
            Commands::Overview {
                card_type, aspect, limit, ..
            } => {
                assert_eq!(card_type.as_deref(), Some("Leader"));
                assert_eq!(aspect.as_deref(), Some("Villainy"));
                assert_eq!(limit, 5);
            }
            _ => panic!("expected overview"),
        }
    }
}
