use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bina_engine::{Bina, EngineConfig, MasteryState, Tier};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use content_utils::Catalog;

/// Simulate a learner using Bina for a number of days and print what happened each day.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory with one `<topic>.json` file per topic
    #[arg(long)]
    catalog_dir: PathBuf,

    /// Engine configuration JSON; defaults apply to missing keys
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 14)]
    days: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = SimTier::Free)]
    tier: SimTier,

    /// Chance that the learner knows any given card
    #[arg(long, default_value_t = 0.7)]
    recall: f64,

    /// First simulated day, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Print one JSON object per day instead of a table
    #[arg(long)]
    json: bool,

    /// Write the journal to this file when done
    #[arg(long)]
    journal_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SimTier {
    Free,
    Plus,
    Pro,
}

impl From<SimTier> for Tier {
    fn from(tier: SimTier) -> Self {
        match tier {
            SimTier::Free => Tier::Free,
            SimTier::Plus => Tier::Plus,
            SimTier::Pro => Tier::Pro,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let catalog = Catalog::load_dir(&args.catalog_dir)
        .with_context(|| format!("loading catalog from {}", args.catalog_dir.display()))?;
    if catalog.is_empty() {
        anyhow::bail!("catalog at {} has no items", args.catalog_dir.display());
    }
    log::info!("Loaded {} items", catalog.len());

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json(&text).context("parsing engine config")?
        }
        None => EngineConfig::default(),
    };

    let start: DateTime<Utc> = match args.start {
        Some(date) => date
            .and_hms_opt(9, 0, 0)
            .context("invalid start time")?
            .and_utc(),
        None => Utc::now(),
    };

    let state = MasteryState {
        tier: args.tier.into(),
        ..MasteryState::default()
    };
    let engine = Bina::with_state(Arc::new(catalog), config, state, args.seed);
    let mut simulation = engine.simulate_usage(start, args.recall, args.seed.wrapping_add(1));

    if !args.json {
        println!("date        topic         answered  correct  xp      level  streak  weak  capped");
    }
    for _ in 0..args.days {
        let (next, day) = simulation.next();
        simulation = next;
        if args.json {
            println!("{}", serde_json::to_string(&day)?);
        } else {
            let topic = day
                .topic
                .map(|topic| format!("{topic:?}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<11} {:<13} {:>8}  {:>7}  {:>6}  {:>5}  {:>6}  {:>4}  {}",
                day.date.to_string(),
                topic,
                day.answered,
                day.correct,
                day.xp,
                day.level,
                day.streak,
                day.weak_points,
                if day.capped { "yes" } else { "" }
            );
        }
    }

    let engine = simulation.into_engine();
    if let Err(violation) = engine.state().check_invariants() {
        anyhow::bail!("simulation broke an invariant: {violation}");
    }
    if let Some(path) = &args.journal_out {
        std::fs::write(path, engine.journal_json_lines()?)
            .with_context(|| format!("writing journal to {}", path.display()))?;
        log::info!("Wrote {} journal events to {}", engine.journal().len(), path.display());
    }
    Ok(())
}
