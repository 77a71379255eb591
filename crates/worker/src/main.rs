use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twscreen_core::domain::record::Category;
use twscreen_core::llm::gemini::GeminiClient;
use twscreen_core::llm::prompt::ScreeningCriteria;
use twscreen_core::llm::GenerationClient;

mod analyze;
mod screen;

#[derive(Debug, Parser)]
#[command(name = "twscreen_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Screen both categories concurrently and print the combined results as JSON.
    Screen {
        /// Stocks to ask for per category.
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// JSON file with `longTerm` / `swingTrade` criteria text.
        #[arg(long)]
        criteria: Option<PathBuf>,

        /// Fail unless both categories complete.
        #[arg(long)]
        require_all: bool,

        /// Write results here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Find more stocks for one category, skipping tickers already in a results file.
    /// The file is updated in place.
    More {
        #[arg(long, value_enum)]
        category: CategoryArg,

        #[arg(long)]
        results: PathBuf,

        /// Let the model relax the most restrictive criteria.
        #[arg(long)]
        loosen: bool,

        #[arg(long)]
        count: Option<usize>,

        #[arg(long)]
        criteria: Option<PathBuf>,
    },

    /// Deep-dive analysis of a single ticker.
    Analyze { ticker: String },

    /// Split a budget across the stocks in a results file.
    Allocate {
        #[arg(long)]
        results: PathBuf,

        /// Total budget in TWD.
        #[arg(long)]
        amount: f64,

        /// Percentage of the budget for long-term holdings.
        #[arg(long, default_value_t = 50)]
        ratio: u8,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    LongTerm,
    SwingTrade,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::LongTerm => Category::LongTerm,
            CategoryArg::SwingTrade => Category::SwingTrade,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = twscreen_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker run failed");
    }
    result
}

async fn run(args: Args, settings: &twscreen_core::config::Settings) -> anyhow::Result<()> {
    let client: Arc<dyn GenerationClient> = Arc::new(GeminiClient::from_settings(settings)?);
    let scan_mode = settings.scan_mode();

    match args.command {
        Command::Screen {
            count,
            criteria,
            require_all,
            out,
        } => {
            let criteria = load_criteria(criteria.as_deref())?;
            let report = screen::screen(client, &criteria, count, scan_mode, require_all).await?;
            match out {
                Some(path) => write_json(&path, &report),
                None => print_json(&report),
            }
        }
        Command::More {
            category,
            results,
            loosen,
            count,
            criteria,
        } => {
            let criteria = load_criteria(criteria.as_deref())?;
            // A loosened search only asks for a few extra names.
            let count = count.unwrap_or(if loosen { 3 } else { 5 });
            let params = screen::FollowUp {
                category: category.into(),
                count,
                loosen,
            };
            screen::more(client, &criteria, &results, params, scan_mode).await
        }
        Command::Analyze { ticker } => {
            let analysis = analyze::single_stock(client.as_ref(), &ticker).await?;
            print_json(&analysis)
        }
        Command::Allocate {
            results,
            amount,
            ratio,
        } => {
            let plan = analyze::allocate(client.as_ref(), &results, amount, ratio).await?;
            print_json(&plan)
        }
    }
}

fn init_sentry(settings: &twscreen_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn load_criteria(path: Option<&Path>) -> anyhow::Result<ScreeningCriteria> {
    let Some(path) = path else {
        return Ok(ScreeningCriteria::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read criteria file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("criteria file {} is not valid JSON", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}
