use anyhow::Context;
use clap::{Parser, Subcommand};
use compx::{initialize_engine, CandidateProperty, RankingParams, SubjectProperty};
use compx_engine::{load_appraisals, train, EmbeddingIndex};
use compx_storage::{IndexStore, ModelStore};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Comparable-property recommendation engine for real-estate appraisals
#[derive(Parser, Debug)]
#[command(name = "compx")]
#[command(about = "Rank, price and explain comparable property sales", long_about = None)]
struct Args {
    /// Path to the data directory holding trained artifacts
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the similarity model from a historical appraisal dataset
    Train {
        /// JSON file of historical appraisals
        #[arg(long)]
        dataset: PathBuf,
    },
    /// Build the vectorized embedding index from a candidate corpus
    BuildIndex {
        /// JSON file of candidate properties
        #[arg(long)]
        corpus: PathBuf,
    },
    /// Rank candidates for a subject property
    Query {
        /// JSON file with the subject property
        #[arg(long)]
        subject: PathBuf,

        /// JSON file of candidate properties; required unless --use-index
        #[arg(long)]
        candidates: Option<PathBuf>,

        /// Search the prebuilt embedding index instead of a candidate file
        #[arg(long, default_value_t = false)]
        use_index: bool,

        /// Maximum candidate distance in miles
        #[arg(long, default_value_t = 5.0)]
        max_distance: f64,

        /// Maximum days since the candidate sale
        #[arg(long, default_value_t = 90)]
        max_days: i64,

        /// Number of recommendations to return
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Report which artifacts are loaded
    Status,
}

fn load_candidates(path: &PathBuf) -> anyhow::Result<Vec<CandidateProperty>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading candidate file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing candidate file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("compx v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    match args.command {
        Command::Train { dataset } => {
            let appraisals = load_appraisals(&dataset)?;
            let (bundle, metrics) = train(&appraisals)?;
            ModelStore::new(&args.data_dir).save(&bundle)?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Command::BuildIndex { corpus } => {
            let candidates = load_candidates(&corpus)?;
            let index = EmbeddingIndex::build(&candidates)?;
            IndexStore::new(&args.data_dir).save(&index)?;
            info!(rows = index.len(), "index built and saved");
        }
        Command::Query {
            subject,
            candidates,
            use_index,
            max_distance,
            max_days,
            top_k,
        } => {
            let engine = initialize_engine(&args.data_dir).await?;
            let raw = std::fs::read_to_string(&subject)
                .with_context(|| format!("reading subject file {}", subject.display()))?;
            let subject: SubjectProperty = serde_json::from_str(&raw)
                .context("parsing subject property")?;

            let recs = if use_index {
                engine.search_index(&subject, top_k)?
            } else {
                let candidates = candidates
                    .as_ref()
                    .context("--candidates is required unless --use-index is set")?;
                let candidates = load_candidates(candidates)?;
                let params = RankingParams {
                    max_distance_miles: max_distance,
                    max_days_since_sale: max_days,
                    top_k,
                };
                engine.recommend(&subject, &candidates, &params)?
            };

            println!("{}", serde_json::to_string_pretty(&recs)?);
        }
        Command::Status => {
            let engine = initialize_engine(&args.data_dir).await?;
            println!("{}", serde_json::to_string_pretty(&engine.status())?);
        }
    }

    Ok(())
}
