use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use customer_dashboard::config::Settings;
use customer_dashboard::dashboard::Dashboard;
use customer_dashboard::filter::{
    date_bounds, distinct_cities, distinct_segments, resolve_date_range,
};
use customer_dashboard::models::{FilterSpec, TransactionRow};
use customer_dashboard::store::PgDocumentStore;
use customer_dashboard::{ingest, metrics, report};

#[derive(Parser)]
#[command(name = "customer-dashboard")]
#[command(about = "Customer revenue and churn dashboard", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the document store schema
    InitDb,
    /// Parse a transaction CSV and append it to the document store
    Ingest {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the values the filters accept
    Filters {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show KPIs and the customer table
    Summary {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Case-insensitive match on customer name
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Show revenue per month
    Trend {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Show one customer's profile
    Customer {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        id: String,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct ScopeArgs {
    #[arg(long)]
    csv: PathBuf,
    /// Keep only these cities (repeatable)
    #[arg(long = "city")]
    cities: Vec<String>,
    /// Keep only these segments (repeatable)
    #[arg(long = "segment")]
    segments: Vec<String>,
    /// First order day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last order day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

fn build_filter(scope: &ScopeArgs, rows: &[TransactionRow]) -> anyhow::Result<FilterSpec> {
    Ok(FilterSpec {
        cities: scope.cities.iter().cloned().collect::<BTreeSet<_>>(),
        segments: scope.segments.iter().cloned().collect::<BTreeSet<_>>(),
        date_range: resolve_date_range(scope.from, scope.to, rows)?,
    })
}

fn open_session(scope: &ScopeArgs) -> anyhow::Result<(Dashboard, FilterSpec)> {
    let working_set = load(&scope.csv)?;
    let filter = build_filter(scope, &working_set.rows)?;
    Ok((Dashboard::new(working_set), filter))
}

fn load(path: &Path) -> anyhow::Result<customer_dashboard::models::WorkingSet> {
    let (working_set, _) = ingest::load_csv(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(working_set)
}

async fn connect(settings: &Settings) -> anyhow::Result<PgDocumentStore> {
    PgDocumentStore::connect(settings.database_url()?, settings.max_connections)
        .await
        .context("failed to connect to Postgres")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = cli.settings;
    let currency = settings.currency.as_str();

    match cli.command {
        Commands::InitDb => {
            let store = connect(&settings).await?;
            store.init().await.context("failed to run migrations")?;
            store.close().await;
            println!("Schema ready.");
        }
        Commands::Ingest { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;

            let store = connect(&settings).await?;
            let result = ingest::upload(&store, &settings.collection, file).await;
            store.close().await;
            let stored = result.with_context(|| format!("failed to ingest {}", csv.display()))?;

            print!("{}", report::render_ingest_report(&stored.report));
            println!(
                "Stored {} rows from {} in collection `{}`.",
                stored.written,
                csv.display(),
                settings.collection
            );
        }
        Commands::Filters { csv } => {
            let working_set = load(&csv)?;
            println!("Cities:   {}", distinct_cities(&working_set.rows).join(", "));
            println!("Segments: {}", distinct_segments(&working_set.rows).join(", "));
            match date_bounds(&working_set.rows) {
                Some((first, last)) => println!("Orders:   {first} to {last}"),
                None => println!("Orders:   no valid order dates"),
            }
        }
        Commands::Summary {
            scope,
            search,
            limit,
        } => {
            let (dashboard, filter) = open_session(&scope)?;
            let view = dashboard.view(&filter, search.as_deref());
            info!(scope = %report::describe_filter(&filter), "rendering summary");

            print!("{}", report::render_kpis(&view.kpis, currency));
            println!();
            print!("{}", report::render_customer_table(&view.matches, currency, limit));
        }
        Commands::Trend { scope } => {
            let (dashboard, filter) = open_session(&scope)?;
            let view = dashboard.view(&filter, None);
            print!("{}", report::render_trend(&view.trend, currency));
        }
        Commands::Customer { scope, id } => {
            let (dashboard, filter) = open_session(&scope)?;
            let view = dashboard.view(&filter, None);
            let customer = metrics::find_customer(&view.customers, &id)
                .with_context(|| format!("customer {id} is not in the selected scope"))?;
            print!("{}", report::render_profile(customer, currency));
        }
        Commands::Report {
            scope,
            search,
            top,
            out,
        } => {
            let (dashboard, filter) = open_session(&scope)?;
            let view = dashboard.view(&filter, search.as_deref());
            let markdown = report::build_report(&view, &filter, currency, top);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
