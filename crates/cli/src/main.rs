mod log;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use powerlaw_core::{
    models::{
        chart::Resolution,
        settings::Settings,
        simulation::SimulationKind,
        variant::ModelVariant,
    },
    services::{
        export_service::{rows_to_csv, rows_to_json},
        price_model::HORIZON_YEAR,
        validation_service::{PhaseForm, SimulationForm},
    },
    Forecaster,
};
use std::path::PathBuf;

use log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an optional JSON settings file
    #[arg(short, long, global = true)]
    config_path: Option<PathBuf>,

    /// Persist caches in this directory instead of memory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print yearly model prices
    Model {
        #[arg(long, default_value_t = Utc::now().year())]
        from: i32,
        #[arg(long, default_value_t = HORIZON_YEAR)]
        to: i32,
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },
    /// Assemble the price chart and print it as JSON
    Chart {
        #[arg(long, value_enum)]
        resolution: Option<ResolutionArg>,
        /// Print only the headline figures
        #[arg(long)]
        summary: bool,
    },
    /// Run a holdings projection
    Simulate(SimulateArgs),
    /// Drop cached chart and daily data
    ClearCache,
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long, value_enum)]
    kind: KindArg,
    #[arg(long, value_enum, default_value_t = VariantArg::Standard)]
    variant: VariantArg,
    /// BTC already held
    #[arg(long)]
    initial_btc: Option<String>,
    /// Local-currency lump sum invested in the first year
    #[arg(long)]
    initial_investment: Option<String>,
    /// Local currency per USD; fetched when omitted
    #[arg(long)]
    exchange_rate: Option<String>,
    /// Annual inflation, percent
    #[arg(long)]
    inflation: Option<String>,
    /// Withdrawal tax, percent
    #[arg(long)]
    tax: Option<String>,
    #[arg(long, value_enum, default_value_t = ModeArg::Fixed)]
    mode: ModeArg,
    /// Monthly amount (fixed mode) or yearly percent of holdings (percentage mode)
    #[arg(long)]
    value: String,
    #[arg(long)]
    start_year: String,
    #[arg(long)]
    duration: Option<String>,
    #[arg(long, value_enum)]
    secondary_mode: Option<ModeArg>,
    #[arg(long, requires = "secondary_mode")]
    secondary_value: Option<String>,
    #[arg(long, requires = "secondary_mode")]
    secondary_start_year: Option<String>,
    #[arg(long, requires = "secondary_mode")]
    secondary_duration: Option<String>,
    #[arg(long, default_value_t = Utc::now().year())]
    current_year: i32,
    #[arg(long, default_value_t = HORIZON_YEAR)]
    horizon_year: i32,
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    format: FormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Invest,
    Withdraw,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Fixed,
    Percentage,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Standard,
    Conservative,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResolutionArg {
    Daily,
    Monthly,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
}

impl From<VariantArg> for ModelVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Standard => ModelVariant::Standard,
            VariantArg::Conservative => ModelVariant::Conservative,
        }
    }
}

impl From<ResolutionArg> for Resolution {
    fn from(r: ResolutionArg) -> Self {
        match r {
            ResolutionArg::Daily => Resolution::Daily,
            ResolutionArg::Monthly => Resolution::Monthly,
        }
    }
}

fn phase_form(mode: ModeArg, value: &str, start_year: &str, duration: Option<&str>) -> PhaseForm {
    let form = match mode {
        ModeArg::Fixed => PhaseForm::fixed(value, start_year),
        ModeArg::Percentage => PhaseForm::percentage(value, start_year),
    };
    match duration {
        Some(years) => form.with_duration(years),
        None => form,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut settings = match &cli.config_path {
        Some(path) => Settings::load_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(dir) = cli.cache_dir {
        settings.cache_dir = Some(dir);
    }

    let result = run(command, settings).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}

async fn run(command: Commands, mut settings: Settings) -> Result<()> {
    match command {
        Commands::Model { from, to, variant } => {
            if let Some(v) = variant {
                settings.chart_variant = v.into();
            }
            let forecaster = Forecaster::new(settings)?;
            let prices = forecaster.model_prices(from, to)?;
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }
        Commands::Chart { resolution, summary } => {
            if let Some(r) = resolution {
                settings.resolution = r.into();
            }
            let forecaster = Forecaster::new(settings)?;
            let series = forecaster.load_chart_now().await;
            if summary {
                let headline = serde_json::json!({
                    "timestampMs": series.timestamp_ms,
                    "latestPriceUsd": series.latest_price_usd,
                    "previousPrice": series.previous_price,
                    "exchangeRate": series.exchange_rate,
                    "rSquared": series.r_squared,
                    "source": series.source.to_string(),
                    "degraded": series.degraded,
                    "points": series.points.len(),
                });
                println!("{}", serde_json::to_string_pretty(&headline)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&series)?);
            }
        }
        Commands::Simulate(args) => {
            let forecaster = Forecaster::new(settings)?;
            let kind = match args.kind {
                KindArg::Invest => SimulationKind::Investment,
                KindArg::Withdraw => SimulationKind::Withdrawal,
            };
            let primary = phase_form(args.mode, &args.value, &args.start_year, args.duration.as_deref());

            let mut form = SimulationForm::new(kind, primary, args.current_year);
            form.variant = args.variant.into();
            form.initial_btc = args.initial_btc;
            form.initial_investment = args.initial_investment;
            form.inflation_rate = args.inflation;
            form.tax_rate = args.tax;
            form.horizon_year = args.horizon_year;
            form.exchange_rate = match args.exchange_rate {
                Some(rate) => Some(rate),
                None => Some(forecaster.exchange_rate().await.rate.to_string()),
            };
            if let Some(mode) = args.secondary_mode {
                form.secondary = Some(phase_form(
                    mode,
                    args.secondary_value.as_deref().unwrap_or_default(),
                    args.secondary_start_year.as_deref().unwrap_or_default(),
                    args.secondary_duration.as_deref(),
                ));
            }

            let rows = forecaster.simulate(&form)?;
            let output = match args.format {
                FormatArg::Json => rows_to_json(&rows)?,
                FormatArg::Csv => rows_to_csv(&rows)?,
            };
            println!("{output}");
        }
        Commands::ClearCache => {
            let forecaster = Forecaster::new(settings)?;
            forecaster.invalidate_cache()?;
            tracing::info!("Cache cleared");
        }
    }
    Ok(())
}

