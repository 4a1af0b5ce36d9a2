//! RiskIntel CLI
//!
//! Structural and web-corroborated risk detection for wealth snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use riskintel_agents::DefinitionScope;
use riskintel_core::{
    ContextualStatus, DefinitionOutcome, PortfolioSnapshot, RiskReport, SearchCategory, Severity,
};
use riskintel_runtime::{Credentials, Engine, Settings};

#[derive(Parser)]
#[command(name = "riskintel")]
#[command(author, version, about = "RiskIntel: hybrid wealth risk detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

/// Search provider API keys
#[derive(Args)]
struct KeyArgs {
    /// Brave Search API key (or set BRAVE_API_KEY env var)
    #[arg(long, env = "BRAVE_API_KEY", hide_env_values = true)]
    brave_key: Option<String>,

    /// Serper API key (or set SERPER_API_KEY env var)
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    serper_key: Option<String>,

    /// Tavily API key (or set TAVILY_API_KEY env var)
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    tavily_key: Option<String>,
}

impl KeyArgs {
    fn credentials(self) -> Credentials {
        Credentials {
            brave: self.brave_key,
            serper: self.serper_key,
            tavily: self.tavily_key,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a portfolio snapshot
    Analyze {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Settings TOML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the report (default: risk_report_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ceiling on contextual analysis in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Structural analysis only
        #[arg(long)]
        no_contextual: bool,

        /// Use only the preferred provider of each category
        #[arg(long)]
        no_fallback: bool,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Show configured search providers and per-category routing
    Providers {
        /// Settings TOML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// List contextual search definitions
    Definitions {
        /// Settings TOML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Analyze {
            snapshot,
            config,
            output,
            timeout,
            no_contextual,
            no_fallback,
            keys,
        } => {
            let mut settings = load_settings(config.as_deref())?;
            if let Some(secs) = timeout {
                settings.engine.max_wait_secs = secs;
            }
            if no_contextual {
                settings.contextual.enabled = false;
            }
            if no_fallback {
                settings.search.enable_fallback = false;
            }
            run_analysis(&snapshot, &settings, &keys.credentials(), output).await?;
        }
        Commands::Providers { config, keys } => {
            let settings = load_settings(config.as_deref())?;
            show_providers(&settings, &keys.credentials())?;
        }
        Commands::Definitions { config } => {
            let settings = load_settings(config.as_deref())?;
            show_definitions(&settings)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn load_snapshot(path: &Path) -> Result<PortfolioSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))
}

async fn run_analysis(
    snapshot_path: &Path,
    settings: &Settings,
    credentials: &Credentials,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("📊 RiskIntel - Wealth risk analysis\n");

    let snapshot = load_snapshot(snapshot_path)?;
    println!(
        "💼 Snapshot: {} custodians, {} crypto platforms, total {:.0} {}",
        snapshot.custodians.len(),
        snapshot.crypto.len(),
        snapshot.grand_total(),
        snapshot.base_currency
    );

    let engine = Engine::from_settings(settings, credentials).context("failed to assemble engine")?;
    let contextual_mode = if settings.contextual.enabled { "enabled" } else { "disabled" };
    println!(
        "🔎 Contextual: {} | Providers: {} | Ceiling: {}s\n",
        contextual_mode,
        engine.chain().provider_ids().join(", "),
        settings.engine.max_wait_secs
    );

    let report = engine.run(snapshot).await.context("analysis failed")?;
    print_summary(&report);

    let output_path = output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("risk_report_{}.json", timestamp))
    });
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&output_path, json)
        .with_context(|| format!("failed to write report to {}", output_path.display()))?;

    println!("\n✅ Analysis complete!");
    println!("📄 Report saved to: {}", output_path.display());
    Ok(())
}

fn print_summary(report: &RiskReport) {
    println!("{}", "=".repeat(60));
    for severity in Severity::ALL {
        let bucket = report.registry.bucket(severity);
        let marker = match severity {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🟢",
        };
        println!("{} {} ({})", marker, severity.as_str().to_uppercase(), bucket.len());
        for record in bucket {
            println!(
                "   {:<14} {} [{:.0} / {:.1}%]",
                record.id.as_str(),
                record.title,
                record.exposure_amount,
                record.exposure_pct
            );
            for source in &record.sources {
                println!("                  ↳ {}", source.url);
            }
        }
    }
    println!("{}", "=".repeat(60));

    match report.contextual_status {
        ContextualStatus::Disabled => println!("\n🔎 Contextual analysis disabled"),
        ContextualStatus::Failed => println!("\n⚠️  Contextual analysis failed, structural results only"),
        status => {
            if status == ContextualStatus::TimedOut {
                println!("\n⚠️  Contextual analysis hit the ceiling, results are partial");
            }
            println!("\n🔎 Contextual definitions:");
            for (id, outcome) in &report.definitions {
                println!("   {:<20} {}", id, describe(outcome));
            }
        }
    }

    println!(
        "\n⏱️  Structural: {} ms | Contextual: {} ms | Searches: {}",
        report.structural_ms,
        report.contextual_ms,
        report.search_history.len()
    );
    println!("🔑 Fingerprint: {}", report.fingerprint);
}

fn describe(outcome: &DefinitionOutcome) -> String {
    match outcome {
        DefinitionOutcome::Detected { risk_id } => format!("detected ({})", risk_id),
        DefinitionOutcome::BelowThreshold {
            qualifying,
            required,
            mean_score,
        } => format!(
            "no risk ({} of {} sources, mean score {:.2})",
            qualifying, required, mean_score
        ),
        DefinitionOutcome::NoResults => "no risk (no results)".to_string(),
        DefinitionOutcome::Exhausted { warning } => format!("skipped: {}", warning),
        DefinitionOutcome::NotApplicable => "not applicable".to_string(),
        DefinitionOutcome::TimedOut => "timed out".to_string(),
    }
}

fn show_providers(settings: &Settings, credentials: &Credentials) -> Result<()> {
    let engine = Engine::from_settings(settings, credentials).context("failed to assemble engine")?;
    let chain = engine.chain();

    println!("🔌 Search providers (priority order):\n");
    for status in chain.statuses() {
        let state = if status.available {
            "✅ available"
        } else if status.requires_credentials {
            "❌ missing API key or disabled"
        } else {
            "❌ disabled"
        };
        println!("   {:<12} {}", status.id, state);
    }

    println!("\n🧭 Resolution order per category:");
    for category in SearchCategory::ALL {
        println!("   {:<13} {}", category.as_str(), chain.resolved_order(category).join(" → "));
    }
    if !settings.search.enable_fallback {
        println!("\n   Fallback disabled: only the first provider is tried");
    }
    Ok(())
}

fn show_definitions(settings: &Settings) -> Result<()> {
    let engine =
        Engine::from_settings(settings, &Credentials::default()).context("failed to assemble engine")?;
    let definitions = engine.definitions();

    println!("📋 Contextual definitions ({}):\n", definitions.len());
    for definition in definitions.all() {
        let state = if definition.enabled { "on " } else { "off" };
        let scope = match definition.scope {
            DefinitionScope::Portfolio => "",
            DefinitionScope::Property => " per property",
        };
        println!(
            "   [{}] {:<22} {:<13} {} ({}){}",
            state,
            definition.id,
            definition.category.as_str(),
            definition.risk.title,
            definition.risk.severity,
            scope
        );
        for query in &definition.queries {
            println!("         • {}", query);
        }
    }
    Ok(())
}
