//! # DialOps — Voice Outreach Operations
//!
//! Operations service for a voice-agent calling platform: dashboard
//! metrics, call history, a contacts table with CSV import/export, and a
//! batch outreach scheduler that dials contacts at a configurable cadence.
//!
//! Usage:
//!   dialops serve                        # Start the operator API gateway
//!   dialops call 10299658                # Manual test call by encounter ID
//!   dialops contacts import list.csv     # Upsert a CSV into the table
//!   dialops contacts export -o out.csv   # Export the table as CSV
//!   dialops contacts clear --yes         # Delete every row
//!   dialops metrics --range 7d           # Dashboard metrics
//!   dialops agents                       # List configured voice agents

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dialops_core::DialopsConfig;
use dialops_core::types::MetricRange;
use dialops_provider::VoiceClient;
use dialops_scheduler::dispatch::dispatch_contact;
use dialops_store::TableStore;

#[derive(Parser)]
#[command(name = "dialops", version, about = "📞 DialOps — Voice Outreach Operations")]
struct Cli {
    /// Config file path (default: ~/.dialops/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the operator API gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
    },
    /// Place one manual test call by encounter ID
    Call {
        encounter_id: String,
        /// Dial this number instead of the stored primary phone
        #[arg(long)]
        phone: Option<String>,
    },
    /// Contacts table operations
    Contacts {
        #[command(subcommand)]
        command: ContactsCommand,
    },
    /// Dashboard metrics
    Metrics {
        /// Range: 7d, 30d, or all
        #[arg(long, default_value = "7d")]
        range: String,
        /// Scope to one agent ID
        #[arg(long)]
        agent: Option<String>,
        /// Print raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// List configured voice agents
    Agents {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ContactsCommand {
    /// Upsert a CSV file into the contacts table
    Import { file: PathBuf },
    /// Export the contacts table as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete every row of the contacts table
    Clear {
        /// Skip the confirmation requirement
        #[arg(long)]
        yes: bool,
    },
}

fn load_config(cli: &Cli) -> Result<DialopsConfig> {
    match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            DialopsConfig::load_from(std::path::Path::new(&expanded))
                .with_context(|| format!("Failed to load config from {expanded}"))
        }
        None => DialopsConfig::load().context("Failed to load config"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "dialops=debug,tower_http=debug"
    } else {
        "dialops=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Serve { port, host } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            tracing::info!("🚀 Starting DialOps gateway");
            dialops_gateway::start(config).await
        }

        Command::Call {
            encounter_id,
            phone,
        } => {
            let store = TableStore::new(config.store.clone());
            let provider = VoiceClient::new(config.provider.clone());

            let table = store.contacts_table().to_string();
            let rows = store.fetch_rows(&table).await?;
            let needle = encounter_id.trim().to_lowercase();
            let Some(row) = rows
                .iter()
                .find(|row| row.value("encounter_id").to_lowercase() == needle)
            else {
                bail!("No contact matches encounter ID \"{}\"", encounter_id.trim());
            };

            let label = row.label();
            let outcome = dispatch_contact(&provider, row, phone.as_deref()).await?;
            match outcome.call_id {
                Some(id) => println!("✅ Call queued for {label} (ID: {id})"),
                None => println!("✅ Call queued for {label}"),
            }
            Ok(())
        }

        Command::Contacts { command } => {
            let store = TableStore::new(config.store.clone());
            let table = store.contacts_table().to_string();
            match command {
                ContactsCommand::Import { file } => {
                    let content = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let rows = dialops_store::parse_csv(&content);
                    if rows.is_empty() {
                        bail!("The provided CSV does not contain any rows.");
                    }
                    let imported = store.import_rows(&table, &rows).await?;
                    println!("✅ Imported {imported} row(s) into {table}");
                }
                ContactsCommand::Export { output } => {
                    let csv = store.export_csv(&table).await?;
                    match output {
                        Some(path) => {
                            std::fs::write(&path, csv)
                                .with_context(|| format!("Failed to write {}", path.display()))?;
                            println!("✅ Exported {table} to {}", path.display());
                        }
                        None => print!("{csv}"),
                    }
                }
                ContactsCommand::Clear { yes } => {
                    if !yes {
                        bail!("Refusing to clear \"{table}\" without --yes.");
                    }
                    let removed = store.delete_all_rows(&table).await?;
                    println!("🗑️ Removed {removed} row(s) from {table}");
                }
            }
            Ok(())
        }

        Command::Metrics { range, agent, json } => {
            let range: MetricRange = range
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let provider = VoiceClient::new(config.provider.clone());
            let metrics = provider.metrics(range, agent.as_deref()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
                return Ok(());
            }

            println!("📊 Metrics ({})", range.as_str());
            println!("   Total calls:      {}", metrics.total_calls);
            println!(
                "   Average duration: {:.0}s",
                metrics.average_duration_seconds
            );
            println!(
                "   Success rate:     {:.1}%",
                metrics.success_rate * 100.0
            );
            for day in &metrics.calls_by_day {
                println!("   {}  {} call(s)", day.date, day.calls);
            }
            Ok(())
        }

        Command::Agents { json } => {
            let provider = VoiceClient::new(config.provider.clone());
            let agents = provider.list_agents().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
                return Ok(());
            }

            if agents.is_empty() {
                println!("No agents found (is the provider API key set?)");
                return Ok(());
            }
            for agent in &agents {
                println!("🤖 {}  ({})", agent.name, agent.agent_id);
            }
            Ok(())
        }
    }
}
