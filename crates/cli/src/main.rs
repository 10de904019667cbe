mod config;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use stockwatch_pipeline::notifier::LowStockMessage;
use stockwatch_pipeline::{evaluate, Verdict};
use stockwatch_storage::{AlertKind, AlertRecord};
use time::OffsetDateTime;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::StockwatchConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Inventory low-stock alerting and notification service.
#[derive(Parser)]
#[command(
    name = "stockwatch",
    version,
    about = "Inventory low-stock alerting and notification service"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the alert pipeline and the admin HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// JSON file of products to load at start-up
        #[arg(long)]
        seed: Option<PathBuf>,
        /// TLS certificate file (PEM); requires --tls-key
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// TLS private key file (PEM); requires --tls-cert
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Check whether an inventory change crosses the low-stock threshold
    Evaluate {
        /// Inventory before the write, or "absent"
        #[arg(long, default_value = "absent")]
        before: String,
        /// Inventory after the write, or "absent"
        #[arg(long)]
        after: String,
        /// Threshold override (default: from configuration)
        #[arg(long)]
        threshold: Option<i64>,
    },

    /// Print the notification that would be sent for a low-stock product
    Render {
        /// Product name
        #[arg(long)]
        name: String,
        /// Remaining inventory
        #[arg(long)]
        inventory: i64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Serve {
            port,
            seed,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(port, config, seed, tls_cert, tls_key))
            {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Evaluate {
            before,
            after,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(config.pipeline.threshold);
            cmd_evaluate(&before, &after, threshold, cli.output);
        }
        Commands::Render { name, inventory } => {
            cmd_render(&name, inventory, &config.pipeline.store_name, cli.output);
        }
    }
}

/// Structured logs to stderr, `info` unless `RUST_LOG` says otherwise.
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install log subscriber: {}", e);
    }
}

fn load_config(path: Option<&Path>) -> StockwatchConfig {
    match StockwatchConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Parse an inventory argument: an integer, or "absent"/"none" for no value.
fn parse_inventory(raw: &str) -> Result<Option<i64>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("absent")
        || trimmed.eq_ignore_ascii_case("none")
    {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("invalid inventory '{}': expected an integer or 'absent'", raw))
}

fn cmd_evaluate(before: &str, after: &str, threshold: i64, output: OutputFormat) {
    if threshold < 1 {
        eprintln!("error: threshold must be at least 1, got {}", threshold);
        process::exit(1);
    }
    let (before, after) = match (parse_inventory(before), parse_inventory(after)) {
        (Ok(b), Ok(a)) => (b, a),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let verdict = evaluate(before, after, threshold);
    match output {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "crossing": verdict.is_crossing(),
                "before": before,
                "after": after,
                "threshold": threshold,
            });
            let pretty = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => match verdict {
            Verdict::Crossing { inventory } => {
                println!(
                    "crossing: inventory {} is below threshold {}",
                    inventory, threshold
                );
            }
            Verdict::NoCrossing => println!("no crossing"),
        },
    }
}

fn cmd_render(name: &str, inventory: i64, store_name: &str, output: OutputFormat) {
    let now = OffsetDateTime::now_utc();
    let alert = AlertRecord {
        id: "preview".to_string(),
        kind: AlertKind::LowStock,
        product_id: "preview".to_string(),
        product_name: name.to_string(),
        inventory,
        resolved: false,
        created_at: now,
        resolved_at: None,
    };
    let message = LowStockMessage::render(&alert, store_name, now);

    match output {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "subject": message.subject,
                "text": message.text,
                "html": message.html,
            });
            let pretty = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            println!("Subject: {}", message.subject);
            println!();
            print!("{}", message.text);
        }
    }
}
