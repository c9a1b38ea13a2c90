//! # Labtrack - Lab Progression Server
//!
//! The main binary for the Labtrack progression and assessment engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog, progress and certificate operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               apps/labtrack (THE BINARY)             │
//! │                                                      │
//! │   ┌─────────────┐          ┌─────────────┐          │
//! │   │    CLI      │          │  HTTP API   │          │
//! │   │   (clap)    │          │   (axum)    │          │
//! │   └──────┬──────┘          └──────┬──────┘          │
//! │          └─────────────┬──────────┘                 │
//! │                        ▼                            │
//! │               ┌────────────────┐                    │
//! │               │ labtrack-core  │                    │
//! │               │  (THE LOGIC)   │                    │
//! │               └────────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! labtrack server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! labtrack labs
//! labtrack transition alice bb84 view_theory
//! labtrack transition alice bb84 submit_quiz --answers 1,0,2,1,3
//! labtrack certificate alice bb84 --check
//! ```

use clap::Parser;
use labtrack::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // LABTRACK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LABTRACK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "labtrack=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(error_kind = e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Labtrack startup banner.
fn print_banner() {
    println!(
        r#"
  Labtrack v{}

  Theory > Quiz > Exercise > Certificate
"#,
        env!("CARGO_PKG_VERSION")
    );
}
