//! Gundam Store CLI - catalog seeding and inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the products in a seed file (admin account required)
//! gs-cli seed --file seed/products.yaml --email admin@example.com
//!
//! # List the catalog, optionally by grade (any store account)
//! gs-cli products list --grade MG --email pilot@example.com
//! ```
//!
//! # Commands
//!
//! - `seed` - Create products from a YAML seed file
//! - `products list` - List the catalog
//!
//! Both commands talk to the hosted backend configured by `BACKEND_URL`
//! and `BACKEND_ANON_KEY`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gundam_store_core::Grade;

mod commands;

#[derive(Parser)]
#[command(name = "gs-cli")]
#[command(author, version, about = "Gundam Store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create products from a YAML seed file
    Seed {
        /// Path to the seed file
        #[arg(short, long)]
        file: PathBuf,

        /// Admin account email
        #[arg(short, long, env = "GS_ADMIN_EMAIL")]
        email: String,

        /// Admin account password
        #[arg(short, long, env = "GS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Inspect the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products, newest first
    List {
        /// Only show this grade (HG, MG, SD, PG, RG)
        #[arg(short, long)]
        grade: Option<Grade>,

        /// Store account email
        #[arg(short, long, env = "GS_EMAIL")]
        email: String,

        /// Store account password
        #[arg(short, long, env = "GS_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed {
            file,
            email,
            password,
        } => commands::seed::products(&file, &email, &password).await?,
        Commands::Products { action } => match action {
            ProductsAction::List {
                grade,
                email,
                password,
            } => commands::products::list(grade, &email, &password).await?,
        },
    }
    Ok(())
}
