//! Handset CLI - database migrations, seed data and staff roles.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations and create the session table
//! handset migrate
//!
//! # Load categories, products and pages from a YAML file
//! handset seed crates/cli/seed/catalog.yaml
//!
//! # Promote a signed-in user to admin
//! handset role set -e owner@example.com -r admin
//!
//! # List staff
//! handset role list
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "handset")]
#[command(author, version, about = "Handset CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed catalog and pages from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(default_value = "crates/cli/seed/catalog.yaml")]
        file: String,
    },
    /// Manage staff roles
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
}

#[derive(Subcommand)]
enum RoleAction {
    /// Assign a role to an existing profile
    Set {
        /// Email the user signed in with
        #[arg(short, long)]
        email: String,

        /// Role (`admin`, `editor`, `seo_manager`, `customer`)
        #[arg(short, long)]
        role: String,
    },
    /// List profiles with a staff role
    List,
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Role { action } => match action {
            RoleAction::Set { email, role } => {
                commands::role::set(&email, &role).await?;
            }
            RoleAction::List => commands::role::list().await?,
        },
    }
    Ok(())
}
