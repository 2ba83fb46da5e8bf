//! Shopfront CLI - database migrations, user management, and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! sf-cli migrate
//!
//! # Create a user (customer unless --role admin)
//! sf-cli user create -e ops@example.com -n "Ops" -p 'long enough password' -r admin
//!
//! # Promote an existing user to admin
//! sf-cli user promote -e ops@example.com
//!
//! # Load products and coupons from YAML
//! sf-cli seed catalog data/catalog.yaml
//! ```
//!
//! All commands read `SHOPFRONT_DATABASE_URL` (falling back to
//! `DATABASE_URL`), loading `.env` if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer` or `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// Give an existing user the admin role
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products and coupons from a YAML file
    Catalog {
        /// Path to the YAML file
        file: String,
    },
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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::user::create(&email, &name, &password, &role).await?;
            }
            UserAction::Promote { email } => commands::user::promote(&email).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&file).await?;
            }
        },
    }
    Ok(())
}
