pub mod commands;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "todo-admin")]
#[command(about = "Operator CLI for the multi-tenant to-do API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Tenant management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "User management within a tenant")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Commands::Migrate => commands::db::migrate(&config, output_format).await,
        Commands::Tenant { cmd } => {
            let state = open_state(config).await?;
            let result = commands::tenant::handle(cmd, &state, output_format).await;
            state.store.close().await;
            result
        }
        Commands::User { cmd } => {
            let state = open_state(config).await?;
            let result = commands::user::handle(cmd, &state, output_format).await;
            state.store.close().await;
            result
        }
    }
}

async fn open_state(config: AppConfig) -> anyhow::Result<AppState> {
    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open store")?;
    AppState::new(config, Arc::clone(&store)).context("failed to build application state")
}
