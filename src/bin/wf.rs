use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wfauth::{
    workflowy::SESSION_CONFIG_PATH, Authenticator, Credentials, SessionConfig, WorkflowyClient,
};

#[derive(Parser)]
#[command(name = "wf", about = "Read and edit a WorkFlowy outline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Session config holding `sessionid` and node aliases.
    #[arg(long, global = true, default_value = SESSION_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange client credentials for an access token
    Auth,
    /// Print the whole outline as nested JSON
    Tree,
    /// Print the account's user id, clock and transaction ids
    UserData,
    /// Create a top-level bullet through the public API
    CreateNode {
        title: String,
        /// Get the API key from the credential exchange instead of WORKFLOWY_API_KEY
        #[arg(long, default_value_t = false)]
        login: bool,
    },
    /// Create a bullet under a parent node (id or alias)
    CreateNodeUnder {
        title: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Rename a node (id or alias)
    EditNode { project_id: String, name: String },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wfauth=info,wf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let session = SessionConfig::load_or_default(&cli.config)?;
    let client = WorkflowyClient::from_env(&session)?;

    match cli.command {
        Commands::Auth => {
            let response = Authenticator::from_env()?
                .authenticate(&Credentials::from_env())
                .await?;
            print_json(response.value())?;
        }
        Commands::Tree => print_json(&client.get_tree().await?)?,
        Commands::UserData => print_json(&client.get_user_data().await?)?,
        Commands::CreateNode { title, login } => {
            let client = if login {
                let response = Authenticator::from_env()?
                    .authenticate(&Credentials::from_env())
                    .await?;
                client.with_auth(&response)?
            } else {
                client
            };
            print_json(&client.create_node(&title).await?)?;
        }
        Commands::CreateNodeUnder { title, parent } => {
            let parent = parent.as_deref().map(|p| session.resolve(p));
            print_json(&client.create_node_under(&title, parent).await?)?;
        }
        Commands::EditNode { project_id, name } => {
            let project_id = session.resolve(&project_id);
            print_json(&client.edit_node(project_id, &name).await?)?;
        }
    }

    Ok(())
}
