use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use steamconf_core::{
    generate_confirmation_key, generate_confirmation_key_raw, ClientConfig, ConfirmationClient,
    ConfirmationList, Operation,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Steam mobile confirmations from the command line
#[derive(Parser)]
#[command(name = "steamconf")]
#[command(about = "List, accept and deny Steam mobile confirmations", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "steamconf.toml")]
    config: PathBuf,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pending confirmations
    List,

    /// Accept confirmations by id
    Accept {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Deny confirmations by id
    Deny {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Accept every pending confirmation
    AcceptAll,

    /// Deny every pending confirmation
    DenyAll,

    /// Print the raw confirmation page
    Dump,

    /// Print a confirmation key for the given tag
    Key {
        /// Operation tag (conf, allow, cancel, details...)
        #[arg(long, default_value = "conf")]
        tag: String,

        /// Unix time in seconds (defaults to now)
        #[arg(long)]
        time: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let client = ConfirmationClient::new(config)?;

    match cli.command {
        Commands::List => {
            let list = client.load_confirmations().await?;
            print_list(&list);
        }
        Commands::Accept { ids } => {
            let list = client.load_confirmations().await?;
            decide(&list, &ids, Operation::Allow).await?;
        }
        Commands::Deny { ids } => {
            let list = client.load_confirmations().await?;
            decide(&list, &ids, Operation::Cancel).await?;
        }
        Commands::AcceptAll => {
            let list = client.load_confirmations().await?;
            decide(&list, &list.ids(), Operation::Allow).await?;
        }
        Commands::DenyAll => {
            let list = client.load_confirmations().await?;
            decide(&list, &list.ids(), Operation::Cancel).await?;
        }
        Commands::Dump => {
            println!("{}", client.fetch_confirmation_document().await?);
        }
        Commands::Key { tag, time } => {
            let secret = &client.config().identity_secret;
            let time = time.unwrap_or_else(|| chrono::Utc::now().timestamp());
            println!("time:    {}", time);
            println!("key:     {}", generate_confirmation_key_raw(secret, time, &tag)?);
            println!("encoded: {}", generate_confirmation_key(secret, time, &tag)?);
        }
    }

    Ok(())
}

fn print_list(list: &ConfirmationList) {
    if list.is_empty() {
        println!("Nothing to confirm");
        return;
    }

    list.for_each(|confirmation, index| {
        println!(
            "{:>3}. [{}] {}",
            index + 1,
            confirmation.id(),
            confirmation.descriptions().join(" / ")
        );
    });
}

async fn decide(list: &ConfirmationList, ids: &[u64], operation: Operation) -> Result<()> {
    let mut failed = 0;

    for &id in ids {
        let Some(confirmation) = list.get(id) else {
            warn!(id, "confirmation is not pending");
            failed += 1;
            continue;
        };

        let result = match operation {
            Operation::Allow => list.accept(&confirmation).await,
            Operation::Cancel => list.deny(&confirmation).await,
        };

        match result {
            Ok(true) => {
                info!(id, %operation, "decision accepted");
                println!("{} {}", operation, id);
            }
            Ok(false) => {
                println!("{} {} rejected by Steam", operation, id);
                failed += 1;
            }
            Err(e) => {
                warn!(id, %operation, error = %e, "decision failed");
                println!("{} {} failed: {}", operation, id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} confirmations were not processed", failed, ids.len());
    }
    Ok(())
}
