use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for relay-proxy", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Admin API key.
    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pool status
    Status,
    /// List backends with liveness and connection counts
    Backends,
    /// Register a new backend
    Add {
        /// Backend URL, e.g. http://127.0.0.1:9001
        backend: String,
    },
    /// Remove a backend
    Remove {
        /// Backend URL, e.g. http://127.0.0.1:9001
        backend: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;

    match cli.command {
        Commands::Status => {
            let body: Value = client
                .get(format!("{}/status", cli.url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Backends => {
            let body: Value = client
                .get(format!("{}/backends", cli.url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Add { backend } => {
            let res = client
                .post(format!("{}/backends", cli.url))
                .json(&serde_json::json!({ "url": backend }))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            if status.is_success() {
                println!("Added {backend}");
            } else {
                eprintln!("{status}: {body}");
                std::process::exit(1);
            }
        }
        Commands::Remove { backend } => {
            let res = client
                .delete(format!("{}/backends", cli.url))
                .json(&serde_json::json!({ "url": backend }))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            if status.is_success() {
                println!("Removed {backend}");
            } else {
                eprintln!("{status}: {body}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
