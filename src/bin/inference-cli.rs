use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "inference-cli")]
#[command(about = "Management CLI for the inference server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Admin API key
    #[arg(short, long, env = "INFERENCE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// Aggregate audit log statistics
    Stats,
    /// Circuit breaker states
    Circuits,
    /// Fallback buffer depth and drops
    Buffer,
    /// Replay buffered audit records now
    Flush,
    /// Classify a piece of text
    Infer {
        text: String,
        /// Idempotency key sent as X-Idempotency-Key
        #[arg(long = "idempotency-key")]
        idempotency_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => admin_get(&client, &cli.url, "status", headers).await?,
        Commands::Stats => admin_get(&client, &cli.url, "stats", headers).await?,
        Commands::Circuits => admin_get(&client, &cli.url, "circuits", headers).await?,
        Commands::Buffer => admin_get(&client, &cli.url, "buffer", headers).await?,
        Commands::Flush => {
            client
                .post(format!("{}/admin/flush", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Infer {
            text,
            idempotency_key,
        } => {
            let mut req = client
                .post(format!("{}/infer", cli.url))
                .json(&json!({ "text": text }));
            if let Some(key) = idempotency_key {
                req = req.header("x-idempotency-key", key);
            }
            req.send().await?
        }
    };

    print_response(res).await
}

async fn admin_get(
    client: &reqwest::Client,
    url: &str,
    path: &str,
    headers: HeaderMap,
) -> Result<reqwest::Response, reqwest::Error> {
    client
        .get(format!("{}/admin/{}", url, path))
        .headers(headers)
        .send()
        .await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
