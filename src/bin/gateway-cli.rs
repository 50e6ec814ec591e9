use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use api_gateway::admin::handlers::SystemStatus;
use api_gateway::resilience::BreakerSnapshot;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000", env = "GATEWAY_URL")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    /// Print raw JSON instead of a table
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List circuit breaker state per upstream
    Breakers,
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

    let path = match cli.command {
        Commands::Status => "/admin/status",
        Commands::Breakers => "/admin/breakers",
    };
    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let body = res.text().await?;
    if cli.json {
        let json: serde_json::Value = serde_json::from_str(&body)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    match cli.command {
        Commands::Status => {
            let status: SystemStatus = serde_json::from_str(&body)?;
            println!("version:   {}", status.version);
            println!("status:    {}", status.status);
            println!("routes:    {}", status.routes);
            println!("upstreams: {}", status.upstreams);
            if !status.open_breakers.is_empty() {
                println!("open:      {}", status.open_breakers.join(", "));
            }
        }
        Commands::Breakers => {
            let breakers: Vec<BreakerSnapshot> = serde_json::from_str(&body)?;
            println!(
                "{:<16} {:<10} {:>9} {:>9} {:>8} {:>10}",
                "UPSTREAM", "STATE", "SUCCESS", "FAILURE", "RATE%", "REJECTED"
            );
            for b in breakers {
                println!(
                    "{:<16} {:<10} {:>9} {:>9} {:>8.1} {:>10}",
                    b.name, b.state.as_str(), b.successes, b.failures, b.failure_rate * 100.0, b.rejections
                );
            }
        }
    }

    Ok(())
}
