use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "vmess-cli")]
#[command(about = "Management CLI for the VMess manager", long_about = None)]
struct Cli {
    #[arg(short, long, env = "VMESS_MANAGER_URL", default_value = "http://localhost:8090")]
    url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a client and print its vmess:// link
    Add { name: String },
    /// Delete a client by name
    Delete { name: String },
    /// Delete every client
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print one client's vmess:// link
    Get { name: String },
    /// Print every stored link
    Ls,
    /// Show or change runtime settings
    Settings {
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        vmess_port: Option<u16>,
        #[arg(long)]
        host_port: Option<u16>,
        #[arg(long)]
        subscription_url: Option<String>,
    },
    /// Check whether the daemon is running
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Add { name } => {
            let res = client
                .post(endpoint(&cli.url, &["api", "vmess"])?)
                .json(&json!({ "ps": name }))
                .send()
                .await?;
            if let Some(body) = read_json(res).await? {
                println!("{}", body["vmess"].as_str().unwrap_or_default());
            }
        }
        Commands::Delete { name } => {
            let res = client
                .delete(endpoint(&cli.url, &["api", "vmess", &name])?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Clear { yes } => {
            if !yes && !confirm("Are you sure you want to clear all configs? (yes/no): ")? {
                println!("Aborted.");
                return Ok(());
            }
            let res = client
                .delete(endpoint(&cli.url, &["api", "vmess"])?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Get { name } => {
            let res = client
                .get(endpoint(&cli.url, &["api", "vmess", &name])?)
                .send()
                .await?;
            if let Some(body) = read_json(res).await? {
                println!("{}", body["_raw"].as_str().unwrap_or_default());
            }
        }
        Commands::Ls => {
            let res = client.get(endpoint(&cli.url, &["api", "list"])?).send().await?;
            if let Some(Value::Array(entries)) = read_json(res).await? {
                for entry in entries {
                    println!("{}", entry["_raw"].as_str().unwrap_or_default());
                }
            }
        }
        Commands::Settings {
            ip,
            vmess_port,
            host_port,
            subscription_url,
        } => {
            let mut patch = Map::new();
            if let Some(ip) = ip {
                patch.insert("IP".into(), json!(ip));
            }
            if let Some(port) = vmess_port {
                patch.insert("VMESS_PORT".into(), json!(port));
            }
            if let Some(port) = host_port {
                patch.insert("HOST_PORT".into(), json!(port));
            }
            if let Some(path) = subscription_url {
                patch.insert("SUBSCRIPTION_URL".into(), json!(path));
            }

            let url = endpoint(&cli.url, &["api", "settings"])?;
            let res = if patch.is_empty() {
                client.get(url).send().await?
            } else {
                client.post(url).json(&patch).send().await?
            };
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(endpoint(&cli.url, &["api", "health"])?).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// Append percent-encoded path segments to the base URL.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Parse a successful JSON body; report failures on stderr.
async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }
    Ok(Some(res.json().await?))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(json) = read_json(res).await? {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
