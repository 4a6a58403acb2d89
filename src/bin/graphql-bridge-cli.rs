use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphql_bridge::codegen::INTROSPECTION_QUERY;
use graphql_bridge::config::{load_config, ConfigError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "graphql-bridge-cli")]
#[command(about = "Client and config tooling for graphql-bridge", long_about = None)]
struct Cli {
    /// GraphQL endpoint of a running server.
    #[arg(short, long, default_value = "http://localhost:8080/graphql")]
    url: String,

    /// Extra request header, `name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a query or mutation and print the JSON response
    Query {
        /// Document text, or `@file.graphql` to read it from disk
        document: String,
        #[arg(long)]
        operation_name: Option<String>,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },
    /// Fetch the introspection result
    Introspect {
        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a config file and report every validation error
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            document,
            operation_name,
            variables,
        } => {
            let query = match document.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)?,
                None => document,
            };
            let variables: Value = match variables {
                Some(text) => serde_json::from_str(&text)?,
                None => Value::Null,
            };
            let body = json!({ "query": query, "operationName": operation_name, "variables": variables });
            let json = post(&cli.url, &cli.headers, &body).await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Introspect { output } => {
            let json = post(&cli.url, &cli.headers, &json!({ "query": INTROSPECTION_QUERY })).await?;
            let text = serde_json::to_string_pretty(json.get("data").unwrap_or(&json))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{text}\n"))?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(_) => println!("{}: ok", path.display()),
            Err(ConfigError::Validation(errors)) => {
                for error in &errors {
                    eprintln!("{}: {error}", path.display());
                }
                std::process::exit(1);
            }
            Err(error) => {
                eprintln!("{}: {error}", path.display());
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn post(url: &str, headers: &[String], body: &Value) -> Result<Value, Box<dyn std::error::Error>> {
    let response = reqwest::Client::new()
        .post(url)
        .headers(parse_headers(headers)?)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {status}");
    }
    Ok(response.json().await?)
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header `{header}` must look like `name: value`"))?;
        headers.insert(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}
