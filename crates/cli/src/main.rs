//! conduitctl - command-line client for the Conduit worker

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "conduitctl")]
#[command(about = "Conduit sync orchestration CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CONDUIT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the recurring schedule of a job
    Schedule {
        action: ScheduleAction,

        /// Job ID
        job_id: i64,
    },

    /// Show the most recent run of a job
    LastRun {
        /// Job ID
        job_id: i64,
    },

    /// Test a connector config
    Check {
        #[command(flatten)]
        connector: ConnectorArgs,

        /// Connector config as JSON, or @path to a JSON file
        #[arg(long)]
        config: String,

        /// Flag naming the config file passed to `check`
        #[arg(long, default_value = "config")]
        flag: String,
    },

    /// Discover the catalog of a source
    Discover {
        #[command(flatten)]
        connector: ConnectorArgs,

        /// Connector config as JSON, or @path to a JSON file
        #[arg(long)]
        config: String,

        /// Streams config as JSON, or @path to a JSON file
        #[arg(long)]
        streams: Option<String>,
    },

    /// Print a connector's spec
    Spec {
        #[command(flatten)]
        connector: ConnectorArgs,
    },
}

#[derive(Args)]
struct ConnectorArgs {
    /// Connector type (image name), e.g. postgres
    #[arg(long = "type")]
    connector_type: String,

    /// Connector image version
    #[arg(long)]
    version: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleAction {
    Create,
    Update,
    Delete,
    Trigger,
}

impl ScheduleAction {
    fn as_str(&self) -> &'static str {
        match self {
            ScheduleAction::Create => "create",
            ScheduleAction::Update => "update",
            ScheduleAction::Delete => "delete",
            ScheduleAction::Trigger => "trigger",
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct ScheduleRow {
    job_id: i64,
    action: String,
    message: String,
    #[serde(default)]
    #[tabled(display_with = "display_opt")]
    cron: Option<String>,
    #[serde(default)]
    #[tabled(display_with = "display_opt")]
    workflow_id: Option<String>,
}

#[derive(Deserialize, Tabled)]
struct LastRunRow {
    workflow_id: String,
    start_time: String,
    status: String,
}

fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// Inline JSON or `@path` to a JSON file
fn read_json_arg(arg: &str) -> Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Invalid JSON")
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to worker")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schedule { action, job_id } => {
            let params = json!({ "job_id": job_id, "action": action.as_str() });
            let result = call_rpc(&cli.rpc_url, "sync.manage.v1", params).await?;
            let row: ScheduleRow = serde_json::from_value(result)?;

            let headline = format!("✓ {}", row.message);
            if row.message.contains("skipped") {
                println!("{}", headline.yellow().bold());
            } else {
                println!("{}", headline.green().bold());
            }
            println!();
            println!("{}", Table::new(vec![row]));
        }

        Commands::LastRun { job_id } => {
            let result = call_rpc(&cli.rpc_url, "sync.last_run.v1", json!({ "job_id": job_id })).await?;

            match result.get("last_run").filter(|v| !v.is_null()) {
                Some(run) => {
                    let row: LastRunRow = serde_json::from_value(run.clone())?;
                    println!("{}", format!("Last run of job {}:", job_id).cyan().bold());
                    println!("{}", Table::new(vec![row]));
                }
                None => println!("{}", format!("Job {} has not run yet", job_id).yellow()),
            }
        }

        Commands::Check {
            connector,
            config,
            flag,
        } => {
            let params = json!({
                "connector_type": connector.connector_type,
                "version": connector.version,
                "config": read_json_arg(&config)?,
                "flag": flag,
            });
            let result = call_rpc(&cli.rpc_url, "connector.check.v1", params).await?;

            let status = result["status"].as_str().unwrap_or_default();
            let message = result["message"].as_str().unwrap_or_default();
            if status.eq_ignore_ascii_case("succeeded") {
                println!("{} {}", "✓".green().bold(), status.green());
            } else {
                println!("{} {}", "✗".red().bold(), status.red());
            }
            if !message.is_empty() {
                println!("  {}", message);
            }
        }

        Commands::Discover {
            connector,
            config,
            streams,
        } => {
            let streams = streams.as_deref().map(read_json_arg).transpose()?;
            let params = json!({
                "connector_type": connector.connector_type,
                "version": connector.version,
                "config": read_json_arg(&config)?,
                "streams_config": streams,
            });
            let catalog = call_rpc(&cli.rpc_url, "connector.discover.v1", params).await?;
            print_json(&catalog)?;
        }

        Commands::Spec { connector } => {
            let params = json!({
                "connector_type": connector.connector_type,
                "version": connector.version,
            });
            let spec = call_rpc(&cli.rpc_url, "connector.spec.v1", params).await?;
            print_json(&spec)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedule_command() {
        let cli = Cli::try_parse_from(["conduitctl", "schedule", "trigger", "42"]).unwrap();
        match cli.command {
            Commands::Schedule { action, job_id } => {
                assert_eq!(action.as_str(), "trigger");
                assert_eq!(job_id, 42);
            }
            _ => panic!("expected schedule command"),
        }
        assert_eq!(cli.rpc_url, DEFAULT_RPC_URL);
    }

    #[test]
    fn test_rejects_unknown_action() {
        assert!(Cli::try_parse_from(["conduitctl", "schedule", "pause", "1"]).is_err());
    }

    #[test]
    fn test_read_json_arg() {
        assert_eq!(read_json_arg(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(read_json_arg("{not json").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"host":"db"}"#).unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(read_json_arg(&arg).unwrap(), json!({"host": "db"}));
    }
}
