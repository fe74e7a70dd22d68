mod demo;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use relayflow_core::config::AppConfig;
use relayflow_core::flow::register_flows;
use relayflow_core::types::RequestMeta;
use relayflow_tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "relayflow", version, about = "Stateless conversational flows exposed as tools")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "relayflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered flows
    List,
    /// Show a flow's tool description and input schema
    Describe {
        /// Flow id
        flow: String,
    },
    /// Make one stateless call and print the response
    Call {
        /// Flow id
        flow: String,
        /// Tool input as JSON
        #[arg(long, default_value = r#"{"action":"start"}"#)]
        input: String,
        /// Request metadata as a JSON object
        #[arg(long)]
        meta: Option<String>,
    },
    /// Drive a flow interactively from the terminal
    Run {
        /// Flow id
        flow: String,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "relayflow", &mut io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    debug!(path = %cli.config.display(), "Configuration loaded");

    let mut registry = ToolRegistry::from_config(&config.host);
    let flows = demo::flows(&config.engine)?;
    register_flows(&mut registry, &flows);
    info!(flows = flows.len(), "Flows registered");

    match cli.command {
        Commands::List => {
            for flow in &flows {
                println!("{:<16} {}", flow.id, flow.title);
            }
        }
        Commands::Describe { flow } => {
            let tool = registry
                .get(&flow)
                .ok_or_else(|| anyhow::anyhow!("unknown flow: {}", flow))?;
            let def = tool.definition();
            println!("{} ({})\n", def.title, def.name);
            println!("{}\n", def.description);
            println!("Input schema:");
            println!("{}", serde_json::to_string_pretty(&def.input_schema)?);
        }
        Commands::Call { flow, input, meta } => {
            let input: Value = serde_json::from_str(&input)?;
            let meta = parse_meta(meta.as_deref())?;
            let response = registry.execute(&flow, input, meta).await?;
            println!("{}", response.text);
        }
        Commands::Run { flow } => {
            if registry.get(&flow).is_none() {
                anyhow::bail!("unknown flow: {}", flow);
            }
            run_interactive(&registry, &flow).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

fn parse_meta(raw: Option<&str>) -> anyhow::Result<RequestMeta> {
    match raw {
        None => Ok(RequestMeta::new()),
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("--meta must be a JSON object"),
        },
    }
}

/// Read one trimmed line. `None` on EOF or `/quit`.
fn prompt(label: &str) -> anyhow::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim().to_string();
    if matches!(line.as_str(), "/quit" | "/exit" | "/q") {
        return Ok(None);
    }
    Ok(Some(line))
}

/// `key=value key2=value2` into a JSON object of strings.
fn parse_pairs(line: &str) -> Value {
    let map: serde_json::Map<String, Value> = line
        .split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    Value::Object(map)
}

/// Play the caller: show each pause, collect the answer, replay the state.
async fn run_interactive(registry: &ToolRegistry, flow: &str) -> anyhow::Result<()> {
    println!("Running {}. Type /quit to stop.\n", flow);

    let mut input = json!({"action": "start", "state": {}});

    loop {
        let response = registry.execute(flow, input, RequestMeta::new()).await?;
        let doc = response.json()?;
        let state = doc.get("state").cloned().unwrap_or_else(|| json!({}));

        input = match doc["status"].as_str().unwrap_or_default() {
            "interrupt" => {
                println!("{}", doc["question"].as_str().unwrap_or_default());
                if let Some(suggestions) = doc["suggestions"].as_array() {
                    let options: Vec<&str> = suggestions.iter().filter_map(Value::as_str).collect();
                    println!("  options: {}", options.join(" | "));
                }
                let Some(answer) = prompt("> ")? else { break };
                json!({
                    "action": "continue",
                    "step": doc["step"],
                    "field": doc["field"],
                    "answer": answer,
                    "state": state,
                })
            }
            "gathering" => {
                if let Some(errors) = doc["errors"].as_object() {
                    for (name, message) in errors {
                        println!("  ! {}: {}", name, message.as_str().unwrap_or_default());
                    }
                }
                let missing: Vec<String> = doc["missing"]
                    .as_array()
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(|name| {
                                let label = doc["fields"][name]["label"].as_str().unwrap_or(name);
                                format!("{} ({})", name, label)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                println!("Still needed: {}", missing.join(", "));
                let Some(line) = prompt("key=value> ")? else { break };
                json!({"action": "submit", "data": parse_pairs(&line), "state": state})
            }
            "widget" => {
                println!(
                    "Widget {} is showing: {}",
                    doc["widgetId"].as_str().unwrap_or_default(),
                    serde_json::to_string(&response.structured_content)?
                );
                let Some(line) = prompt("widget result (JSON)> ")? else { break };
                let widget_result: Value = serde_json::from_str(&line)?;
                let step = if doc["step"].is_string() {
                    doc["step"].clone()
                } else {
                    doc["field"].clone()
                };
                json!({
                    "action": "widget_result",
                    "step": step,
                    "widgetResult": widget_result,
                    "state": state,
                })
            }
            "complete" => {
                if let Some(result) = doc.get("result") {
                    println!("Result: {}", serde_json::to_string_pretty(result)?);
                }
                println!("State: {}", serde_json::to_string_pretty(&state)?);
                break;
            }
            _ => {
                println!("Error: {}", doc["error"].as_str().unwrap_or("unknown error"));
                break;
            }
        };
    }

    Ok(())
}
