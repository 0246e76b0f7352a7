mod menu;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use weft_actions::ActionRegistry;
use weft_core::config::AppConfig;
use weft_core::event::EventBus;
use weft_core::types::{StepContext, WorkflowEvent};
use weft_gateway::GatewayServer;
use weft_models::{ChatParams, Message, ModelRegistry};
use weft_workflow::{Workflow, WorkflowDef, WorkflowResult, WorkflowRunner};

#[derive(Parser)]
#[command(name = "weft", version, about = "Workflow-driven CLI for hosted AI model endpoints")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive menu
    Menu,
    /// List registered models
    Models,
    /// Send a single chat prompt and print the reply
    Chat {
        /// The prompt to send
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Model id (defaults to the configured chat model)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Embed a text and print the vector dimensions
    Embed {
        /// The text to embed
        text: String,
        /// Model id (defaults to the configured embedding model)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run a workflow definition file
    Run {
        /// Path to the workflow TOML file
        file: PathBuf,
        /// Initial context entries as key=value pairs
        #[arg(short = 'C', long = "context")]
        context: Vec<String>,
    },
    /// Start the HTTP gateway server
    Serve,
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
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "weft", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), "Configuration resolved");

    let models = Arc::new(ModelRegistry::with_defaults(config.api.clone()));
    let actions = Arc::new(ActionRegistry::with_builtins(
        models.clone(),
        config.model.clone(),
    ));

    match cli.command {
        None | Some(Commands::Menu) => {
            menu::run_menu(&config, &models, &actions).await?;
        }
        Some(Commands::Models) => {
            print_models(&models);
        }
        Some(Commands::Chat { prompt, model }) => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("No prompt given");
            }
            let reply = chat_once(&config, &models, &prompt, model.as_deref()).await?;
            println!("{}", reply);
        }
        Some(Commands::Embed { text, model }) => {
            let model_id = model.unwrap_or_else(|| config.model.embedding.clone());
            let handle = models.handle(&model_id).await?;
            let response = handle.embed(&[text]).await?;
            match response.data.first() {
                Some(embedding) => {
                    println!("{} dimensions from {}", embedding.embedding.len(), model_id)
                }
                None => anyhow::bail!("Model returned no embedding"),
            }
        }
        Some(Commands::Run { file, context }) => {
            let initial = parse_context(&context)?;
            let result = run_workflow_file(&file, initial, actions).await?;
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Some(Commands::Serve) => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            let server = GatewayServer::new(
                gateway_config,
                models,
                actions,
                Arc::new(EventBus::default()),
            );

            let shutdown = CancellationToken::new();
            let ctrl_c_token = shutdown.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                ctrl_c_token.cancel();
            });

            server.run(shutdown).await?;
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Completions { .. }) => unreachable!("handled above"),
    }

    Ok(())
}

fn print_models(models: &ModelRegistry) {
    for spec in models.list() {
        println!("{:<18} {:<10} {}", spec.id, spec.kind.to_string(), spec.description);
    }
}

async fn chat_once(
    config: &AppConfig,
    models: &ModelRegistry,
    prompt: &str,
    model: Option<&str>,
) -> anyhow::Result<String> {
    let model_id = model
        .map(str::to_string)
        .unwrap_or_else(|| config.model.chat.clone());
    let handle = models.handle(&model_id).await?;

    let params = ChatParams {
        max_tokens: config.model.max_tokens,
        temperature: config.model.temperature,
        top_p: config.model.top_p,
    };
    let response = handle.chat(&[Message::user(prompt)], &params).await?;

    response
        .text()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Model '{}' returned an empty response", model_id))
}

/// Parse `--context key=value` pairs. Values that parse as JSON are kept
/// structured; everything else becomes a string.
fn parse_context(pairs: &[String]) -> anyhow::Result<StepContext> {
    let mut context = HashMap::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("Invalid context entry '{}', expected key=value", pair)
        })?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

async fn run_workflow_file(
    file: &PathBuf,
    initial: StepContext,
    actions: Arc<ActionRegistry>,
) -> anyhow::Result<WorkflowResult> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", file.display(), e))?;
    let def: WorkflowDef = toml::from_str(&content)?;
    let mut workflow = Workflow::try_from(def)?;

    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                WorkflowEvent::StepStarted {
                    step,
                    action,
                    index,
                    total,
                } => {
                    println!("[{}/{}] {} ({})", index, total, step, action);
                }
                WorkflowEvent::StepFailed { step, error } => {
                    println!("      {} failed: {}", step, error);
                }
                WorkflowEvent::RunCompleted { .. }
                | WorkflowEvent::RunFailed { .. }
                | WorkflowEvent::RunCancelled { .. } => break,
                _ => {}
            }
        }
    });

    let runner = WorkflowRunner::new(actions).with_events(events);
    let result = runner.run(&mut workflow, initial).await;
    let _ = printer.await;

    match &result.error {
        None => {
            println!(
                "Workflow '{}' completed: {} steps in {:.2}s",
                workflow.name,
                result.steps_completed,
                result.execution_time.as_secs_f64()
            );
            if let Some(output) = &result.output {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
        }
        Some(error) => {
            eprintln!(
                "Workflow '{}' failed ({} of {} steps completed): {}",
                workflow.name, result.steps_completed, result.total_steps, error
            );
        }
    }

    Ok(result)
}
