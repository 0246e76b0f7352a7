//! Interactive menu for browsing models and running tasks.

use std::path::PathBuf;
use std::sync::Arc;

use dialoguer::{Input, Select};

use weft_actions::ActionRegistry;
use weft_core::config::AppConfig;
use weft_models::{ChatParams, Message, ModelKind, ModelRegistry};

pub async fn run_menu(
    config: &AppConfig,
    models: &Arc<ModelRegistry>,
    actions: &Arc<ActionRegistry>,
) -> anyhow::Result<()> {
    println!("weft {} (hosted model workflows)", env!("CARGO_PKG_VERSION"));

    loop {
        let choice = Select::new()
            .with_prompt("What would you like to do?")
            .items(&[
                "List available models",
                "Chat with a model",
                "Run a workflow file",
                "Show configuration",
                "Quit",
            ])
            .default(0)
            .interact()?;

        match choice {
            0 => list_models(models),
            1 => chat(config, models).await?,
            2 => run_workflow(actions).await?,
            3 => println!("{}", toml::to_string_pretty(config)?),
            _ => break,
        }
    }

    Ok(())
}

fn list_models(models: &ModelRegistry) {
    for kind in [ModelKind::Chat, ModelKind::Embedding, ModelKind::Image] {
        let specs = models.by_kind(kind);
        if specs.is_empty() {
            continue;
        }
        println!("\n{}:", kind);
        for spec in specs {
            println!("  {:<18} {}", spec.id, spec.description);
        }
    }
    println!();
}

async fn chat(config: &AppConfig, models: &ModelRegistry) -> anyhow::Result<()> {
    let chat_models = models.by_kind(ModelKind::Chat);
    let ids: Vec<&str> = chat_models.iter().map(|s| s.id.as_str()).collect();
    let default_idx = ids
        .iter()
        .position(|id| *id == config.model.chat)
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Model")
        .items(&ids)
        .default(default_idx)
        .interact()?;
    let model_id = ids[selection];

    let prompt: String = Input::new().with_prompt("Prompt").interact_text()?;

    let handle = models.handle(model_id).await?;
    let params = ChatParams {
        max_tokens: config.model.max_tokens,
        temperature: config.model.temperature,
        top_p: config.model.top_p,
    };

    match handle.chat(&[Message::user(prompt)], &params).await {
        Ok(response) => match response.text() {
            Some(text) => println!("\n{}\n", text),
            None => println!("\n(empty response)\n"),
        },
        Err(e) => println!("\nRequest failed: {}\n", e),
    }

    Ok(())
}

async fn run_workflow(actions: &Arc<ActionRegistry>) -> anyhow::Result<()> {
    let path: String = Input::new()
        .with_prompt("Workflow file")
        .default("workflows/demo.toml".to_string())
        .interact_text()?;

    let result = crate::run_workflow_file(
        &PathBuf::from(path),
        weft_core::types::StepContext::new(),
        actions.clone(),
    )
    .await;

    if let Err(e) = result {
        println!("\n{}\n", e);
    }

    Ok(())
}
