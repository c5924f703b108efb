use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::{Config, ProviderKind};

/// Interactive wizard that writes a starter configuration file.
pub fn run(output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("mica init - configuration wizard\n");

    let mut config = Config::default();

    let providers = [ProviderKind::OpenAi, ProviderKind::Claude, ProviderKind::Proxy];
    let selection = Select::new()
        .with_prompt("LLM provider")
        .items(&["openai", "claude", "openai-compatible proxy"])
        .default(0)
        .interact()?;
    config.llm.provider = providers[selection];

    match config.llm.provider {
        ProviderKind::OpenAi => {
            config.llm.model = Input::new()
                .with_prompt("Chat model")
                .default("gpt-4o-mini".into())
                .interact_text()?;
            let embedding: String = Input::new()
                .with_prompt("Embedding model (empty to disable retrieval)")
                .default("text-embedding-3-small".into())
                .allow_empty(true)
                .interact_text()?;
            config.llm.embedding_model = (!embedding.is_empty()).then_some(embedding);
        }
        ProviderKind::Claude => {
            config.llm.model = Input::new()
                .with_prompt("Chat model")
                .default("claude-sonnet-4-5".into())
                .interact_text()?;
            // No embeddings on this API; retrieval stays off unless a proxy
            // provides them.
            config.llm.embedding_model = None;
        }
        ProviderKind::Proxy => {
            config.llm.proxy_name = Some(
                Input::new()
                    .with_prompt("Proxy name")
                    .default("litellm".into())
                    .interact_text()?,
            );
            config.llm.base_url = Input::new()
                .with_prompt("Base URL")
                .default("http://localhost:4000".into())
                .interact_text()?;
            config.llm.model = Input::new().with_prompt("Chat model").interact_text()?;
            let embedding: String = Input::new()
                .with_prompt("Embedding model (empty to disable retrieval)")
                .allow_empty(true)
                .interact_text()?;
            config.llm.embedding_model = (!embedding.is_empty()).then_some(embedding);
        }
    }

    let persist = Confirm::new()
        .with_prompt("Persist the vector index to a JSON file?")
        .default(true)
        .interact()?;
    if persist {
        let path: String = Input::new()
            .with_prompt("Index file path")
            .default("mica_index.json".into())
            .interact_text()?;
        config.index.path = Some(PathBuf::from(path));
    }

    let path = output.unwrap_or_else(|| PathBuf::from("mica.toml"));
    let rendered = toml::to_string_pretty(&config)?;
    std::fs::write(&path, rendered)?;

    println!("\nWrote {}.", path.display());
    println!("Set MICA_API_KEY in your environment before starting a chat.");
    Ok(())
}
