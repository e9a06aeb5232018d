
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

use super::{Config, ConfigError, LlmConfig, OllamaConfig, PineconeConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Docs RAG Configuration Setup").bold().cyan());
    eprintln!();

    let config_dir = Config::config_dir().context("Failed to resolve config directory")?;
    let mut config = load_existing_config(&config_dir)?;

    eprintln!("{}", style("Pinecone Configuration").bold().yellow());
    eprintln!("Configure the hosted index that stores document chunks.");
    eprintln!();

    configure_pinecone(&mut config.pinecone)?;

    eprintln!();
    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;
    configure_llm(&mut config.llm)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting.");
    }

    if config.pinecone.api_key.trim().is_empty() {
        eprintln!(
            "{}",
            style("⚠ No Pinecone API key set. Export PINECONE_API_KEY before use.").yellow()
        );
    } else if test_pinecone_connection(&config.pinecone) {
        eprintln!("{}", style("✓ Pinecone connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Pinecone rejected the key or is unreachable").yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Pinecone Settings:").bold().yellow());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(&config.pinecone.api_key)).cyan()
    );
    eprintln!("  Index: {}", style(&config.pinecone.index_name).cyan());
    eprintln!(
        "  Location: {}",
        style(format!("{}/{}", config.pinecone.cloud, config.pinecone.region)).cyan()
    );
    eprintln!("  Metric: {}", style(&config.pinecone.metric).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {} ({} dims)",
        style(&config.ollama.embedding_model).cyan(),
        config.ollama.embedding_dimension
    );
    eprintln!("  LLM Model: {}", style(&config.llm.model).cyan());
    eprintln!("  Temperature: {}", style(config.llm.temperature).cyan());
    eprintln!("  Max Tokens: {}", style(config.llm.max_tokens).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Size / Overlap: {} / {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Data directory: {}", style(config.data_dir().display()).dim());

    Ok(())
}

/// Show only the last four characters of a secret
#[inline]
pub fn mask_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return "(not set)".to_string();
    }

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }

    let visible: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("Existing configuration is invalid. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            Ok(config)
        },
    )
}

fn configure_pinecone(pinecone: &mut PineconeConfig) -> Result<()> {
    let api_key = Password::new()
        .with_prompt("Pinecone API key (leave empty to keep current / use PINECONE_API_KEY)")
        .allow_empty_password(true)
        .interact()?;

    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(pinecone.index_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let mut probe = PineconeConfig::default();
            probe.set_index_name(input.clone())
        })
        .interact_text()?;

    let region: String = Input::new()
        .with_prompt("Serverless region")
        .default(pinecone.region.clone())
        .interact_text()?;

    if !api_key.trim().is_empty() {
        pinecone.api_key = api_key.trim().to_string();
    }
    pinecone.set_index_name(index_name)?;
    pinecone.set_region(region)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols
        .get(protocol_index)
        .copied()
        .unwrap_or("http")
        .to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| positive(u64::from(*input), "Port"))
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(|input: &String| model_name(input))
        .interact_text()?;

    let batch_size: usize = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &usize| match *input {
            0 => Err("Batch size must be greater than 0".to_string()),
            n if n > 1000 => Err("Batch size must be 1000 or less".to_string()),
            _ => Ok(()),
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Answer generation model")
        .default(llm.model.clone())
        .validate_with(|input: &String| model_name(input))
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Temperature")
        .default(llm.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    llm.set_model(model)?;
    llm.set_temperature(temperature)?;

    Ok(())
}

fn model_name(input: &str) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn positive(value: u64, what: &str) -> Result<(), String> {
    if value == 0 {
        Err(format!("{what} must be greater than 0"))
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let Ok(base) = ollama.ollama_url() else {
        return false;
    };
    let Ok(url) = base.join("api/version") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}

fn test_pinecone_connection(pinecone: &PineconeConfig) -> bool {
    let url = format!("{}/indexes", pinecone.controller_url.trim_end_matches('/'));

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(10)))
        .build()
        .into();

    agent
        .get(&url)
        .header("Api-Key", pinecone.api_key.trim())
        .header("X-Pinecone-API-Version", &pinecone.api_version)
        .call()
        .is_ok()
}
