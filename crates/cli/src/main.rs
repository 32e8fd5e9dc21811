//! Command line front end for a local Ollama server.
//!
//! ```sh
//! olama models
//! olama ping
//! olama chat --model llama3:8b "why is the sky blue?"
//! ```

mod logging;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use olama_core::llm::validate_prompt;
use olama_core::model::default_model;
use olama_core::{CancelToken, ExchangeHandle, ExchangeResult, Message, ModelClient};
use providers::ollama::{OllamaClient, OllamaConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "olama", about = "Chat with models served by a local Ollama")]
struct Cli {
    /// Server endpoint, overrides OLLAMA_HOST and the config file.
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed models.
    Models,
    /// Check whether the server answers.
    Ping,
    /// Send one prompt and stream the reply.
    Chat {
        /// Model to use. Defaults to the configured model, else the first installed one.
        #[arg(long, short)]
        model: Option<String>,

        /// System prompt placed before the user message.
        #[arg(long)]
        system: Option<String>,

        /// Prompt text; multiple words are joined with spaces.
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init();

    let mut cfg = OllamaConfig::from_env_and_file().context("load config")?;
    if let Some(host) = &cli.host {
        cfg = cfg.with_base_url(host).context("--host")?;
    }
    let client = OllamaClient::new(cfg).context("build http client")?;

    match cli.command {
        Command::Models => list_models(&client).await,
        Command::Ping => Ok(ping(&client).await),
        Command::Chat {
            model,
            system,
            prompt,
        } => chat(&client, model, system, prompt.join(" ")).await,
    }
}

async fn list_models(client: &OllamaClient) -> Result<ExitCode> {
    let models = client.list_models().await?;
    if models.is_empty() {
        println!("no models installed");
    }
    for m in &models {
        println!("{m}  {}", m.modified_at);
    }
    Ok(ExitCode::SUCCESS)
}

async fn ping(client: &OllamaClient) -> ExitCode {
    if client.check_connection().await {
        println!("reachable: {}", client.base_url());
        ExitCode::SUCCESS
    } else {
        println!("unreachable: {}", client.base_url());
        ExitCode::FAILURE
    }
}

async fn chat(
    client: &OllamaClient,
    model: Option<String>,
    system: Option<String>,
    prompt: String,
) -> Result<ExitCode> {
    validate_prompt(&prompt)?;

    let model = match model {
        Some(m) => m,
        None => {
            let models = client.list_models().await.context("pick default model")?;
            default_model(&models, client.config().model.as_deref())
                .map(|m| m.name.clone())
                .context("no models installed; pass --model")?
        }
    };

    let mut history = Vec::new();
    if let Some(s) = system {
        history.push(Message::system(s));
    }
    history.push(Message::user(prompt));
    info!(target: "olama", "chat: model={} messages={}", model, history.len());

    let mut exchange = client.exchange(&model, &history);
    let token = exchange.cancel_token();
    let writer_token = token.clone();
    let task = tokio::spawn(async move {
        exchange
            .run(move |t| forward_token(&mut io::stdout().lock(), t, &writer_token))
            .await
    });
    let handle = ExchangeHandle::new(token, task);
    let ctrl_c_token = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    match handle.await {
        ExchangeResult::Completed(reply) => {
            let ms = reply.generation_duration_ms().unwrap_or_default();
            println!("\n\n[{model}, {:.1}s]", ms as f64 / 1000.0);
            Ok(ExitCode::SUCCESS)
        }
        ExchangeResult::Cancelled => {
            let _ = writeln!(io::stdout(), "\n[cancelled]");
            Ok(ExitCode::from(130))
        }
        ExchangeResult::Failed(e) => {
            eprintln!("\nerror ({}): {}", e.kind, e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Writes one fragment. When stdout is gone (closed pipe) there is no one
/// left to read the reply, so the exchange is cancelled.
fn forward_token(out: &mut impl Write, fragment: &str, cancel: &CancelToken) {
    let written = out
        .write_all(fragment.as_bytes())
        .and_then(|()| out.flush());
    if let Err(e) = written {
        warn!(target: "olama", "stdout write failed, cancelling: {}", e);
        cancel.cancel();
    }
}
