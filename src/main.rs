use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use mica_llm::any::AnyProvider;
use mica_llm::claude::ClaudeProvider;
use mica_llm::openai::OpenAiProvider;
use mica_llm::provider::LlmProvider;
use mica_llm::proxy::ProxyProvider;
use mica_memory::document::TextLoader;
use mica_memory::{
    ConversationSession, InMemoryIndex, JsonFileIndex, RetrievalPipeline, Segmenter, VectorIndex,
    estimate_tokens,
};

use crate::config::{Config, ProviderKind};

mod config;
mod init;

#[derive(Parser)]
#[command(name = "mica", version, about = "Terminal RAG chatbot with document retrieval")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "mica.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter configuration file interactively.
    Init {
        /// Destination path (defaults to mica.toml).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Some(Command::Init { output }) = cli.command {
        return init::run(output);
    }

    let config = Config::load(&cli.config)?;
    let provider = build_provider(&config)?;
    tracing::debug!(
        provider = provider.name(),
        model = config.llm.model,
        "provider ready"
    );
    let segmenter = Segmenter::new(config.segmenter.to_segmenter_config())
        .context("invalid segmenter configuration")?;

    let index: Box<dyn VectorIndex> = match &config.index.path {
        Some(path) => Box::new(
            JsonFileIndex::open(path)
                .await
                .context("failed to open index file")?,
        ),
        None => Box::new(InMemoryIndex::new()),
    };

    let mut pipeline = RetrievalPipeline::new(segmenter, index, provider)
        .with_top_k(config.retrieval.top_k)
        .with_min_score(config.retrieval.min_score)
        .with_limits(config.session.limits());
    if let Some(prompt) = &config.session.system_prompt {
        pipeline = pipeline.with_system_prompt(prompt);
    }

    repl(&pipeline).await
}

fn build_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let api_key = llm
        .api_key
        .clone()
        .context("no API key configured; set MICA_API_KEY or [llm].api_key")?;

    Ok(match llm.provider {
        ProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            api_key,
            llm.base_url.clone(),
            llm.model.clone(),
            llm.max_tokens,
            llm.temperature,
            llm.embedding_model.clone(),
        )),
        ProviderKind::Claude => AnyProvider::Claude(ClaudeProvider::new(
            api_key,
            llm.model.clone(),
            llm.max_tokens,
            llm.temperature,
        )),
        ProviderKind::Proxy => AnyProvider::Proxy(ProxyProvider::new(
            llm.proxy_name.clone().unwrap_or_else(|| "proxy".into()),
            api_key,
            llm.base_url.clone(),
            llm.model.clone(),
            llm.max_tokens,
            llm.temperature,
            llm.embedding_model.clone(),
        )),
    })
}

const BANNER: &str = "\
mica - retrieval chat
  load <path>      index a document (.md, .markdown, .txt)
  sources          list indexed documents
  delete <source>  remove a document from the index
  reset            clear conversation history
  usage            show token totals
  quit             exit
";

async fn repl(pipeline: &RetrievalPipeline<AnyProvider>) -> anyhow::Result<()> {
    use std::io::Write as _;

    println!("{BANNER}");
    let loader = TextLoader::new();
    let mut session = ConversationSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        match command {
            "quit" | "exit" => break,
            "reset" => {
                session.reset();
                println!("conversation cleared\n");
            }
            "usage" => print_usage(&session),
            "sources" => match pipeline.sources().await {
                Ok(sources) if sources.is_empty() => println!("no documents indexed\n"),
                Ok(sources) => {
                    for (source, count) in sources {
                        println!("  {source}: {count} chunks");
                    }
                    println!();
                }
                Err(e) => println!("error: {e}\n"),
            },
            "delete" => {
                let Some(source) = parts.next() else {
                    println!("usage: delete <source>\n");
                    continue;
                };
                match pipeline.delete_source(source).await {
                    Ok(true) => println!("removed {source}\n"),
                    Ok(false) => println!("no such source: {source}\n"),
                    Err(e) => println!("error: {e}\n"),
                }
            }
            "load" => {
                let Some(path) = parts.next() else {
                    println!("usage: load <path>\n");
                    continue;
                };
                match load_document(pipeline, &loader, Path::new(path)).await {
                    Ok((source, count)) => println!("indexed {source}: {count} chunks\n"),
                    Err(e) => println!("error: {e:#}\n"),
                }
            }
            _ => chat_turn(pipeline, &mut session, line).await,
        }
    }

    print_usage(&session);
    Ok(())
}

async fn load_document(
    pipeline: &RetrievalPipeline<AnyProvider>,
    loader: &TextLoader,
    path: &Path,
) -> anyhow::Result<(String, usize)> {
    let document = loader.load(path).await?;
    let count = pipeline
        .index_document(&document.source, &document.content)
        .await?;
    Ok((document.source, count))
}

async fn chat_turn(
    pipeline: &RetrievalPipeline<AnyProvider>,
    session: &mut ConversationSession,
    input: &str,
) {
    use std::io::Write as _;

    let mut turn = match pipeline.answer_stream(session, input).await {
        Ok(turn) => turn,
        Err(e) => {
            println!("error: {e}\n");
            return;
        }
    };
    if !turn.retrieved.is_empty() {
        println!("  [{} excerpts retrieved]", turn.retrieved.len());
    }

    print!("mica: ");
    let _ = std::io::stdout().flush();

    let mut reply = String::new();
    let mut failed = false;
    while let Some(fragment) = turn.stream.next().await {
        match fragment {
            Ok(text) => {
                print!("{text}");
                let _ = std::io::stdout().flush();
                reply.push_str(&text);
            }
            Err(e) => {
                println!("\nstream error: {e}");
                failed = true;
                break;
            }
        }
    }
    println!();

    if failed {
        // The abandoned turn leaves no assistant entry behind.
        println!();
        return;
    }

    let prompt_estimate = estimate_tokens(input);
    let reply_estimate = estimate_tokens(&reply);
    session.commit_reply(reply);
    session.record_usage(prompt_estimate, reply_estimate);
    println!("  [tokens est.: in {prompt_estimate} / out {reply_estimate}]\n");
}

fn print_usage(session: &ConversationSession) {
    let usage = session.usage();
    println!("\n-- session usage (estimated) --");
    println!("  prompt:     {} tokens", usage.prompt_tokens);
    println!("  completion: {} tokens", usage.completion_tokens);
    println!("  total:      {} tokens", usage.total());
    println!("  turns:      {}\n", session.len() / 2);
}
