use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdfbot_core::{
    ingest_pdf, parse_id_list, read_pdf_file, AdminCommand, AdminOutcome, BotConfig,
    CharacterNgramEmbedder, Embedder, IngestionLimits, OpenAiConfig, OpenAiEmbedder,
    OpenAiGenerator, QaOrchestrator, QdrantConfig, QdrantStore, RetryPolicy, Session,
    VectorIndexClient, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_TOP_K,
};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Index = VectorIndexClient<QdrantStore, Box<dyn Embedder>>;

#[derive(Parser)]
#[command(name = "pdfbot", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the embedding and answer provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Embedding model
    #[arg(long, env = "PDFBOT_EMBEDDING_MODEL", default_value = "text-embedding-ada-002")]
    embedding_model: String,

    /// Chat model used to answer questions
    #[arg(long, env = "PDFBOT_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    chat_model: String,

    /// Which embedder turns text into vectors
    #[arg(long, env = "PDFBOT_EMBEDDER", value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Collection that uploads and questions use
    #[arg(long, env = "PDFBOT_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Documents retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Attempts per vector store call
    #[arg(long, default_value = "3")]
    max_retries: usize,

    /// Request timeout in seconds for the vector store
    #[arg(long, default_value = "30")]
    store_timeout_secs: u64,

    /// Request timeout in seconds for the providers
    #[arg(long, default_value = "60")]
    provider_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Openai,
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, dedup, embed and index the pages of a PDF.
    Upload {
        /// Path to the PDF
        #[arg(long)]
        file: String,
    },
    /// Ask one question against the indexed documents.
    Ask {
        /// Question, at most 500 characters
        #[arg(long)]
        question: String,
    },
    /// Interactive session: ask questions, upload files, review the transcript.
    Chat,
    /// Index and vector operations.
    Admin(AdminArgs),
}

#[derive(Args)]
struct AdminArgs {
    #[command(subcommand)]
    action: AdminAction,
}

#[derive(Subcommand)]
enum AdminAction {
    /// List indexes.
    ListIndexes,
    /// Create an index.
    CreateIndex {
        #[arg(long)]
        name: String,
        /// Vector dimension; defaults to the configured embedder's
        #[arg(long, allow_negative_numbers = true)]
        dimension: Option<i64>,
    },
    /// Delete an index.
    DeleteIndex {
        #[arg(long)]
        name: String,
    },
    /// Fetch stored text for comma-separated vector ids.
    FetchVectors {
        #[arg(long)]
        ids: String,
    },
    /// Delete comma-separated vector ids.
    DeleteVectors {
        #[arg(long)]
        ids: String,
    },
}

impl Cli {
    fn bot_config(&self) -> BotConfig {
        BotConfig {
            qdrant: QdrantConfig {
                url: self.qdrant_url.clone(),
                api_key: self.qdrant_api_key.clone(),
                timeout: Duration::from_secs(self.store_timeout_secs),
            },
            collection: self.collection.clone(),
            top_k: self.top_k,
            retry: RetryPolicy {
                max_attempts: self.max_retries,
                ..RetryPolicy::default()
            },
            limits: IngestionLimits::default(),
        }
    }

    fn openai_config(&self) -> anyhow::Result<OpenAiConfig> {
        let key = self
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set"))?;
        let mut config = OpenAiConfig::new(key);
        config.base_url = self.openai_base_url.clone();
        config.embedding_model = self.embedding_model.clone();
        config.chat_model = self.chat_model.clone();
        config.timeout = Duration::from_secs(self.provider_timeout_secs);
        Ok(config)
    }

    fn build_embedder(&self) -> anyhow::Result<Box<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Openai => Box::new(OpenAiEmbedder::new(&self.openai_config()?)?),
            EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
                dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            }),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.bot_config();
    config.validate()?;

    let store = QdrantStore::new(&config.qdrant)?;
    let index = VectorIndexClient::new(store, cli.build_embedder()?, config.retry);
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %config.collection,
        "pdfbot boot"
    );

    match &cli.command {
        Command::Upload { file } => upload(&index, &config, Path::new(file)).await?,
        Command::Ask { question } => {
            let generator = OpenAiGenerator::new(&cli.openai_config()?)?;
            let mut session = Session::new();
            let mut qa = QaOrchestrator::new(&index, &generator, &config.collection, config.top_k);
            let answer = qa.ask(&mut session, question).await?;
            println!("Bot: {}", answer.answer);
            if answer.sources.is_empty() {
                println!("(no matching documents)");
            }
        }
        Command::Chat => {
            let generator = OpenAiGenerator::new(&cli.openai_config()?)?;
            chat(&index, &generator, &config).await?;
        }
        Command::Admin(args) => {
            let command = admin_command(&args.action, &config, index.embedder().dimensions())?;
            let outcome = command.execute(&index).await?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

async fn upload(index: &Index, config: &BotConfig, path: &Path) -> anyhow::Result<()> {
    let bytes = read_pdf_file(path, &config.limits)
        .await
        .with_context(|| format!("unable to read {}", path.display()))?;
    let report = ingest_pdf(&bytes, index, &config.collection, &config.limits).await?;

    if report.blank_pages > 0 {
        warn!(path = %path.display(), blank_pages = report.blank_pages, "pages without text were skipped");
    }
    println!(
        "Document uploaded successfully: {} pages, {} unique indexed into '{}' at {}",
        report.page_count,
        report.unique_pages,
        config.collection,
        Utc::now().to_rfc3339()
    );
    Ok(())
}

async fn chat(index: &Index, generator: &OpenAiGenerator, config: &BotConfig) -> anyhow::Result<()> {
    let mut session = Session::new();
    let mut qa = QaOrchestrator::new(index, generator, &config.collection, config.top_k);
    info!(session = %session.id(), "session started");
    println!("Ask me anything. Commands: :upload <path>, :history, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" | ":q" => break,
            ":history" => print_transcript(&session),
            _ => {
                if let Some(path) = line.strip_prefix(":upload ") {
                    if let Err(error) = upload(index, config, Path::new(path.trim())).await {
                        println!("error: {error:#}");
                    }
                    continue;
                }

                match qa.ask(&mut session, line).await {
                    Ok(answer) => println!("Bot: {}", answer.answer),
                    Err(error) => println!("error: {error}"),
                }
            }
        }
    }

    info!(session = %session.id(), turns = session.chat_log().len(), "session ended");
    Ok(())
}

fn admin_command(
    action: &AdminAction,
    config: &BotConfig,
    default_dimension: usize,
) -> anyhow::Result<AdminCommand> {
    Ok(match action {
        AdminAction::ListIndexes => AdminCommand::ListIndexes,
        AdminAction::CreateIndex { name, dimension } => AdminCommand::CreateIndex {
            name: name.clone(),
            dimension: dimension.unwrap_or(default_dimension as i64),
        },
        AdminAction::DeleteIndex { name } => AdminCommand::DeleteIndex { name: name.clone() },
        AdminAction::FetchVectors { ids } => AdminCommand::FetchVectors {
            collection: config.collection.clone(),
            ids: parse_id_list(ids)?,
        },
        AdminAction::DeleteVectors { ids } => AdminCommand::DeleteVectors {
            collection: config.collection.clone(),
            ids: parse_id_list(ids)?,
        },
    })
}

fn print_outcome(outcome: &AdminOutcome) {
    match outcome {
        AdminOutcome::Indexes(names) => println!("Active indexes: {}", names.join(", ")),
        AdminOutcome::IndexCreated { name, dimension } => {
            println!("Index '{name}' created successfully (dimension {dimension})")
        }
        AdminOutcome::IndexDeleted { name } => println!("Index '{name}' deleted successfully"),
        AdminOutcome::Fetched(report) => {
            for record in &report.found {
                match &record.text {
                    Some(text) => println!("[{}] Text: {}", record.id, text.trim()),
                    None => println!("[{}] metadata 'text' not found", record.id),
                }
            }
            for id in &report.missing {
                println!("[{id}] missing");
            }
        }
        AdminOutcome::VectorsDeleted { collection, count } => {
            println!("{count} vector id(s) deleted from '{collection}'")
        }
    }
}

fn print_transcript(session: &Session) {
    if session.chat_log().is_empty() {
        println!("(no questions yet)");
        return;
    }
    for turn in session.chat_log().turns() {
        println!("User: {}", turn.question());
        println!("Bot: {}", turn.answer());
        println!("---");
    }
}
