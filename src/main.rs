use clap::{Parser, Subcommand};
use docs_rag::Result;
use docs_rag::commands::{
    add_files, add_text, ask, delete_all, delete_document, ingest_directory, list_documents,
    serve, show_status,
};
use docs_rag::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Chat with your own documents using Pinecone retrieval and a local Ollama model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Pinecone, Ollama and LLM settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest every supported document in a directory (defaults to the raw documents directory)
    Ingest {
        dir: Option<PathBuf>,
    },
    /// Copy documents into the collection and ingest them
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Add pasted text as a document, read from --file or standard input
    AddText {
        #[arg(long)]
        title: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask a question against the knowledge base
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List indexed documents
    List,
    /// Delete a document and its chunks
    Delete {
        /// Source file name as shown by `list`
        source: String,
    },
    /// Delete every document from the index
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show connectivity and index status
    Status,
    /// Start the web chat UI
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { dir } => ingest_directory(dir)?,
        Commands::Add { files } => add_files(&files)?,
        Commands::AddText { title, file } => add_text(&title, file.as_deref())?,
        Commands::Ask { question, top_k } => ask(&question, top_k)?,
        Commands::List => list_documents()?,
        Commands::Delete { source } => delete_document(&source)?,
        Commands::DeleteAll { yes } => delete_all(yes)?,
        Commands::Status => show_status()?,
        Commands::Serve { host, port } => serve(host, port).await?,
    }

    Ok(())
}
