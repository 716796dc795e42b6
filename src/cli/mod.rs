//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "jurisearch",
    version,
    about = "Hybrid semantic and keyword search over case-law collections",
    long_about = "Jurisearch embeds a legal document collection offline, then answers queries by fusing \
                  exact cosine similarity over the stored embeddings with BM25 keyword scores."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/jurisearch/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "lexical")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Precompute embeddings for a raw JSONL collection
    BuildEmbeddings {
        /// Raw collection, one JSON object per line
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output collection directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Column holding the text to embed (defaults to embedding.text_column)
        #[arg(long)]
        text_column: Option<String>,

        /// Texts per encoder call (defaults to embedding.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Only embed the first N records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Write documents.jsonl.zst instead of documents.jsonl
        #[arg(long)]
        compress: bool,
    },

    /// Load a collection and build (or load) its BM25 cache
    Index {
        /// Collection directory (defaults to dataset.path)
        #[arg(short, long, value_name = "DIR")]
        dataset: Option<PathBuf>,

        /// Discard any existing BM25 cache first
        #[arg(long)]
        rebuild: bool,
    },

    /// Run a hybrid search query
    Search {
        /// Search query text
        query: String,

        /// Number of results to return (defaults to search.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Collection directory (defaults to dataset.path)
        #[arg(short, long, value_name = "DIR")]
        dataset: Option<PathBuf>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from([
            "jurisearch",
            "--profile",
            "lexical",
            "search",
            "breach of contract",
            "-k",
            "3",
            "--json",
        ]);

        assert_eq!(cli.profile.as_deref(), Some("lexical"));
        match cli.command {
            Commands::Search {
                query, top_k, json, ..
            } => {
                assert_eq!(query, "breach of contract");
                assert_eq!(top_k, Some(3));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_build_embeddings() {
        let cli = Cli::parse_from([
            "jurisearch",
            "build-embeddings",
            "--input",
            "cases.jsonl",
            "--output",
            "vectorized_dataset",
            "--limit",
            "100",
            "--compress",
        ]);

        match cli.command {
            Commands::BuildEmbeddings {
                input,
                output,
                limit,
                compress,
                text_column,
                ..
            } => {
                assert_eq!(input, PathBuf::from("cases.jsonl"));
                assert_eq!(output, PathBuf::from("vectorized_dataset"));
                assert_eq!(limit, Some(100));
                assert!(compress);
                assert!(text_column.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
