use jurisearch::cli::{Cli, Commands, ConfigAction};
use jurisearch::config::{Config, ConfigValidator};
use jurisearch::embedding::{BuilderOptions, EmbeddingBuilder, FastEmbedProvider};
use jurisearch::error::{JurisError, Result};
use jurisearch::index::SparseIndex;
use jurisearch::retrieval::{HybridSearcher, RankedResult, SearchQuery};
use jurisearch::store::DocumentStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    let config = || load_config(cli.config.clone(), cli.profile.as_deref());

    // Handle commands
    match cli.command {
        Commands::BuildEmbeddings {
            input,
            output,
            text_column,
            batch_size,
            limit,
            compress,
        } => {
            let config = config()?;
            let options = BuilderOptions {
                text_column: text_column.unwrap_or_else(|| config.embedding.text_column.clone()),
                batch_size: batch_size.unwrap_or(config.embedding.batch_size),
                limit,
                compress,
            };
            cmd_build_embeddings(&config, &input, &output, options)?;
        }
        Commands::Index { dataset, rebuild } => {
            cmd_index(&config()?, dataset, rebuild)?;
        }
        Commands::Search {
            query,
            top_k,
            dataset,
            json,
        } => {
            cmd_search(&config()?, query, top_k, dataset, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config.clone(), cli.profile.as_deref(), action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "jurisearch=debug"
    } else {
        "jurisearch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_build_embeddings(
    config: &Config,
    input: &Path,
    output: &Path,
    options: BuilderOptions,
) -> Result<()> {
    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    let builder = EmbeddingBuilder::new(Arc::new(provider), options);
    let report = builder.run(input, output)?;

    println!("✓ Embeddings built");
    println!("  Documents: {}", report.processed);
    println!("  Model: {} ({}D)", config.embedding.model, report.dimension);
    println!("  Output: {}", report.output.display());
    println!("  Duration: {}ms", report.duration_ms);

    Ok(())
}

fn cmd_index(config: &Config, dataset: Option<PathBuf>, rebuild: bool) -> Result<()> {
    let dataset = dataset.unwrap_or_else(|| config.dataset.path.clone());
    let cache_path = dataset.join(&config.dataset.cache_file);

    let store = DocumentStore::load(&dataset)?;

    if rebuild && cache_path.exists() {
        tracing::info!("Removing BM25 cache: {}", cache_path.display());
        std::fs::remove_file(&cache_path).map_err(|e| JurisError::Io {
            source: e,
            context: format!("Failed to remove cache file: {:?}", cache_path),
        })?;
    }

    let sparse = SparseIndex::load_or_build(&cache_path, store.size(), store.texts());

    println!("Collection: {}", dataset.display());
    println!("  Documents: {}", store.size());
    match store.manifest() {
        Some(manifest) => println!("  Model: {} ({}D)", manifest.model, manifest.dimension),
        None => println!("  Model: unrecorded (no manifest)"),
    }
    println!("  Vocabulary: {} terms", sparse.vocabulary_size());
    println!("  Average document length: {:.1}", sparse.average_doc_length());
    println!("  BM25 cache: {}", cache_path.display());

    Ok(())
}

fn cmd_search(
    config: &Config,
    query: String,
    top_k: Option<usize>,
    dataset: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let dataset = dataset.unwrap_or_else(|| config.dataset.path.clone());
    let cache_path = dataset.join(&config.dataset.cache_file);
    let query = SearchQuery::new(query, top_k.unwrap_or(config.search.default_top_k));

    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    let searcher = HybridSearcher::open(
        &dataset,
        &cache_path,
        Arc::new(provider),
        config.search.clone(),
    )?;

    let results = match config.search.timeout_secs {
        0 => searcher.search(&query)?,
        secs => search_with_timeout(Arc::new(searcher), query, Duration::from_secs(secs))?,
    };

    if json {
        let output = serde_json::to_string_pretty(&results).map_err(|e| JurisError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", output);
    } else {
        print_results(&results);
    }

    Ok(())
}

/// Run the blocking search on a worker thread, abandoning it after `timeout`
fn search_with_timeout(
    searcher: Arc<HybridSearcher>,
    query: SearchQuery,
    timeout: Duration,
) -> Result<Vec<RankedResult>> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| JurisError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    let outcome = rt.block_on(async move {
        let task = tokio::task::spawn_blocking(move || searcher.search(&query));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(results)) => results.map_err(JurisError::from),
            Ok(Err(e)) => Err(anyhow::anyhow!("Search task failed: {}", e).into()),
            Err(_) => Err(anyhow::anyhow!("Search timed out after {:?}", timeout).into()),
        }
    });

    // Do not wait for a timed-out search to finish
    rt.shutdown_background();

    outcome
}

fn print_results(results: &[RankedResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        println!("{}. {} [{}]", rank + 1, result.title, result.state);
        if !result.citation.is_empty() {
            println!("   {}", result.citation);
        }
        println!(
            "   id: {}  combined: {:.4}  dense: {:.4}  bm25: {:.4}",
            result.id, result.combined_score, result.dense_score, result.bm25_score
        );
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
        println!();
    }
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<&str>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate => {
            let path = resolve_config_path(config_path)?;
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  File: {}", path.display());
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = resolve_config_path(config_path)?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| JurisError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn resolve_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Config::default_path(),
    }
}

fn load_config(config_path: Option<PathBuf>, profile: Option<&str>) -> Result<Config> {
    let path = resolve_config_path(config_path)?;

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'jurisearch config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, profile),
        None => Config::load(&path),
    }
}
