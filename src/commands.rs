//! Command implementations behind the `repo-rag` CLI.
//!
//! Each `run_*` function loads what it needs from [`Config`], performs one
//! operation, and prints either a human-readable summary or, with `--json`,
//! a single JSON document on stdout.

use anyhow::{Context, Result};
use serde::Serialize;

use repo_rag_core::embedding::EmbeddingProvider;
use repo_rag_core::models::IndexStats;
use repo_rag_core::retrieve;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::ingest::{index_files, IndexOptions};
use crate::rag::{answer, file_briefs, AnswerRequest};
use crate::sqlite_store::SqliteCollection;

/// Open the configured collection sized for `embedder`.
pub async fn open_collection(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<SqliteCollection> {
    SqliteCollection::open_or_create(
        &config.index.persist_dir,
        &config.index.collection,
        embedder.dims(),
        config.index.metric,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to open collection '{}' in {}",
            config.index.collection,
            config.index.persist_dir.display()
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_index_stats(stats: &IndexStats) {
    println!("  added chunks: {}", stats.added_chunks);
    println!("  skipped files: {}", stats.skipped_files);
    if stats.unchanged_files > 0 {
        println!("  unchanged files: {}", stats.unchanged_files);
    }
    if !stats.errors.is_empty() {
        println!("  errors: {}", stats.errors.len());
        for err in &stats.errors {
            println!("    {}: {}", err.path, err.error);
        }
    }
}

/// `repo-rag init`: create the database and the collection record.
pub async fn run_init(config: &Config) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let collection = open_collection(config, embedder.as_ref()).await?;
    println!(
        "Index initialized: {} (collection '{}', {} dims, {})",
        collection.db_path().display(),
        config.index.collection,
        embedder.dims(),
        config.index.metric
    );
    collection.close().await;
    Ok(())
}

/// `repo-rag index <PATHS>...`
pub async fn run_index(config: &Config, paths: &[String], json: bool) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let collection = open_collection(config, embedder.as_ref()).await?;
    let options = IndexOptions::from_config(config)?;

    let stats = index_files(paths, &collection, embedder.as_ref(), &options).await?;

    if json {
        print_json(&stats)?;
    } else {
        println!("index {}", config.index.collection);
        println!("  files: {}", paths.len());
        print_index_stats(&stats);
        println!("ok");
    }

    collection.close().await;
    Ok(())
}

/// `repo-rag query <TEXT>`: retrieval only, no generation.
pub async fn run_query(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let collection = open_collection(config, embedder.as_ref()).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let retrieved = retrieve(query, &collection, embedder.as_ref(), top_k).await?;

    if json {
        print_json(&retrieved)?;
    } else if retrieved.is_empty() {
        println!("No results.");
    } else {
        for (i, (text, meta)) in retrieved
            .documents
            .iter()
            .zip(&retrieved.metadatas)
            .enumerate()
        {
            println!("{}. {} [chunk {}]", i + 1, meta.source, meta.chunk_index);
            let preview: String = text.chars().take(240).collect();
            println!("   {}", preview.replace('\n', " "));
            println!();
        }
    }

    collection.close().await;
    Ok(())
}

/// `repo-rag ask <QUESTION> --file <PATH>...`
pub async fn run_ask(
    config: &Config,
    question: &str,
    files: Vec<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let collection = open_collection(config, embedder.as_ref()).await?;
    let options = IndexOptions::from_config(config)?;

    let request = AnswerRequest {
        query: question.to_string(),
        files,
        top_k: top_k.unwrap_or(config.retrieval.top_k),
    };
    let result = answer(
        &request,
        &collection,
        embedder.as_ref(),
        generator.as_ref(),
        &options,
    )
    .await;
    collection.close().await;
    let result = result?;

    if json {
        print_json(&result)?;
    } else {
        println!("{}", result.answer.trim());
        println!();
        println!("Sources:");
        for meta in &result.sources {
            println!("  - {} [chunk {}]", meta.source, meta.chunk_index);
        }
        println!();
        println!("Indexing:");
        print_index_stats(&result.index_stats);
    }
    Ok(())
}

/// `repo-rag briefs <PATHS>...`
pub async fn run_briefs(config: &Config, paths: &[String], json: bool) -> Result<()> {
    let generator = create_generator(&config.generation)?;
    let briefs = file_briefs(paths, generator.as_ref()).await;

    if json {
        print_json(&briefs)?;
    } else {
        for brief in &briefs {
            println!("== {} ({})", brief.path, brief.extension);
            println!("{}", brief.brief.trim());
            println!();
        }
    }
    Ok(())
}
