//! End-to-end question answering and per-file briefs.
//!
//! [`answer`] indexes the requested files, retrieves the closest chunks,
//! and asks the generator exactly once with a prompt built only from those
//! chunks and the question. [`file_briefs`] summarizes files one by one and
//! never touches the vector index.

use std::io::ErrorKind;

use serde::Deserialize;
use tracing::{debug, info, warn};

use repo_rag_core::chunk::{extension_of, is_supported};
use repo_rag_core::embedding::EmbeddingProvider;
use repo_rag_core::generation::GenerationProvider;
use repo_rag_core::models::{FileBrief, RagAnswer};
use repo_rag_core::prompt::{build_brief_prompt, build_grounding_prompt};
use repo_rag_core::store::VectorStore;
use repo_rag_core::{retrieve, RagError, Result};

use crate::ingest::{decode_text, index_files, IndexOptions};

/// Brief recorded for a file that exists but yields no text.
pub const UNREADABLE_BRIEF: &str = "Could not read file";

/// A question plus the files it should be answered from.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    pub files: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

/// Index `request.files`, retrieve context for `request.query`, and
/// generate a grounded answer.
///
/// The question, the file list and `top_k` are checked before any file is
/// read. Generator failures are returned as errors; no answer text is
/// invented.
pub async fn answer<S, E, G>(
    request: &AnswerRequest,
    collection: &S,
    embedder: &E,
    generator: &G,
    options: &IndexOptions,
) -> Result<RagAnswer>
where
    S: VectorStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
    G: GenerationProvider + ?Sized,
{
    if request.query.trim().is_empty() {
        return Err(RagError::config("query must not be empty"));
    }
    if request.files.is_empty() {
        return Err(RagError::config("at least one file is required"));
    }
    if request.top_k == 0 {
        return Err(RagError::config("top_k must be >= 1"));
    }

    let index_stats = index_files(&request.files, collection, embedder, options).await?;
    let retrieved = retrieve(&request.query, collection, embedder, request.top_k).await?;
    debug!(chunks = retrieved.documents.len(), "context retrieved");

    let prompt = build_grounding_prompt(&request.query, &retrieved.documents);
    let answer = generator.complete(&prompt).await?;
    info!(
        model = generator.model_name(),
        sources = retrieved.metadatas.len(),
        "answer generated"
    );

    Ok(RagAnswer {
        answer,
        sources: retrieved.metadatas,
        chunks: retrieved.documents,
        index_stats,
    })
}

/// Produce one short description per supported, existing file.
///
/// Unsupported and missing paths are left out. Files that cannot be read
/// (or are empty) get [`UNREADABLE_BRIEF`]. A generator failure becomes the
/// brief text for that file rather than an error.
pub async fn file_briefs<G>(paths: &[String], generator: &G) -> Vec<FileBrief>
where
    G: GenerationProvider + ?Sized,
{
    let mut briefs = Vec::new();

    for path in paths {
        if !is_supported(path) {
            continue;
        }

        let content = match tokio::fs::read(path).await {
            Ok(bytes) => decode_text(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                debug!(path = %path, error = %e, "read failed");
                String::new()
            }
        };

        let brief = if content.is_empty() {
            UNREADABLE_BRIEF.to_string()
        } else {
            match generator.complete(&build_brief_prompt(&content)).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(path = %path, error = %e, "brief generation failed");
                    format!("Error generating summary: {}", e)
                }
            }
        };

        briefs.push(FileBrief {
            path: path.clone(),
            extension: extension_of(path),
            brief,
        });
    }

    briefs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct EchoGenerator;

    #[async_trait]
    impl GenerationProvider for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("{} chars", prompt.len()))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl GenerationProvider for FailingGenerator {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(RagError::provider("model offline"))
        }
    }

    #[tokio::test]
    async fn test_briefs_skip_unsupported_and_missing() {
        let tmp = TempDir::new().unwrap();
        let code = tmp.path().join("main.rs");
        std::fs::write(&code, "fn main() {}").unwrap();
        let empty = tmp.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        let image = tmp.path().join("logo.png");
        std::fs::write(&image, [1u8, 2, 3]).unwrap();

        let paths = vec![
            code.display().to_string(),
            empty.display().to_string(),
            image.display().to_string(),
            tmp.path().join("gone.py").display().to_string(),
        ];
        let briefs = file_briefs(&paths, &EchoGenerator).await;

        assert_eq!(briefs.len(), 2);
        assert_eq!(briefs[0].extension, ".rs");
        assert!(briefs[0].brief.ends_with("chars"));
        assert_eq!(briefs[1].brief, UNREADABLE_BRIEF);
    }

    #[tokio::test]
    async fn test_brief_generator_failure_is_reported_inline() {
        let tmp = TempDir::new().unwrap();
        let code = tmp.path().join("lib.py");
        std::fs::write(&code, "def f():\n    return 1\n").unwrap();

        let briefs = file_briefs(&[code.display().to_string()], &FailingGenerator).await;
        assert_eq!(briefs.len(), 1);
        assert!(briefs[0].brief.starts_with("Error generating summary:"));
        assert!(briefs[0].brief.contains("model offline"));
    }
}
