//! Overlapping text chunker and the supported-file filter.
//!
//! Splits document text into ordered segments of at most `chunk_size`
//! characters, where consecutive segments share `chunk_overlap` characters
//! of context. All lengths are counted in Unicode scalar values, so a
//! segment boundary never bisects a UTF-8 sequence.
//!
//! # Strategies
//!
//! - [`SplitStrategy::Window`] (default): a fixed window of `chunk_size`
//!   characters slides forward by `step = chunk_size - chunk_overlap`
//!   until the window start reaches the end of the text. The last chunks
//!   may be shorter than `chunk_size`.
//! - [`SplitStrategy::Recursive`]: prefers paragraph, then line, then word
//!   boundaries, falling back to single characters. Pieces are merged up to
//!   `chunk_size` and each chunk carries up to `chunk_overlap` characters of
//!   the previous one.
//!
//! Both strategies return the whole text as a single chunk when it fits.
//!
//! # Example
//!
//! ```rust
//! use repo_rag_core::chunk::split_text;
//!
//! let chunks = split_text("abcdefghij", 4, 2).unwrap();
//! assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij", "ij"]);
//! ```

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};
use crate::models::{Chunk, DocumentRef};

/// File extensions the indexing pipeline accepts (code, markup, config,
/// text, and notebook formats). Compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "py", "html", "js", "md", "txt", "json", "yaml", "yml", "css", "java", "c", "cpp", "rb", "go",
    "rs", "ts", "tsx", "jsx", "xml", "ini", "cfg", "toml", "docx", "csv", "ipynb",
];

/// Separators tried in order by the recursive splitter.
const RECURSIVE_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Validated chunk size and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkParams {
    /// Validate `chunk_size > 0` and `chunk_overlap < chunk_size`.
    ///
    /// An overlap equal to or larger than the size would give the window
    /// a non-positive step, so it is rejected up front.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::config("chunk_size must be > 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Window advance per chunk. Always at least 1.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// How text is cut into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    #[default]
    Window,
    Recursive,
}

/// Split `text` with a sliding character window.
///
/// Fails with [`RagError::Config`] when `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let params = ChunkParams::new(chunk_size, chunk_overlap)?;
    Ok(split_window(text, &params))
}

/// Split `text` using the given strategy.
pub fn split(text: &str, params: &ChunkParams, strategy: SplitStrategy) -> Vec<String> {
    match strategy {
        SplitStrategy::Window => split_window(text, params),
        SplitStrategy::Recursive => split_recursive(text, params),
    }
}

/// Fixed-window split; the fallback contract every strategy honors.
pub fn split_window(text: &str, params: &ChunkParams) -> Vec<String> {
    // Byte offset of every char, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    if char_count <= params.chunk_size() {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(char_count / params.step() + 1);
    let mut start = 0;
    while start < char_count {
        let end = (start + params.chunk_size()).min(char_count);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        start += params.step();
    }
    chunks
}

/// Boundary-aware split that prefers paragraphs, then lines, then words.
pub fn split_recursive(text: &str, params: &ChunkParams) -> Vec<String> {
    if char_len(text) <= params.chunk_size() {
        return vec![text.to_string()];
    }
    split_on_separators(text, RECURSIVE_SEPARATORS, params)
}

fn split_on_separators(text: &str, separators: &[&str], params: &ChunkParams) -> Vec<String> {
    let idx = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let sep = separators.get(idx).copied().unwrap_or("");
    let finer = &separators[(idx + 1).min(separators.len())..];

    let pieces: Vec<String> = if sep.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(sep)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < params.chunk_size() {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, sep, params));
            fitting.clear();
        }
        if finer.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_on_separators(&piece, finer, params));
        }
    }
    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, sep, params));
    }
    chunks
}

/// Greedily join pieces up to `chunk_size`, keeping a tail of at most
/// `chunk_overlap` characters as the start of the next chunk.
fn merge_pieces(pieces: &[String], sep: &str, params: &ChunkParams) -> Vec<String> {
    let sep_len = char_len(sep);
    let mut merged = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        if !current.is_empty() && total + len + sep_len > params.chunk_size() {
            push_joined(&mut merged, &current, sep);
            while total > params.chunk_overlap()
                || (total > 0 && total + len + sep_len > params.chunk_size())
            {
                let had_many = current.len() > 1;
                let Some(first) = current.pop_front() else {
                    break;
                };
                let freed = if had_many { char_len(first) + sep_len } else { char_len(first) };
                total -= freed;
            }
        }
        current.push_back(piece);
        total += if current.len() > 1 { len + sep_len } else { len };
    }
    if !current.is_empty() {
        push_joined(&mut merged, &current, sep);
    }
    merged
}

fn push_joined(out: &mut Vec<String>, parts: &VecDeque<&str>, sep: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Chunk a document into [`Chunk`]s with contiguous indices from 0.
pub fn chunk_document(
    doc: &DocumentRef,
    params: &ChunkParams,
    strategy: SplitStrategy,
    now: DateTime<Utc>,
) -> Vec<Chunk> {
    split(&doc.content, params, strategy)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            source_path: doc.source_path.clone(),
            chunk_index,
            text,
            created_at: now,
        })
        .collect()
}

/// Whether `path` has an extension on the allow-list.
pub fn is_supported(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// File extension including the leading dot, or an empty string.
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// SHA-256 hex digest of a document's content.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
