//! Query-time retrieval: embed the question, rank the collection, and
//! return chunk texts with their attribution metadata.

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::models::Retrieved;
use crate::store::VectorStore;

/// Retrieve the `top_k` chunks most similar to `query`.
///
/// `documents[i]` and `metadatas[i]` describe the same entry, in rank order.
/// An empty collection yields an empty [`Retrieved`]. The query vector must
/// have the collection's dimensionality.
pub async fn retrieve<S, E>(
    query: &str,
    collection: &S,
    embedder: &E,
    top_k: usize,
) -> Result<Retrieved>
where
    S: VectorStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    if top_k == 0 {
        return Err(RagError::config("top_k must be >= 1"));
    }

    let vector = embedder.embed(query).await?;
    let hits = collection.query(&vector, top_k).await?;
    debug!(
        collection = %collection.info().name,
        top_k,
        hits = hits.len(),
        "retrieved chunks"
    );

    let mut retrieved = Retrieved::default();
    for hit in hits {
        retrieved.documents.push(hit.entry.text);
        retrieved.metadatas.push(hit.entry.metadata);
    }
    Ok(retrieved)
}
