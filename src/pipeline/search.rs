use tracing::{info, warn};

use super::Context;
use crate::db::SearchHit;
use crate::error::PipelineError;
use crate::functions::{check_embedding, EMBED_TEXT};

/// Semantic search over an owner's photos.
///
/// The query is embedded remotely and compared against stored photo
/// embeddings. There is no keyword fallback: if the query cannot be
/// embedded the search fails.
pub fn search_by_text(ctx: &Context, owner_id: &str, query: &str) -> Result<Vec<SearchHit>, PipelineError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::Embedding {
            reason: "query is empty".to_string(),
        });
    }

    let embedding = ctx
        .functions
        .embed_text(query)
        .and_then(|embedding| {
            check_embedding(EMBED_TEXT, &embedding, ctx.config.functions.embedding_dim)?;
            Ok(embedding)
        })
        .map_err(|e| {
            warn!(%query, error = %e, "Query embedding failed");
            PipelineError::Embedding {
                reason: e.to_string(),
            }
        })?;

    let search = &ctx.config.search;
    let hits = ctx
        .db
        .search_photos(&embedding, owner_id, search.threshold, search.limit)
        .map_err(|e| PipelineError::store("Similarity search failed", e))?;

    info!(%query, hits = hits.len(), "Text search finished");
    Ok(hits)
}
