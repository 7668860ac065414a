//! Search and embedding limits.

/// Hard cap on search results per request.
pub const SEARCH_LIMIT_MAX: usize = 100;
/// Default search limit.
pub const SEARCH_LIMIT_DEFAULT: usize = 20;
/// Default relevance threshold.
pub const SEARCH_RELEVANCE_THRESHOLD: f32 = 0.3;
/// Hard cap on ids per fetch request.
pub const FETCH_IDS_MAX: usize = 20;
/// Embedding upsert batch size.
pub const EMBEDDING_BATCH_SIZE: usize = 64;
/// Vector delete retry budget.
pub const VECTOR_DELETE_RETRIES: usize = 3;
/// Backoff between vector delete retries, in milliseconds.
pub const VECTOR_DELETE_BACKOFF_MS: u64 = 500;
/// Preview length for search result snippets.
pub const RESULT_PREVIEW_CHARS: usize = 200;
