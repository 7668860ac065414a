//! Activity processor constants.

use crate::entities::MemoryType;

/// Memory types never considered by the auto-resolver.
#[must_use]
pub fn auto_resolve_skip_types() -> [MemoryType; 2] {
    [MemoryType::SessionSummary, MemoryType::Plan]
}

/// Activities listed in the classification prompt.
pub const CLASSIFY_ACTIVITY_LIMIT: usize = 20;
/// Prompts considered for title generation.
pub const TITLE_PROMPT_LIMIT: usize = 10;
/// Minimum subject length for derived-plan synthesis.
pub const PLAN_SUBJECT_MIN_CHARS: usize = 5;
/// Description cap in derived-plan markdown.
pub const PLAN_DESCRIPTION_MAX_CHARS: usize = 500;
/// Tag attached to processor-extracted observations.
pub const TAG_AUTO_EXTRACTED: &str = "auto-extracted";
/// Bounded LRU size for hook-event dedupe.
pub const HOOK_DEDUPE_CAPACITY: u64 = 512;
/// TTL for the hot session-stats cache, in seconds.
pub const SESSION_STATS_CACHE_TTL_SECS: u64 = 3;
