//! Small, pure-function-shaped helpers that don't warrant their own crate:
//! the embedding cache, reciprocal-rank fusion, and the token estimator.

mod rrf;
mod token_estimate;
mod ttl_lru;

pub use rrf::reciprocal_rank_fusion;
pub use token_estimate::estimate_tokens;
pub use ttl_lru::TtlLruCache;
