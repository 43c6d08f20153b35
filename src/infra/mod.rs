//! Infrastructure layer for Symscope
//!
//! Lexing, the reference checker and manifest loading.

pub mod checker;
pub mod manifest;
pub mod tokenizer;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hash content for cache invalidation
#[inline]
pub fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}
