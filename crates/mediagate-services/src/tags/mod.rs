//! Tag name resolution and the tag catalogue

mod resolver;
mod service;

pub use resolver::{normalize_tag_names, resolve_tag_ids};
pub use service::{TagService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
