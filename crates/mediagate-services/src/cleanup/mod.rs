//! Expiration reaper

mod service;

pub use service::{CleanupService, SweepReport};
