//! Route handlers, one module per resource.

pub mod files;
pub mod health;
pub mod tags;
pub mod uploads;
