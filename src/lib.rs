//! workshopkit - A CLI toolkit for Steam Workshop collections
//!
//! This crate provides:
//! - Workshop catalog download through the Steam Web API
//! - Tag-based categorization of mods
//! - Size-bounded CSV shards per category
//! - Collection creation and bulk adding, tracked in a processing ledger

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod app;
pub mod collections;
pub mod config;
pub mod games;
pub mod mods;
pub mod progress;
pub mod shards;
pub mod steam;
pub mod store;

pub use app::App;
pub use config::Config;
