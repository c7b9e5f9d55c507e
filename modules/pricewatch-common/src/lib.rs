//! Shared data model, config and errors for the pricewatch pipeline.
//!
//! The untrusted inputs (event packs, per-user rule documents) enter the
//! system through [`pack::validate`] and [`rules::parse_rules`]; everything
//! downstream works with the typed model in [`types`].

pub mod config;
pub mod error;
pub mod pack;
pub mod rules;
pub mod types;

pub use config::Config;
pub use error::Error;
pub use pack::{validate, ValidatedPack};
pub use rules::parse_rules;
pub use types::*;
