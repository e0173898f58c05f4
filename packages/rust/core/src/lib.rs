//! Location ingestion pipeline for catalogloader.
//!
//! [`LocationReaders`] reads a location through an ordered chain of
//! [`LocationProcessor`]s, round by round, until no new work is produced or
//! the depth bound is reached. [`CatalogRulesEnforcer`] decides which entity
//! kinds each location may contribute.

pub mod location_readers;
pub mod processors;
pub mod rules;

pub use location_readers::LocationReaders;
pub use processors::{Claim, LocationProcessor, LocationResolver, Transformed};
pub use rules::{CatalogRule, CatalogRulesEnforcer, RuleLocation};
