//! URL normalization and filtering.
//!
//! Turns raw URL strings from the crawl data into normalized records with a
//! resolved registrable domain, and gates them through the quality filters.

mod domain_cache;
mod quality;
mod record;

pub use domain_cache::DomainCache;
pub use quality::{validate_host, verify_record_quality};
pub use record::{Scheme, UrlRecord};
