//! URL handling module for Driftnet
//!
//! This module provides claim-key normalization, host extraction and sitemap
//! URL detection.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_sitemap_url, same_host};
pub use normalize::{claim_key, normalize_url};
