//! URL canonicalization
//!
//! Every URL stored in the catalog goes through [`canonicalize`] first, so
//! the canonical absolute form is the unique key for both page and image
//! records.

mod normalize;

pub use normalize::{canonicalize, UrlTarget};
