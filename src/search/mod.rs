/// Search and tag filtering
pub mod facet;

pub use facet::{ImageFilter, SearchFacet};
