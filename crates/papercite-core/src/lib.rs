//! Data model, configuration and the deterministic pieces of the answer
//! pipeline that need no collaborators: the citation codec and the router.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod citation;
pub mod config;
pub mod error;
pub mod router;
pub mod traits;
pub mod types;

pub use citation::{format_citation, parse_citations, unique_ids};
pub use router::route;
