//! Types shared by the routing, execution, and HTTP layers

#![allow(clippy::must_use_candidate)]

mod context;
mod error;

pub use context::RequestContext;
pub use error::HttpError;
