//! Host bindings for the rootline core.

pub mod api;
