//! HTTP boundary for the pipeline.
//!
//! Thin layer over [`Pipeline`](crate::pipeline::Pipeline): handlers parse
//! requests, call one pipeline operation, and map [`RagError`]
//! (crate::error::RagError) kinds onto status codes. No pipeline logic
//! lives here.
pub mod handlers;
pub mod server;
