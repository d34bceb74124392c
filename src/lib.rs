//! # lingorag: Multilingual Retrieval QA
//!
//! Answers questions over a small corpus of teachings in English, Hindi,
//! Telugu and Kannada. Documents are chunked, embedded with a multilingual
//! model and stored in a flat vector index; questions pass a topic safety
//! gate and language detection before the closest passages are returned as
//! the answer, with their sources.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, environment overrides, validation
//! - **[`embedder`]**: Text embedding via ONNX Runtime (multilingual-e5-small)
//! - **[`indexer`]**: Text/PDF extraction, chunking, and the ingestion pipeline
//! - **[`store`]**: Flat inner-product index persisted as two companion files
//! - **[`retriever`]**: Query embedding and top-k lookup
//! - **[`language`]**: Script-based language detection with fallback
//! - **[`logging`]**: Tracing subscriber with a reloadable level filter
//! - **[`safety`]**: Topic gate and response sanitizer
//! - **[`engine`]**: Serve-time question answering over the pieces above
//! - **[`mcp`]**: MCP server exposing ask/search/build_index/health (stdio via rmcp)

pub mod config;
pub mod embedder;
pub mod engine;
pub mod indexer;
pub mod language;
pub mod logging;
pub mod mcp;
pub mod retriever;
pub mod safety;
pub mod store;
