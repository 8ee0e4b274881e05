//! `eml2html` — convert `.eml` email files into self-contained HTML.
//!
//! This crate parses a message, extracts its attachments to disk, downloads
//! the remote media its body references (deduplicated, concurrency-bounded,
//! per-item timeout), rewrites every media reference to a local copy, and
//! writes one HTML document per input.

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod parser;
pub mod sniff;
