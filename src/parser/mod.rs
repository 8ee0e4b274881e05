//! Email parsing: `.eml` loading and MIME decoding via `mail-parser`.

pub mod eml;
