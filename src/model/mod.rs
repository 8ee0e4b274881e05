//! Core data model types for messages and attachments.

pub mod attachment;
pub mod mail;
