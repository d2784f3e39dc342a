//! Pseudonym identity aggregation job.
//!
//! Pulls per-partner activity for every AdSwizz listener id out of the
//! datastream index, flattens it into identity records with uniqueness flags,
//! and upserts them into the identities index (document id
//! `partnerkey_adswizzid`), purging identities past the retention window
//! first.

pub mod cli;
pub mod config;
pub mod es_client;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod window;
