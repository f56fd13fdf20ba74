#![doc = "kb-ingest-core: core logic library for kb-ingest."]

//! This crate holds the pipeline that refreshes a knowledge base from a local
//! directory: upload the files to the data-source bucket, start an ingestion
//! job, and wait for it to finish.
//! Cloud SDKs are not a dependency here; the binary crate provides the
//! implementations of the [`contract`] traits.

pub mod config;
pub mod contract;
pub mod ingestion;
pub mod synchronise;
pub mod upload;
