//! # csv-metadata-ingest
//!
//! Event-driven ingestion for uploaded CSV files.
//!
//! When an object lands in a bucket, the pipeline checks its size, fetches
//! it, parses it as CSV, and records a summary (row count, column names, …)
//! in a key-value table. Every invocation ends in exactly one of three
//! outcomes: success (200), rejected input (400), or environment failure
//! (500).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────────┐   ┌──────────────┐
//! │ Event / CLI  │──▶│ IngestPipeline                │──▶│ MetadataStore│
//! │ HTTP /invoke │   │ size ▶ fetch ▶ parse ▶ derive │   │ SQLite / mem │
//! └──────────────┘   └───────────────┬───────────────┘   └──────────────┘
//!                                    ▼
//!                             ┌──────────────┐
//!                             │ ObjectStore  │
//!                             │ S3 / FS / mem│
//!                             └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! csvmeta init                                   # create database + table
//! csvmeta process --bucket uploads --key a.csv   # run once for an object
//! csvmeta invoke event.json                      # run for an S3 notification
//! csvmeta get a.csv                              # show the stored record
//! csvmeta serve                                  # POST /invoke over HTTP
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`event`] | Event notification decoding |
//! | [`traits`] | Object store, metadata store, and clock seams |
//! | [`tabular`] | CSV decoding |
//! | [`pipeline`] | The ingestion pipeline |
//! | [`s3`] | Amazon S3 object store |
//! | [`fs_store`] | Local-directory object store |
//! | [`memory`] | In-memory stores |
//! | [`sqlite_store`] | SQLite metadata store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Table provisioning |
//! | [`ingest`] | Command-level wiring |
//! | [`records`] | Stored record lookup |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod event;
pub mod fs_store;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod s3;
pub mod server;
pub mod sqlite_store;
pub mod tabular;
pub mod traits;
