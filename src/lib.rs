// src/lib.rs

//! questlog library
//!
//! Wiki-backed quest catalog synchronisation and per-character progress
//! tracking. The presentation layer consumes [`query::query`],
//! [`storage::ProfileStore`], and [`pipeline::SyncWorker`].

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod services;
pub mod storage;
pub mod utils;
