//! Core data types for crawling and proof aggregation.

pub mod cid;
pub mod config;
pub mod record;
