pub mod annotations;
pub mod app;
pub mod backfill;
pub mod clean;
pub mod config;
pub mod dedup;
pub mod diff;
pub mod domain;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod notify;
pub mod output;
pub mod remote;
pub mod validate;
pub mod writer;
