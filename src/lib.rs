//! Collects product listings and social mentions, normalizes product titles and
//! scores mention sentiment.

pub mod amazon;
pub mod api;
pub mod config;
pub mod db;
pub mod export;
pub mod noise;
pub mod normalizer;
pub mod pipeline;
pub mod reddit;
pub mod sentiment;
pub mod tagger;
