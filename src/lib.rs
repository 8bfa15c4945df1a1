//! tubefeed: feed retrieval and normalization for a video-metadata service.
//!
//! The library holds the engine (normalization, cursor pagination,
//! visibility-driven loading, watch history, up-next suggestions); the
//! `tubefeed` binary is a thin terminal front end on top of it.

pub mod api;
pub mod config;
pub mod engine;
pub mod feed;
pub mod history;
pub mod storage;
pub mod suggest;
pub mod util;
