//! Client for the remote video-metadata service.
//!
//! [`VideoSource`] is the seam the engine talks to; [`YoutubeClient`] is the
//! HTTP implementation. Every method returns an already-normalized
//! [`FeedPage`](crate::feed::FeedPage).

mod client;

pub use client::{ErrorKind, FetchError, VideoSource, YoutubeClient, DEFAULT_BASE_URL};
