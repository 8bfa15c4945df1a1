//! Utility functions shared by the engine and the terminal front end.
//!
//! - **Text**: control-character stripping for upstream strings, and
//!   Unicode-aware width/truncation for terminal rows
//! - **Endpoints**: base-URL policy for the metadata service, video-id checks
//!
//! # Examples
//!
//! ```
//! use tubefeed::util::{truncate_to_width, validate_video_id};
//!
//! assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
//! assert!(validate_video_id("dQw4w9WgXcQ").is_ok());
//! ```

mod endpoint;
mod text;

pub use endpoint::{validate_base_url, validate_video_id, UrlValidationError};
pub use text::{display_width, pad_to_width, strip_control_chars, truncate_to_width};
