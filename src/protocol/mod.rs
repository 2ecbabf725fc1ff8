//! Protocol definitions for XBee API mode.
//!
//! This module contains the low-level protocol types:
//! - Frame encoding/decoding with API mode 2 escaping
//! - API frame identifiers

pub mod api;
pub mod frame;

pub use api::ApiId;
pub use frame::{
    ApiMode, FrameDecoder, MAX_FRAME_SIZE, START_DELIMITER, checksum, encode as encode_frame,
};
