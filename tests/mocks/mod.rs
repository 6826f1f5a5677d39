//! Mock implementations for coordinator tests
//!
//! This module provides a scripted extractor so the full task lifecycle
//! can be exercised without yt-dlp or the network.

pub mod mock_extractor;

pub use mock_extractor::{MediaScript, MockExtractor};
