//! Message parsing
//!
//! Turns raw JSON frames from the CLI into typed [`Message`](crate::types::Message) values.

pub mod parser;

pub use parser::{parse_content_block, parse_message};
