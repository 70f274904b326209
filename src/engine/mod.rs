//! Core engine — the observe → decide → execute → announce loop.

pub mod policy;
pub mod reader;
pub mod executor;
pub mod messages;
pub mod report;
pub mod sweeper;
