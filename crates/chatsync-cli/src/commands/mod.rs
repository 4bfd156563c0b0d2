pub mod clear;
pub mod common;
pub mod completions;
pub mod config;
pub mod daemon;
pub mod list;
pub mod send;
pub mod sync;
