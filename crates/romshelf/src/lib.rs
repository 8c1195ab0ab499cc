//! A ROM library with save states that hands games to an external emulator

pub mod catalog;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod session;
pub mod storage;
pub mod system;
