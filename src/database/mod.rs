// file: src/database/mod.rs
// description: embedded storage module exports
// reference: internal module structure

pub mod client;
pub mod push_records;
pub mod schema;

pub use client::Store;
pub use push_records::PushRecordStore;
