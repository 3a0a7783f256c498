// Utility helpers shared by the request layer and logging

pub mod format;

pub use format::{format_large_number, key_strength};
