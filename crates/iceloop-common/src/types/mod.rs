//! Core data types for Iceloop

pub mod allocation;
pub mod fee;
pub mod health;
pub mod swap;
