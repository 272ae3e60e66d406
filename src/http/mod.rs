//! HTTP capture front.

pub mod server;

pub use server::MirrorServer;
