//! HTTP API over a shared [`saturn_memory::MemoryManager`].

pub mod error;
pub mod params;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, serve};
