pub mod backend;
pub mod common;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod sync;
pub mod ui;

pub use error::ChatError;
