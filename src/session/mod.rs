pub mod client;

pub use client::{Backend, ChatClient};
