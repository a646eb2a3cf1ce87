//! Single-writer command dispatcher
//!
//! - `command`: closed set of typed commands with per-call response slots
//! - `worker`: the thread that owns the connection and executes commands FIFO
//! - `client`: the `Database` handle concurrent callers use

pub mod client;
pub mod command;
pub mod worker;

pub use client::Database;
pub use command::Command;
pub use worker::{Dispatcher, DispatcherState, ShutdownHandle};
