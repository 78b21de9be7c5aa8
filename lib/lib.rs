//! Minimal VTY Server
//!
//! A line-oriented telnet-style terminal server. Each connection receives a
//! fixed option greeting, then sends NUL-delimited commands that are handed
//! to a [`CommandHandler`]; the handler's output goes back to the same peer.
//!
//! # Features
//!
//! - **Admission Control**: A fixed number of concurrent sessions; extra peers get a notice and are closed
//! - **Task Per Session**: Sessions run in parallel on the Tokio runtime and never block each other
//! - **Pluggable Commands**: Any [`CommandHandler`] (including closures) decides what a command does
//! - **Graceful Shutdown**: Stop accepting, drain in-flight sessions, then close the rest

pub mod admission;
pub mod config;
pub mod handler;
pub mod listener;
pub mod server;
pub mod session;
pub mod telnet;
pub mod types;

pub use admission::{AdmissionController, AdmissionSlot};
pub use config::GlobalConfig;
pub use handler::{CommandHandler, EchoHandler};
pub use listener::Listener;
pub use server::{Server, ShutdownHandle};
pub use session::{Session, SessionContext, SessionState};
pub use telnet::CommandFrame;
pub use types::{Result, VtyError};
