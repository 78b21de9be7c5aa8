//! Session management.

mod id;
mod session;

pub use id::generate_session_id;
pub use session::{capacity_notice, reject, Session, SessionContext, SessionState, VTY_NEWLINE};
