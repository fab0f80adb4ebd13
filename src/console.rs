//! Console integration - the actor, its protocol and its TCP links
//!
//! All console state lives in one [`ConsoleActor`]; connection tasks and the
//! command line only ever talk to it through a [`ConsoleHandle`].

mod actor;
mod actor_handle;
mod commands;
pub mod connection;
pub mod protocol;
pub mod transport;

pub use actor::{ConsoleActor, ConsoleSettings};
pub use actor_handle::ConsoleHandle;
pub use commands::{ConsoleStatus, FadeDefaults, FadeRequest, SourceStatus};
pub use connection::{spawn_connection, ConnectionHandle, ConsoleSource};
pub use protocol::ConsoleCommand;
pub use transport::Transport;
