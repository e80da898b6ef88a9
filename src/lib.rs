//! MATLAB MCP bridge
//!
//! Lets an MCP client run code in a long-lived MATLAB-compatible session and
//! read workspace variables back as JSON.
//!
//! - [`session`]: the session capability, the interpreter process behind it,
//!   and a mock for tests
//! - [`executor`]: file-then-capture execution of submitted code
//! - [`workspace`] and [`marshal`]: variable reads and value conversion
//! - [`bridge`]: the `runMatlabCode` / `getVariable` operations
//! - [`mcp_server`]: rmcp tool registration over stdio

pub mod bridge;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod marshal;
pub mod mcp_server;
pub mod session;
pub mod workspace;

pub use bridge::{Bridge, GetVariableResponse, RunCodeResponse};
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorKind};
pub use executor::{ExecutionEngine, ExecutionStage, Outcome};
pub use marshal::{marshal, JsonValue};
pub use session::{NativeValue, SessionError, SessionHandle};
