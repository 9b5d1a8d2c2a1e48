//! Model Context Protocol front-end: JSON-RPC types, the tool table,
//! `amplitude://` resources, request dispatch and the HTTP transport.

pub mod http;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
pub use tools::{Operation, ToolEntry, ToolOutput};
