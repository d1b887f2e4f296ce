//! MCP stdio interposition: message pumps, target process management,
//! and the gate proxy itself.

pub mod pipeline;
pub mod process;
pub mod proxy;
