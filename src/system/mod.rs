//! System module: repository path resolution and host tool invocation

pub mod host_tools;
pub mod paths;

pub use host_tools::{run_host_lua_gen, HostLuaInvocation};
pub use paths::{find_anchor, resolve_first_existing, Candidate, RepoPaths};
