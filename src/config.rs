//! Invocation parameters: types, transport selection, and argument file loading.

pub mod persistence;
pub mod types;

/// Default NETCONF-over-SSH port.
pub const DEFAULT_PORT: u16 = 830;
