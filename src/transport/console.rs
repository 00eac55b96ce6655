//! Console bootstrap transport: the netconify executor and its notifier.

pub mod executor;
pub mod notifier;

pub use executor::NetconifyCommand;
pub use notifier::Notifier;
