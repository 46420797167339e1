//! Wire protocol: value and message encodings plus the per-connection tables
//! that give references their identity.

pub mod class_registry;
pub mod message;
pub mod tables;
pub mod value_codec;
pub mod wire;

#[cfg(test)]
mod tests;

pub use class_registry::*;
pub use message::*;
pub use tables::*;
pub use value_codec::*;
pub use wire::*;
