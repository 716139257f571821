//! Identity Module
//!
//! Entity Resolver: frame detection -> durable employee id or ephemeral
//! cluster key. No durable profile is ever built for unidentified persons.

pub mod types;
pub mod resolver;

pub use types::{FrameContext, IdentityKey};
pub use resolver::EntityResolver;
