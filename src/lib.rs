pub mod resolver;
pub mod server;

pub use resolver::{Resolver, ResolverConfig, ResolverFailure, ResolvedStream, StreamKind};
