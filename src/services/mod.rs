//! Service wiring
//!
//! `ServiceFactory` builds the store, cache, provider and translator from the
//! configuration and assembles them into a `TrackService`.

pub mod factory;

pub use factory::ServiceFactory;
