//! # Weft Runtime
//!
//! Hierarchical cancellation scopes for background tasks.
//!
//! A [`Scope`] owns a set of spawned tasks and zero or more child scopes.
//! Shutting a scope down signals every task and descendant scope; joining it
//! waits until all of them have returned. Scopes are the only cancellation
//! primitive the core components see; timeouts are built by wrapping a
//! spawned timer that calls [`Scope::shutdown`].
//!
//! ## Example
//!
//! ```rust,ignore
//! let scope = Scope::named("forward");
//! let exit = scope.exit();
//! scope.spawn(async move {
//!     loop {
//!         tokio::select! {
//!             _ = exit.cancelled() => break,
//!             frame = endpoint.recv() => { /* ... */ }
//!         }
//!     }
//! });
//! scope.shutdown();
//! scope.join().await;
//! ```

pub mod scope;

pub use scope::{Scope, ScopeState};
