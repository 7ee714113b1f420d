//! QKD Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the protocol
//! playback run against either a **wall clock** (tokio) or a **virtual
//! clock** (simulation/tests).
//!
//! # Core Concept
//!
//! The numeric BB84 pipeline is pure and instantaneous. Everything that is
//! time-based lives behind [`QkdContext`]:
//! - Time (`now()`, `sleep()`)
//! - Cooperative stop requests ([`CancelToken`])
//!
//! # Example
//!
//! ```ignore
//! use qkd_env::{QkdContext, CancelToken};
//!
//! async fn playback<Ctx: QkdContext>(ctx: &Ctx, cancel: &CancelToken) {
//!     for photon in 0..20 {
//!         if cancel.is_cancelled() {
//!             break;
//!         }
//!         ctx.sleep(Duration::from_millis(300)).await;
//!     }
//! }
//! ```

mod cancel;
mod context;
mod error;
mod tokio_impl;
mod types;

pub use cancel::CancelToken;
pub use context::QkdContext;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use types::RunId;
