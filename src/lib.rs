//! Content-addressed mesh resource pipeline.
//!
//! Watches mesh files on disk, decodes glTF 2.0 and OpenCTM into a uniform
//! in-memory mesh representation, and notifies dependents when the
//! underlying files change. See the crate's component modules:
//!
//! * [`watch`] — observes a single absolute path for changes (C1).
//! * [`subscribe`] — multiplexes many callbacks onto one watched path (C2).
//! * [`loader`] — format-specific decoders (C3).
//! * [`cache`] — path-keyed loader cache, invalidated by the watcher (C4).
//! * [`anim`] — keyframe sampler extraction from decoded glTF (C5).
//!
//! Everything here runs on a single control thread: decoding, cache
//! invalidation, and watcher-event dispatch never run concurrently with one
//! another.

pub mod anim;
pub mod cache;
pub mod error;
pub mod loader;
pub mod mesh;
pub mod path;
pub mod sampler;
pub mod scene;
pub mod subscribe;
pub mod watch;

pub use cache::MeshCache;
pub use error::{PipelineError, PipelineResult};
pub use loader::{Loader, MeshDescriptor};
pub use mesh::Mesh;
pub use path::AbsolutePath;
pub use scene::SceneGraph;
pub use subscribe::{SubscriptionHandle, SubscriptionRegistry};
