//! Build caching
//!
//! Two caches cooperate:
//!
//! - The **artifact cache** is the output directory itself. Artifact names
//!   are a pure function of crate and revision, so an existing
//!   `<crate>@<revision>.wasm` means that build already happened.
//! - **Cargo cache volumes** are named container volumes keyed by revision,
//!   mounted over the toolchain's Cargo home so rebuilding the same revision
//!   does not download the registry again.
//!
//! | Lookup | Hit | Miss |
//! |--------|-----|------|
//! | Artifact | skip the crate entirely | batch it for a container run |
//! | Volume | reuse downloaded deps | created empty before the run |

pub mod artifact;
pub mod volume;

pub use artifact::ArtifactCache;
pub use volume::{labels, CacheVolume};
