//! # XanLib
//!
//! A pure-Rust library for reading and writing XBF scene files.
//!
//! An XBF scene holds an FX blob, a texture name table and a tree of nodes
//! with geometry, vertex colors and optional vertex or keyframe animation.
//! Decoding is best-effort: a scene is always returned, and anything that
//! could not be understood is kept as raw bytes so the file can be written
//! back unchanged.
//!
//! ## Quick Start
//!
//! ```no_run
//! use xanlib::formats::xbf::{read_xbf, write_xbf};
//!
//! let scene = read_xbf("level.xbf")?;
//! for (_, node) in scene.iter() {
//!     println!("{} ({} vertices)", node.name, node.vertices.len());
//! }
//! if let Some(err) = &scene.error {
//!     println!("stopped early: {err}");
//! }
//! write_xbf(&scene, "level_copy.xbf")?;
//! # Ok::<(), xanlib::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use xanlib::prelude::*;
//!
//! let mut scene = Scene::new(1);
//! scene.nodes.add(None, Node::new("root"));
//! let bytes = serialize_xbf(&scene)?;
//! assert_eq!(parse_xbf_bytes(&bytes), scene);
//! # Ok::<(), xanlib::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `xanlib` command-line binary

pub mod batch;
pub mod error;
pub mod formats;

pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::formats::xbf::{
        CompressedVertex, Face, KeyAnimation, KeyAnimationData, KeyFrame, Node, NodeFlags,
        NodeId, NodeTree, Scene, SceneInfo, Vertex, VertexAnimation, VertexAnimationBody,
        inspect_scene, parse_xbf_bytes, read_xbf, read_xbf_from, serialize_xbf, write_xbf,
        write_xbf_to,
    };

    pub use crate::batch::{
        BatchVerifyResult, VerifyReport, VerifyStatus, find_xbf_files, verify_batch, verify_file,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
