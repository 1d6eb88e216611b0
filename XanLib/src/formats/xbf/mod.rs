//! XBF scene format
//!
//! XBF files hold a game scene: a small header with an opaque FX blob and a
//! texture name table, followed by a tree of nodes carrying geometry, colors
//! and optional vertex or keyframe animation. All values are little-endian.
//!
//! ```text
//! [version:i32][auxSize:i32][aux][texSize:i32][textureNames]
//! {Node}*  [-1]
//! ```
//!
//! Decoding is best-effort. When a node cannot be decoded, every byte from
//! the start of that node is kept as [`Scene::unparsed_tail`], so
//! `serialize_xbf(&parse_xbf_bytes(data))` reproduces `data` for any input
//! whose header could be read.

mod inspect;
mod key_animation;
mod node;
mod primitives;
mod reader;
mod scene;
mod stream;
mod vertex_animation;
mod writer;

pub use inspect::{NodeInfo, SceneInfo, inspect_scene, inspect_xbf};
pub use key_animation::{KeyAnimation, KeyAnimationData, KeyFrame, Matrix12, Matrix16};
pub use node::{
    Ancestors, MAX_NODE_DEPTH, NODE_TERMINATOR, Node, NodeFlags, NodeId, NodeTree, Preorder,
    read_node, write_node,
};
pub use primitives::{
    CompressedVertex, Face, Vertex, decode_signed_5bit, encode_signed_5bit,
};
pub use reader::{parse_xbf_bytes, read_xbf, read_xbf_from};
pub use scene::{Scene, split_texture_names};
pub use stream::XbfReader;
pub use vertex_animation::{
    CompressedFrames, INTERPOLATED_BIT, VertexAnimation, VertexAnimationBody,
};
pub use writer::{serialize_xbf, write_xbf, write_xbf_to};
