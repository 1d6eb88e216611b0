//! File format handlers

pub mod xbf;

pub use xbf::{Node, NodeTree, Scene, parse_xbf_bytes, read_xbf, serialize_xbf, write_xbf};
