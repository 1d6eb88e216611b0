//! Top-level XBF scene

use super::node::{Node, NodeId, NodeTree, Preorder};
use crate::error::Error;

/// One decoded XBF file.
///
/// A scene is returned even when decoding stopped early: `error` then says
/// why, and `unparsed_tail` holds every byte from the start of the failed
/// node onward so the file can still be written back unchanged.
///
/// If the header itself could not be read, `header_unparsed` is set and the
/// tail holds the whole input. Header fields read before the failure are
/// kept for inspection, but the writer emits only the tail.
#[derive(Debug, Default, PartialEq)]
pub struct Scene {
    pub version: i32,
    /// FX blob, carried verbatim.
    pub aux_data: Vec<u8>,
    /// Texture file names packed into one blob; see [`Scene::texture_names`].
    pub texture_name_data: Vec<u8>,
    pub nodes: NodeTree,
    pub error: Option<Error>,
    pub unparsed_tail: Option<Vec<u8>>,
    pub header_unparsed: bool,
}

impl Scene {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Whether the whole file was understood.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.unparsed_tail.is_none()
    }

    /// Texture file names from the texture table.
    pub fn texture_names(&self) -> Vec<String> {
        split_texture_names(&self.texture_name_data)
    }

    /// Root nodes in file order.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.roots().iter().map(|&id| &self.nodes[id])
    }

    /// Every node, depth-first, parents before children.
    pub fn iter(&self) -> Preorder<'_> {
        self.nodes.iter()
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.find_id(name).map(|id| &self.nodes[id])
    }

    pub fn find_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.find(name)
    }

    /// Node names indented two spaces per level.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.nodes.walk(|_, node, _, depth| {
            out.push_str(&" ".repeat(depth * 2));
            out.push_str(&node.name);
            out.push('\n');
        });
        out
    }
}

/// Split a texture table on `\0\0` or `\0\x02` pairs, dropping empty pieces.
pub fn split_texture_names(data: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == 0 && matches!(data[i + 1], 0 | 2) {
            if i > start {
                names.push(String::from_utf8_lossy(&data[start..i]).into_owned());
            }
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < data.len() {
        names.push(String::from_utf8_lossy(&data[start..]).into_owned());
    }
    names
}
