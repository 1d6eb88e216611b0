//! Scene node tree and the recursive node codec
//!
//! Nodes live in a [`NodeTree`] arena and refer to each other by [`NodeId`].
//! Ownership runs parent to children; the `parent` link is only used for
//! ancestor walks.
//!
//! On-disk layout of one node:
//! ```text
//! [vertexCount:i32]            -- -1 ends the sibling list
//! [flags:i32][faceCount:i32][childCount:i32][transform:16×f64]
//! [nameLen:i32][name: nameLen ascii bytes]
//! {childCount × Node}
//! {vertexCount × Vertex}{faceCount × Face}
//! [rgb][faceData][VertexAnimation][KeyAnimation]   -- gated by flags 1, 2, 4, 8
//! ```

use super::key_animation::KeyAnimation;
use super::primitives::{Face, Vertex};
use super::stream::{XbfReader, checked_count, wire_count};
use super::vertex_animation::VertexAnimation;
use crate::error::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use glam::DMat4;
use std::io::{Cursor, Read, Seek, Write};
use std::ops::{BitOr, Index};

/// Value of the leading `vertexCount` that ends a sibling list.
pub const NODE_TERMINATOR: i32 = -1;

/// Deepest child nesting accepted when decoding.
pub const MAX_NODE_DEPTH: usize = 1000;

/// Handle to a node inside a [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena (pre-order for decoded trees).
    pub fn index(self) -> usize {
        self.0
    }
}

/// Optional section bits of the node header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(i32);

impl NodeFlags {
    /// Per-vertex prelight colors.
    pub const COLOR: Self = Self(1);
    /// Per-face smoothing group data.
    pub const FACE_DATA: Self = Self(2);
    pub const VERTEX_ANIM: Self = Self(4);
    pub const KEY_ANIM: Self = Self(8);

    const KNOWN: i32 = 0b1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Accepts only words made of the four known bits.
    pub const fn from_bits(bits: i32) -> Option<Self> {
        if bits & !Self::KNOWN == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One entry of the scene's transform/mesh hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// 16 values in on-disk order.
    pub transform: [f64; 16],
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    /// One color per vertex.
    pub rgb: Option<Vec<[u8; 3]>>,
    /// One value per face.
    pub face_data: Option<Vec<i32>>,
    pub vertex_animation: Option<VertexAnimation>,
    pub key_animation: Option<KeyAnimation>,
}

impl Node {
    pub const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    /// An empty node with an identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            transform: Self::IDENTITY,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Header flags derived from which optional sections are populated.
    pub fn flags(&self) -> NodeFlags {
        let mut flags = NodeFlags::empty();
        if self.rgb.is_some() {
            flags.insert(NodeFlags::COLOR);
        }
        if self.face_data.is_some() {
            flags.insert(NodeFlags::FACE_DATA);
        }
        if self.vertex_animation.is_some() {
            flags.insert(NodeFlags::VERTEX_ANIM);
        }
        if self.key_animation.is_some() {
            flags.insert(NodeFlags::KEY_ANIM);
        }
        flags
    }

    /// The stored transform read column-major, which is how the import
    /// tooling applies it.
    pub fn local_matrix(&self) -> DMat4 {
        DMat4::from_cols_array(&self.transform)
    }

    fn validate(&self) -> Result<()> {
        if let Some(rgb) = &self.rgb {
            if rgb.len() != self.vertices.len() {
                return Err(Error::mismatch(format!(
                    "node '{}' has {} colors for {} vertices",
                    self.name,
                    rgb.len(),
                    self.vertices.len()
                )));
            }
        }
        if let Some(face_data) = &self.face_data {
            if face_data.len() != self.faces.len() {
                return Err(Error::mismatch(format!(
                    "node '{}' has {} face data entries for {} faces",
                    self.name,
                    face_data.len(),
                    self.faces.len()
                )));
            }
        }
        if !self.name.is_ascii() {
            return Err(Error::mismatch(format!("node name '{}' is not ascii", self.name)));
        }
        Ok(())
    }
}

/// Arena holding every node of a scene plus the ordered list of roots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Add a node as the last root or the last child of `parent`.
    ///
    /// Any parent or children already set on `node` are replaced.
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this tree.
    pub fn add(&mut self, parent: Option<NodeId>, mut node: Node) -> NodeId {
        node.parent = parent;
        node.children.clear();
        let id = self.push(node);
        self.link(parent, id);
        id
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn link(&mut self, parent: Option<NodeId>, id: NodeId) {
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
    }

    /// Parent chain of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).and_then(Node::parent),
        }
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Depth-first pre-order over every root and its subtree.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Depth-first pre-order over `id` and its subtree.
    pub fn descendants(&self, id: NodeId) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![id],
        }
    }

    /// First node in pre-order with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, node)| node.name == name).map(|(id, _)| id)
    }

    /// Visit every node with its parent and depth, parents before children.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(NodeId, &Node, Option<NodeId>, usize),
    {
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            visit(id, node, node.parent, depth);
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }

    /// Encode one node and its subtree.
    pub fn node_to_bytes(&self, id: NodeId) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_node(self, id, &mut out)?;
        Ok(out)
    }

    /// Decode one node (and its subtree) from `data` as a new root.
    ///
    /// Returns `None` when `data` starts with the sibling-list terminator.
    pub fn read_root_bytes(&mut self, data: &[u8]) -> Result<Option<NodeId>> {
        let mut reader = XbfReader::new(Cursor::new(data))?;
        read_node(&mut reader, self, None)
    }
}

impl Index<NodeId> for NodeTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

pub struct Ancestors<'a> {
    tree: &'a NodeTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.get(id).and_then(Node::parent);
        Some(id)
    }
}

pub struct Preorder<'a> {
    tree: &'a NodeTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}

/// Decode one node and its subtree, linking it under `parent` (or as a root).
///
/// Returns `Ok(None)` for the sibling-list terminator. On error the reader is
/// rewound to where this node started and the tree is left unchanged.
pub fn read_node<R: Read + Seek>(
    reader: &mut XbfReader<R>,
    tree: &mut NodeTree,
    parent: Option<NodeId>,
) -> Result<Option<NodeId>> {
    read_node_at_depth(reader, tree, parent, 0)
}

fn read_node_at_depth<R: Read + Seek>(
    reader: &mut XbfReader<R>,
    tree: &mut NodeTree,
    parent: Option<NodeId>,
    depth: usize,
) -> Result<Option<NodeId>> {
    let start = reader.position();
    let arena_len = tree.nodes.len();

    match decode_node(reader, tree, parent, depth) {
        Ok(Some(id)) => {
            tree.link(parent, id);
            Ok(Some(id))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            tree.nodes.truncate(arena_len);
            reader.seek_to(start)?;
            Err(e)
        }
    }
}

fn decode_node<R: Read + Seek>(
    reader: &mut XbfReader<R>,
    tree: &mut NodeTree,
    parent: Option<NodeId>,
    depth: usize,
) -> Result<Option<NodeId>> {
    let vertex_count = reader.read_i32()?;
    if vertex_count == NODE_TERMINATOR {
        return Ok(None);
    }
    if depth >= MAX_NODE_DEPTH {
        return Err(Error::mismatch(format!(
            "node nesting deeper than {MAX_NODE_DEPTH} levels"
        )));
    }
    let vertex_count = checked_count(vertex_count, "vertex count")?;

    let raw_flags = reader.read_i32()?;
    let flags = NodeFlags::from_bits(raw_flags).ok_or(Error::UnknownDiscriminant {
        field: "node flags",
        value: i64::from(raw_flags),
    })?;
    let face_count = checked_count(reader.read_i32()?, "face count")?;
    let child_count = checked_count(reader.read_i32()?, "child count")?;

    let mut transform = [0f64; 16];
    for value in &mut transform {
        *value = reader.read_f64()?;
    }

    let name_len = checked_count(reader.read_i32()?, "name length")?;
    let name_bytes = reader.read_bytes(name_len)?;
    if !name_bytes.is_ascii() {
        return Err(Error::mismatch(format!(
            "node name at offset {} is not ascii",
            reader.position() - name_len as u64
        )));
    }
    let name = String::from_utf8(name_bytes)
        .map_err(|e| Error::mismatch(format!("node name is not valid text: {e}")))?;

    let id = tree.push(Node {
        parent,
        transform,
        name,
        ..Node::default()
    });

    for index in 0..child_count {
        if read_node_at_depth(reader, tree, Some(id), depth + 1)?.is_none() {
            return Err(Error::mismatch(format!(
                "sibling terminator found in place of child {index} of {child_count}"
            )));
        }
    }

    let vertices = reader.read_records(vertex_count, Vertex::from_record)?;
    let faces = reader.read_records(face_count, Face::from_record)?;

    let rgb = if flags.contains(NodeFlags::COLOR) {
        Some(reader.read_records::<_, 3>(vertex_count, |b| *b)?)
    } else {
        None
    };
    let face_data = if flags.contains(NodeFlags::FACE_DATA) {
        Some(reader.read_i32_list(face_count)?)
    } else {
        None
    };
    let vertex_animation = if flags.contains(NodeFlags::VERTEX_ANIM) {
        Some(VertexAnimation::read(reader)?)
    } else {
        None
    };
    let key_animation = if flags.contains(NodeFlags::KEY_ANIM) {
        Some(KeyAnimation::read(reader)?)
    } else {
        None
    };

    let node = &mut tree.nodes[id.0];
    node.vertices = vertices;
    node.faces = faces;
    node.rgb = rgb;
    node.face_data = face_data;
    node.vertex_animation = vertex_animation;
    node.key_animation = key_animation;

    Ok(Some(id))
}

/// Encode a node and its subtree. Flags and counts are derived from the
/// node's contents.
///
/// # Panics
/// Panics if `id` does not belong to `tree`.
pub fn write_node<W: Write>(tree: &NodeTree, id: NodeId, writer: &mut W) -> Result<()> {
    let node = &tree[id];
    node.validate()?;

    writer.write_i32::<LittleEndian>(wire_count(node.vertices.len(), "vertex count")?)?;
    writer.write_i32::<LittleEndian>(node.flags().bits())?;
    writer.write_i32::<LittleEndian>(wire_count(node.faces.len(), "face count")?)?;
    writer.write_i32::<LittleEndian>(wire_count(node.children.len(), "child count")?)?;
    for &value in &node.transform {
        writer.write_f64::<LittleEndian>(value)?;
    }
    writer.write_i32::<LittleEndian>(wire_count(node.name.len(), "name length")?)?;
    writer.write_all(node.name.as_bytes())?;

    for &child in &node.children {
        write_node(tree, child, writer)?;
    }

    for vertex in &node.vertices {
        vertex.write(writer)?;
    }
    for face in &node.faces {
        face.write(writer)?;
    }
    if let Some(rgb) = &node.rgb {
        for color in rgb {
            writer.write_all(color)?;
        }
    }
    if let Some(face_data) = &node.face_data {
        for &value in face_data {
            writer.write_i32::<LittleEndian>(value)?;
        }
    }
    if let Some(anim) = &node.vertex_animation {
        anim.write(writer)?;
    }
    if let Some(anim) = &node.key_animation {
        anim.write(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::xbf::key_animation::{KeyAnimationData, KeyFrame};
    use crate::formats::xbf::vertex_animation::VertexAnimationBody;

    fn triangle(name: &str) -> Node {
        let mut node = Node::new(name);
        node.vertices = vec![
            Vertex { position: [0.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [1.0, 0.0, 0.0], normal: [0.0, 0.0, 1.0] },
            Vertex { position: [0.0, 1.0, 0.0], normal: [0.0, 0.0, 1.0] },
        ];
        node.faces = vec![Face {
            vertex_indices: [0, 1, 2],
            texture_index: 0,
            flags: 0,
            uv_coords: [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        }];
        node
    }

    #[test]
    fn test_terminator_consumes_four_bytes() {
        let data = (-1i32).to_le_bytes();
        let mut reader = XbfReader::new(Cursor::new(&data[..])).unwrap();
        let mut tree = NodeTree::new();
        assert_eq!(read_node(&mut reader, &mut tree, None).unwrap(), None);
        assert_eq!(reader.position(), 4);
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn test_basic_node_layout() {
        let mut tree = NodeTree::new();
        let id = tree.add(None, triangle("tri"));
        let bytes = tree.node_to_bytes(id).unwrap();

        let header = 4 * 4 + 16 * 8 + 4 + 3;
        assert_eq!(bytes.len(), header + 3 * Vertex::SIZE + Face::SIZE);
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0i32.to_le_bytes());
        assert_eq!(&bytes[header - 3..header], b"tri");

        let mut decoded = NodeTree::new();
        let root = decoded.read_root_bytes(&bytes).unwrap().unwrap();
        assert_eq!(decoded[root], tree[id]);
        assert_eq!(decoded.node_to_bytes(root).unwrap(), bytes);
    }

    #[test]
    fn test_children_precede_own_geometry() {
        let mut tree = NodeTree::new();
        let root = tree.add(None, triangle("root"));
        let child = tree.add(Some(root), Node::new("child"));
        let grandchild = tree.add(Some(child), triangle("grandchild"));

        let bytes = tree.node_to_bytes(root).unwrap();
        // root header is 152 bytes, the child's header follows immediately
        let child_name_at = bytes.windows(5).position(|w| w == b"child").unwrap();
        assert_eq!(child_name_at, 152 + 148);
        assert_eq!(&bytes[152..156], &0i32.to_le_bytes());

        let mut decoded = NodeTree::new();
        let id = decoded.read_root_bytes(&bytes).unwrap().unwrap();
        assert_eq!(decoded.len(), 3);
        let names: Vec<_> = decoded.iter().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, ["root", "child", "grandchild"]);

        let gc = decoded.find("grandchild").unwrap();
        assert_eq!(gc, grandchild);
        assert_eq!(decoded.ancestors(gc).collect::<Vec<_>>(), vec![child, root]);
        assert_eq!(decoded.depth(gc), 2);
        assert_eq!(decoded[id].children(), &[child]);
        assert_eq!(decoded.node_to_bytes(id).unwrap(), bytes);
    }

    #[test]
    fn test_optional_sections_roundtrip() {
        let mut node = triangle("full");
        node.rgb = Some(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        node.face_data = Some(vec![42]);
        node.vertex_animation = Some(VertexAnimation {
            frame_count: 2,
            keys: vec![1, 2, 3],
            body: VertexAnimationBody::Uncompressed { count: 1 },
        });
        node.key_animation = Some(KeyAnimation {
            frame_count: 0,
            data: KeyAnimationData::Keyed(vec![KeyFrame {
                frame_id: 0,
                translation: Some([1.0, 2.0, 3.0]),
                ..KeyFrame::default()
            }]),
        });
        assert_eq!(node.flags().bits(), 15);

        let mut tree = NodeTree::new();
        let id = tree.add(None, node);
        let bytes = tree.node_to_bytes(id).unwrap();
        assert_eq!(&bytes[4..8], &15i32.to_le_bytes());

        let mut decoded = NodeTree::new();
        let root = decoded.read_root_bytes(&bytes).unwrap().unwrap();
        assert_eq!(decoded[root], tree[id]);
    }

    #[test]
    fn test_color_count_mismatch_fails_encode() {
        let mut node = triangle("bad");
        node.rgb = Some(vec![[1, 2, 3]]);
        let mut tree = NodeTree::new();
        let id = tree.add(None, node);
        assert!(matches!(
            tree.node_to_bytes(id),
            Err(Error::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_face_data_count_mismatch_fails_encode() {
        let mut node = triangle("bad");
        node.face_data = Some(Vec::new());
        let mut tree = NodeTree::new();
        let id = tree.add(None, node);
        assert!(matches!(
            tree.node_to_bytes(id),
            Err(Error::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_decode_rewinds_and_leaves_tree_untouched() {
        let mut source = NodeTree::new();
        let root = source.add(None, triangle("root"));
        source.add(Some(root), triangle("child"));
        let bytes = source.node_to_bytes(root).unwrap();
        let cut = &bytes[..bytes.len() - 10];

        let mut reader = XbfReader::new(Cursor::new(cut)).unwrap();
        let mut tree = NodeTree::new();
        let err = read_node(&mut reader, &mut tree, None).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { .. }));
        assert_eq!(reader.position(), 0);
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn test_unknown_flag_bits_rejected() {
        let mut tree = NodeTree::new();
        let id = tree.add(None, Node::new("n"));
        let mut bytes = tree.node_to_bytes(id).unwrap();
        bytes[4..8].copy_from_slice(&16i32.to_le_bytes());

        let err = NodeTree::new().read_root_bytes(&bytes).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownDiscriminant {
                field: "node flags",
                value: 16
            }
        );
    }

    #[test]
    fn test_terminator_in_child_slot_is_mismatch() {
        let mut tree = NodeTree::new();
        let id = tree.add(None, Node::new("parent"));
        let mut bytes = tree.node_to_bytes(id).unwrap();
        bytes[12..16].copy_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());

        let err = NodeTree::new().read_root_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::StructuralMismatch { .. }));
    }

    #[test]
    fn test_non_ascii_name_rejected() {
        let mut tree = NodeTree::new();
        let id = tree.add(None, Node::new("ab"));
        let mut bytes = tree.node_to_bytes(id).unwrap();
        let at = bytes.len() - 2;
        bytes[at] = 0xC3;
        assert!(matches!(
            NodeTree::new().read_root_bytes(&bytes),
            Err(Error::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_local_matrix_is_column_major() {
        let mut node = Node::new("m");
        node.transform[12] = 5.0;
        assert_eq!(node.local_matrix().w_axis.x, 5.0);
    }

    #[test]
    fn test_walk_reports_depth_and_parent() {
        let mut tree = NodeTree::new();
        let a = tree.add(None, Node::new("a"));
        let b = tree.add(Some(a), Node::new("b"));
        let c = tree.add(None, Node::new("c"));

        let mut seen = Vec::new();
        tree.walk(|id, node, parent, depth| seen.push((id, node.name.clone(), parent, depth)));
        assert_eq!(
            seen,
            vec![
                (a, "a".to_string(), None, 0),
                (b, "b".to_string(), Some(a), 1),
                (c, "c".to_string(), None, 0),
            ]
        );
        assert_eq!(tree.descendants(a).count(), 2);
    }
}
