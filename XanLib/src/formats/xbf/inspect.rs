//! XBF scene inspection utilities
//!
//! Flat summaries of a decoded scene, suitable for printing or JSON output.

use super::key_animation::KeyAnimationData;
use super::reader::read_xbf;
use super::scene::Scene;
use crate::error::Result;
use serde::Serialize;
use std::path::Path;

/// Summary of a whole scene.
#[derive(Debug, Clone, Serialize)]
pub struct SceneInfo {
    pub version: i32,
    pub aux_size: usize,
    pub texture_table_size: usize,
    pub textures: Vec<String>,
    pub root_count: usize,
    pub node_count: usize,
    pub vertex_count: usize,
    pub face_count: usize,
    pub vertex_animations: usize,
    pub key_animations: usize,
    pub error: Option<String>,
    pub unparsed_tail_len: Option<usize>,
    pub header_unparsed: bool,
    pub nodes: Vec<NodeInfo>,
}

/// One row per node, in pre-order.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub depth: usize,
    pub flags: i32,
    pub vertex_count: usize,
    pub face_count: usize,
    pub child_count: usize,
    pub has_rgb: bool,
    pub has_face_data: bool,
    /// `"uncompressed"` or `"compressed"`
    pub vertex_animation: Option<&'static str>,
    /// `"matrix16"`, `"matrix12"`, `"matrix12+extra"` or `"keyed"`
    pub key_animation: Option<&'static str>,
    pub animation_frames: Option<i32>,
}

/// Summarize a decoded scene.
pub fn inspect_scene(scene: &Scene) -> SceneInfo {
    let mut nodes = Vec::with_capacity(scene.nodes.len());
    scene.nodes.walk(|_, node, _, depth| {
        let key_animation = node.key_animation.as_ref().map(|anim| match anim.data {
            KeyAnimationData::Matrix16(_) => "matrix16",
            KeyAnimationData::Matrix12(_) => "matrix12",
            KeyAnimationData::Matrix12WithExtra { .. } => "matrix12+extra",
            KeyAnimationData::Keyed(_) => "keyed",
        });
        let animation_frames = node
            .key_animation
            .as_ref()
            .map(|a| a.frame_count)
            .or_else(|| node.vertex_animation.as_ref().map(|a| a.frame_count));

        nodes.push(NodeInfo {
            name: node.name.clone(),
            depth,
            flags: node.flags().bits(),
            vertex_count: node.vertices.len(),
            face_count: node.faces.len(),
            child_count: node.children().len(),
            has_rgb: node.rgb.is_some(),
            has_face_data: node.face_data.is_some(),
            vertex_animation: node.vertex_animation.as_ref().map(|anim| {
                if anim.is_compressed() {
                    "compressed"
                } else {
                    "uncompressed"
                }
            }),
            key_animation,
            animation_frames,
        });
    });

    SceneInfo {
        version: scene.version,
        aux_size: scene.aux_data.len(),
        texture_table_size: scene.texture_name_data.len(),
        textures: scene.texture_names(),
        root_count: scene.nodes.roots().len(),
        node_count: nodes.len(),
        vertex_count: nodes.iter().map(|n| n.vertex_count).sum(),
        face_count: nodes.iter().map(|n| n.face_count).sum(),
        vertex_animations: nodes.iter().filter(|n| n.vertex_animation.is_some()).count(),
        key_animations: nodes.iter().filter(|n| n.key_animation.is_some()).count(),
        error: scene.error.as_ref().map(ToString::to_string),
        unparsed_tail_len: scene.unparsed_tail.as_ref().map(Vec::len),
        header_unparsed: scene.header_unparsed,
        nodes,
    }
}

/// Read an XBF file and summarize it.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn inspect_xbf<P: AsRef<Path>>(source: P) -> Result<SceneInfo> {
    let scene = read_xbf(source)?;
    Ok(inspect_scene(&scene))
}
