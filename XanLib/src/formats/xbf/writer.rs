//! XBF scene encoding

use super::node::{NODE_TERMINATOR, write_node};
use super::scene::Scene;
use super::stream::wire_count;
use crate::error::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

/// Write a scene to disk.
///
/// The scene is fully encoded before the file is created, so an encode error
/// leaves no partial file behind.
pub fn write_xbf<P: AsRef<Path>>(scene: &Scene, path: P) -> Result<()> {
    let bytes = serialize_xbf(scene)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Serialize a scene to bytes
pub fn serialize_xbf(scene: &Scene) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    write_xbf_to(scene, &mut output)?;
    Ok(output)
}

/// Encode a scene into any writer.
///
/// Counts and flags are derived from the scene's contents. When the scene
/// carries an unparsed tail it replaces the closing terminator. A scene whose
/// header could not be read is written as its raw tail alone.
pub fn write_xbf_to<W: Write>(scene: &Scene, writer: &mut W) -> Result<()> {
    if scene.header_unparsed {
        if let Some(tail) = &scene.unparsed_tail {
            writer.write_all(tail)?;
            return Ok(());
        }
    }

    writer.write_i32::<LittleEndian>(scene.version)?;
    writer.write_i32::<LittleEndian>(wire_count(scene.aux_data.len(), "aux size")?)?;
    writer.write_all(&scene.aux_data)?;
    writer.write_i32::<LittleEndian>(wire_count(
        scene.texture_name_data.len(),
        "texture table size",
    )?)?;
    writer.write_all(&scene.texture_name_data)?;

    for &root in scene.nodes.roots() {
        write_node(&scene.nodes, root, writer)?;
    }

    match &scene.unparsed_tail {
        Some(tail) => writer.write_all(tail)?,
        None => writer.write_i32::<LittleEndian>(NODE_TERMINATOR)?,
    }

    tracing::debug!(
        "Encoded XBF version {} with {} root nodes",
        scene.version,
        scene.nodes.roots().len()
    );
    Ok(())
}
