//! XBF scene decoding
//!
//! Decoding never fails on bad file content. Whatever could be read is
//! returned, and the first failure is recorded on the [`Scene`] together with
//! the bytes it left unread.

use super::node::read_node;
use super::scene::Scene;
use super::stream::XbfReader;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Read an XBF file from disk.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be opened. Malformed content is
/// reported through [`Scene::error`] instead.
///
/// [`Error::Io`]: crate::Error::Io
pub fn read_xbf<P: AsRef<Path>>(path: P) -> Result<Scene> {
    let file = File::open(path)?;
    read_xbf_from(BufReader::new(file))
}

/// Decode a scene from a seekable stream, starting at its current position.
///
/// # Errors
/// Returns [`Error::Io`] only if the stream cannot report its position or
/// length up front.
///
/// [`Error::Io`]: crate::Error::Io
pub fn read_xbf_from<R: Read + Seek>(reader: R) -> Result<Scene> {
    let mut reader = XbfReader::new(reader)?;
    Ok(decode_scene(&mut reader))
}

/// Decode a scene from an in-memory buffer.
pub fn parse_xbf_bytes(data: &[u8]) -> Scene {
    read_xbf_from(Cursor::new(data)).unwrap_or_else(|err| Scene {
        error: Some(err),
        unparsed_tail: Some(data.to_vec()),
        header_unparsed: true,
        ..Scene::default()
    })
}

fn decode_scene<R: Read + Seek>(reader: &mut XbfReader<R>) -> Scene {
    let mut scene = Scene::default();
    let start = reader.position();

    if let Err(err) = read_header(reader, &mut scene) {
        tracing::warn!("XBF header unreadable: {}", err);
        scene.unparsed_tail = rewind_and_take_rest(reader, start);
        scene.header_unparsed = scene.unparsed_tail.is_some();
        scene.error = Some(err);
        return scene;
    }
    tracing::debug!(
        "XBF version {}: {} aux bytes, {} texture table bytes",
        scene.version,
        scene.aux_data.len(),
        scene.texture_name_data.len()
    );

    loop {
        let node_start = reader.position();
        match read_node(reader, &mut scene.nodes, None) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if !reader.is_at_end() {
                    let err = Error::TrailingData {
                        offset: node_start,
                        len: reader.remaining(),
                    };
                    tracing::warn!("{}", err);
                    scene.unparsed_tail = rewind_and_take_rest(reader, node_start);
                    scene.error = Some(err);
                }
                break;
            }
            Err(err) => {
                tracing::warn!(
                    "Node decode failed at offset {}: {}; keeping {} unparsed bytes",
                    node_start,
                    err,
                    reader.stream_len().saturating_sub(node_start)
                );
                scene.unparsed_tail = rewind_and_take_rest(reader, node_start);
                scene.error = Some(err);
                break;
            }
        }
    }

    tracing::debug!(
        "Decoded {} root nodes ({} total)",
        scene.nodes.roots().len(),
        scene.nodes.len()
    );
    scene
}

fn read_header<R: Read + Seek>(reader: &mut XbfReader<R>, scene: &mut Scene) -> Result<()> {
    scene.version = reader.read_i32()?;
    let aux_size = reader.read_i32()?;
    scene.aux_data = reader.read_bytes(super::stream::checked_count(aux_size, "aux size")?)?;
    let texture_size = reader.read_i32()?;
    scene.texture_name_data =
        reader.read_bytes(super::stream::checked_count(texture_size, "texture table size")?)?;
    Ok(())
}

fn rewind_and_take_rest<R: Read + Seek>(reader: &mut XbfReader<R>, offset: u64) -> Option<Vec<u8>> {
    let rest = reader.seek_to(offset).and_then(|()| reader.read_to_end());
    match rest {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::warn!("Could not read unparsed tail at offset {}: {}", offset, err);
            None
        }
    }
}
