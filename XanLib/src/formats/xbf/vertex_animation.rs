//! Per-vertex geometry animation
//!
//! Layout:
//! ```text
//! [frameCount:i32][count:i32][actual:i32][keys: actual × u32]
//! count < 0 only:
//!   [scale:u32][baseCount:u32 == -count]
//!   [actual × (baseCount / actual) CompressedVertex]
//!   [frameCount × u32 interpolation data]   -- only if scale bit 31 is set
//! ```

use super::primitives::CompressedVertex;
use super::stream::{XbfReader, checked_count, wire_count};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Cursor, Read, Seek, Write};

/// Bit of the scale word that marks trailing interpolation data.
pub const INTERPOLATED_BIT: u32 = 0x8000_0000;

/// Vertex animation block attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAnimation {
    pub frame_count: i32,
    /// Channel index for each frame; its length is the `actual` field.
    pub keys: Vec<u32>,
    pub body: VertexAnimationBody,
}

/// Variant selected by the sign of the `count` field.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexAnimationBody {
    /// `count >= 0`: nothing follows the key table.
    Uncompressed { count: i32 },
    /// `count < 0`: quantized vertex frames follow.
    Compressed(CompressedFrames),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedFrames {
    /// Scale word as read. Bit 31 is recomputed from `interpolation_data` on write.
    pub scale: u32,
    /// One group per key, each holding `real_count` vertices.
    pub frames: Vec<Vec<CompressedVertex>>,
    /// Present when the scale word has bit 31 set; `frame_count` entries.
    pub interpolation_data: Option<Vec<u32>>,
}

impl CompressedFrames {
    /// Vertices per group. Every group must share it.
    pub fn real_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    /// Total number of stored vertices (`baseCount` on disk).
    pub fn base_count(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolation_data.is_some()
    }
}

impl VertexAnimation {
    /// The `actual` field: number of keys.
    pub fn actual(&self) -> usize {
        self.keys.len()
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.body, VertexAnimationBody::Compressed(_))
    }

    /// The `count` field as it is written: stored for uncompressed blocks,
    /// `-baseCount` for compressed ones.
    pub fn count(&self) -> i64 {
        match &self.body {
            VertexAnimationBody::Uncompressed { count } => i64::from(*count),
            VertexAnimationBody::Compressed(c) => -(c.base_count() as i64),
        }
    }

    pub fn compressed(&self) -> Option<&CompressedFrames> {
        match &self.body {
            VertexAnimationBody::Compressed(c) => Some(c),
            VertexAnimationBody::Uncompressed { .. } => None,
        }
    }

    /// Decode from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = XbfReader::new(Cursor::new(data))?;
        Self::read(&mut reader)
    }

    pub(crate) fn read<R: Read + Seek>(reader: &mut XbfReader<R>) -> Result<Self> {
        let frame_count = reader.read_i32()?;
        let count = reader.read_i32()?;
        let actual = checked_count(reader.read_i32()?, "vertex animation key count")?;
        let keys = reader.read_u32_list(actual)?;

        if count >= 0 {
            return Ok(Self {
                frame_count,
                keys,
                body: VertexAnimationBody::Uncompressed { count },
            });
        }

        let scale = reader.read_u32()?;
        let base_count = reader.read_u32()?;
        if base_count != count.unsigned_abs() {
            return Err(Error::mismatch(format!(
                "vertex animation base count {base_count} does not match count {count}"
            )));
        }
        let base_count = base_count as usize;
        if actual == 0 || base_count % actual != 0 {
            return Err(Error::mismatch(format!(
                "vertex animation base count {base_count} is not a multiple of {actual} keys"
            )));
        }
        let real_count = base_count / actual;

        let flat = reader.read_records(base_count, CompressedVertex::from_record)?;
        let frames = flat.chunks(real_count).map(<[_]>::to_vec).collect();

        let interpolation_data = if scale & INTERPOLATED_BIT != 0 {
            let n = checked_count(frame_count, "vertex animation frame count")?;
            Some(reader.read_u32_list(n)?)
        } else {
            None
        };

        Ok(Self {
            frame_count,
            keys,
            body: VertexAnimationBody::Compressed(CompressedFrames {
                scale,
                frames,
                interpolation_data,
            }),
        })
    }

    /// Encode to a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let actual = wire_count(self.keys.len(), "vertex animation key count")?;

        match &self.body {
            VertexAnimationBody::Uncompressed { count } => {
                if *count < 0 {
                    return Err(Error::mismatch(format!(
                        "uncompressed vertex animation with negative count {count}"
                    )));
                }
                writer.write_i32::<LittleEndian>(self.frame_count)?;
                writer.write_i32::<LittleEndian>(*count)?;
                writer.write_i32::<LittleEndian>(actual)?;
                write_u32s(writer, &self.keys)?;
            }
            VertexAnimationBody::Compressed(c) => {
                let base_count = self.validate_compressed(c)?;
                let scale = if c.is_interpolated() {
                    c.scale | INTERPOLATED_BIT
                } else {
                    c.scale & !INTERPOLATED_BIT
                };

                writer.write_i32::<LittleEndian>(self.frame_count)?;
                writer.write_i32::<LittleEndian>(-base_count)?;
                writer.write_i32::<LittleEndian>(actual)?;
                write_u32s(writer, &self.keys)?;
                writer.write_u32::<LittleEndian>(scale)?;
                writer.write_u32::<LittleEndian>(base_count as u32)?;
                for vertex in c.frames.iter().flatten() {
                    vertex.write(writer)?;
                }
                if let Some(data) = &c.interpolation_data {
                    write_u32s(writer, data)?;
                }
            }
        }
        Ok(())
    }

    /// Check the grid shape and return the `baseCount` to write.
    fn validate_compressed(&self, c: &CompressedFrames) -> Result<i32> {
        if c.frames.len() != self.keys.len() {
            return Err(Error::mismatch(format!(
                "vertex animation has {} frame groups for {} keys",
                c.frames.len(),
                self.keys.len()
            )));
        }
        let real_count = c.real_count();
        if let Some(bad) = c.frames.iter().position(|g| g.len() != real_count) {
            return Err(Error::mismatch(format!(
                "vertex animation group {bad} has {} vertices, expected {real_count}",
                c.frames[bad].len()
            )));
        }
        let base_count = wire_count(c.base_count(), "vertex animation base count")?;
        if base_count == 0 {
            return Err(Error::mismatch(
                "compressed vertex animation must hold at least one vertex",
            ));
        }
        if let Some(data) = &c.interpolation_data {
            if i64::try_from(data.len()).ok() != Some(i64::from(self.frame_count)) {
                return Err(Error::mismatch(format!(
                    "vertex animation has {} interpolation entries for {} frames",
                    data.len(),
                    self.frame_count
                )));
            }
        }
        Ok(base_count)
    }
}

fn write_u32s<W: Write>(writer: &mut W, values: &[u32]) -> Result<()> {
    for &v in values {
        writer.write_u32::<LittleEndian>(v)?;
    }
    Ok(())
}
