//! Per-node keyframe transform animation
//!
//! The second header word selects the layout:
//!
//! | flags | body |
//! |---|---|
//! | -1 | `frameCount + 1` 4×4 `f32` matrices |
//! | -2 | `frameCount + 1` 3×4 `f32` matrices |
//! | -3 | `actual:i32`, `frameCount + 1` × `i16`, `actual` 3×4 matrices |
//! | >= 0 | `flags` keyed frames |

use super::stream::{XbfReader, checked_count, wire_count};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Quat, Vec3};
use std::io::{Cursor, Read, Seek, Write};

const FORMAT_MATRIX16: i32 = -1;
const FORMAT_MATRIX12: i32 = -2;
const FORMAT_MATRIX12_EXTRA: i32 = -3;

const HAS_ROTATION: i16 = 1 << 12;
const HAS_SCALE: i16 = 1 << 13;
const HAS_TRANSLATION: i16 = 1 << 14;
const PRESENCE_MASK: i16 = HAS_ROTATION | HAS_SCALE | HAS_TRANSLATION;

pub type Matrix16 = [f32; 16];
pub type Matrix12 = [f32; 12];

/// Key animation block attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAnimation {
    pub frame_count: i32,
    pub data: KeyAnimationData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyAnimationData {
    /// `flags == -1`: one dense 4×4 matrix per frame.
    Matrix16(Vec<Matrix16>),
    /// `flags == -2`: one dense 3×4 matrix per frame.
    Matrix12(Vec<Matrix12>),
    /// `flags == -3`: a per-frame `i16` table followed by a separate matrix list.
    Matrix12WithExtra {
        extra_data: Vec<i16>,
        matrices: Vec<Matrix12>,
    },
    /// `flags >= 0`: sparse keyframes.
    Keyed(Vec<KeyFrame>),
}

/// One sparse keyframe. Presence bits on disk are derived from which
/// components are set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyFrame {
    pub frame_id: i16,
    /// Quaternion in on-disk order: `w, x, y, z`.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub translation: Option<[f32; 3]>,
}

impl KeyFrame {
    /// Presence word as written to disk.
    pub fn presence_flags(&self) -> i16 {
        let mut flags = 0;
        if self.rotation.is_some() {
            flags |= HAS_ROTATION;
        }
        if self.scale.is_some() {
            flags |= HAS_SCALE;
        }
        if self.translation.is_some() {
            flags |= HAS_TRANSLATION;
        }
        flags
    }

    pub fn rotation_quat(&self) -> Option<Quat> {
        self.rotation.map(|[w, x, y, z]| Quat::from_xyzw(x, y, z, w))
    }

    pub fn scale_vec(&self) -> Option<Vec3> {
        self.scale.map(Vec3::from_array)
    }

    pub fn translation_vec(&self) -> Option<Vec3> {
        self.translation.map(Vec3::from_array)
    }
}

impl KeyAnimation {
    /// The discriminant written after `frame_count`.
    pub fn flags(&self) -> Result<i32> {
        Ok(match &self.data {
            KeyAnimationData::Matrix16(_) => FORMAT_MATRIX16,
            KeyAnimationData::Matrix12(_) => FORMAT_MATRIX12,
            KeyAnimationData::Matrix12WithExtra { .. } => FORMAT_MATRIX12_EXTRA,
            KeyAnimationData::Keyed(frames) => wire_count(frames.len(), "key frame count")?,
        })
    }

    /// Number of dense rows (`frame_count + 1`) the matrix layouts store.
    fn dense_rows(frame_count: i32) -> Result<usize> {
        checked_count(
            frame_count.checked_add(1).unwrap_or(-1),
            "key animation frame count + 1",
        )
    }

    /// Decode from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = XbfReader::new(Cursor::new(data))?;
        Self::read(&mut reader)
    }

    pub(crate) fn read<R: Read + Seek>(reader: &mut XbfReader<R>) -> Result<Self> {
        let frame_count = reader.read_i32()?;
        let flags = reader.read_i32()?;

        let data = match flags {
            FORMAT_MATRIX16 => {
                KeyAnimationData::Matrix16(reader.read_f32_arrays(Self::dense_rows(frame_count)?)?)
            }
            FORMAT_MATRIX12 => {
                KeyAnimationData::Matrix12(reader.read_f32_arrays(Self::dense_rows(frame_count)?)?)
            }
            FORMAT_MATRIX12_EXTRA => {
                let actual = checked_count(reader.read_i32()?, "key animation matrix count")?;
                let extra_data = reader.read_i16_list(Self::dense_rows(frame_count)?)?;
                let matrices = reader.read_f32_arrays(actual)?;
                KeyAnimationData::Matrix12WithExtra {
                    extra_data,
                    matrices,
                }
            }
            n if n >= 0 => {
                let mut frames = Vec::new();
                for _ in 0..n {
                    frames.push(read_key_frame(reader)?);
                }
                KeyAnimationData::Keyed(frames)
            }
            other => {
                return Err(Error::UnknownDiscriminant {
                    field: "key animation format",
                    value: i64::from(other),
                });
            }
        };

        Ok(Self { frame_count, data })
    }

    /// Encode to a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.validate()?;
        writer.write_i32::<LittleEndian>(self.frame_count)?;
        writer.write_i32::<LittleEndian>(self.flags()?)?;

        match &self.data {
            KeyAnimationData::Matrix16(matrices) => write_matrices(writer, matrices)?,
            KeyAnimationData::Matrix12(matrices) => write_matrices(writer, matrices)?,
            KeyAnimationData::Matrix12WithExtra {
                extra_data,
                matrices,
            } => {
                writer.write_i32::<LittleEndian>(wire_count(
                    matrices.len(),
                    "key animation matrix count",
                )?)?;
                for &v in extra_data {
                    writer.write_i16::<LittleEndian>(v)?;
                }
                write_matrices(writer, matrices)?;
            }
            KeyAnimationData::Keyed(frames) => {
                for frame in frames {
                    write_key_frame(writer, frame)?;
                }
            }
        }
        Ok(())
    }

    /// Check the dense layouts hold exactly `frame_count + 1` rows.
    fn validate(&self) -> Result<()> {
        let (what, len) = match &self.data {
            KeyAnimationData::Matrix16(m) => ("4x4 matrices", m.len()),
            KeyAnimationData::Matrix12(m) => ("3x4 matrices", m.len()),
            KeyAnimationData::Matrix12WithExtra { extra_data, .. } => {
                ("extra data entries", extra_data.len())
            }
            KeyAnimationData::Keyed(_) => return Ok(()),
        };
        let expected = i64::from(self.frame_count) + 1;
        if i64::try_from(len).ok() != Some(expected) {
            return Err(Error::mismatch(format!(
                "key animation has {len} {what}, expected {expected}"
            )));
        }
        Ok(())
    }
}

fn read_key_frame<R: Read + Seek>(reader: &mut XbfReader<R>) -> Result<KeyFrame> {
    let frame_id = reader.read_i16()?;
    let presence = reader.read_i16()?;
    if presence & !PRESENCE_MASK != 0 {
        return Err(Error::mismatch(format!(
            "unexpected key frame presence bits {:#06x}",
            presence as u16
        )));
    }

    let rotation = if presence & HAS_ROTATION != 0 {
        Some(read_floats::<_, 4>(reader)?)
    } else {
        None
    };
    let scale = if presence & HAS_SCALE != 0 {
        Some(read_floats::<_, 3>(reader)?)
    } else {
        None
    };
    let translation = if presence & HAS_TRANSLATION != 0 {
        Some(read_floats::<_, 3>(reader)?)
    } else {
        None
    };

    Ok(KeyFrame {
        frame_id,
        rotation,
        scale,
        translation,
    })
}

fn read_floats<R: Read + Seek, const M: usize>(reader: &mut XbfReader<R>) -> Result<[f32; M]> {
    let mut rows = reader.read_f32_arrays::<M>(1)?;
    rows.pop()
        .ok_or_else(|| Error::mismatch("empty float read"))
}

fn write_key_frame<W: Write>(writer: &mut W, frame: &KeyFrame) -> Result<()> {
    writer.write_i16::<LittleEndian>(frame.frame_id)?;
    writer.write_i16::<LittleEndian>(frame.presence_flags())?;
    if let Some(rotation) = &frame.rotation {
        write_floats(writer, rotation)?;
    }
    if let Some(scale) = &frame.scale {
        write_floats(writer, scale)?;
    }
    if let Some(translation) = &frame.translation {
        write_floats(writer, translation)?;
    }
    Ok(())
}

fn write_matrices<W: Write, const M: usize>(writer: &mut W, matrices: &[[f32; M]]) -> Result<()> {
    for matrix in matrices {
        write_floats(writer, matrix)?;
    }
    Ok(())
}

fn write_floats<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    for &v in values {
        writer.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(frame_count: i32, flags: i32) -> Vec<u8> {
        let mut out = frame_count.to_le_bytes().to_vec();
        out.extend_from_slice(&flags.to_le_bytes());
        out
    }

    fn floats(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
        values.into_iter().flat_map(f32::to_le_bytes).collect()
    }

    #[test]
    fn test_matrix16_rows() {
        let mut bytes = header(2, -1);
        bytes.extend(floats((0..48).map(|i| i as f32)));

        let anim = KeyAnimation::from_bytes(&bytes).unwrap();
        match &anim.data {
            KeyAnimationData::Matrix16(m) => {
                assert_eq!(m.len(), 3);
                assert_eq!(m[2][15], 47.0);
            }
            other => panic!("unexpected layout {other:?}"),
        }
        assert_eq!(anim.flags().unwrap(), -1);
        assert_eq!(anim.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_matrix12_rows() {
        let mut bytes = header(0, -2);
        bytes.extend(floats((0..12).map(|i| i as f32 * 0.5)));

        let anim = KeyAnimation::from_bytes(&bytes).unwrap();
        assert!(matches!(&anim.data, KeyAnimationData::Matrix12(m) if m.len() == 1));
        assert_eq!(anim.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_matrix12_with_extra() {
        let mut bytes = header(1, -3);
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&5i16.to_le_bytes());
        bytes.extend_from_slice(&(-6i16).to_le_bytes());
        bytes.extend(floats((0..36).map(|i| i as f32)));

        let anim = KeyAnimation::from_bytes(&bytes).unwrap();
        match &anim.data {
            KeyAnimationData::Matrix12WithExtra { extra_data, matrices } => {
                assert_eq!(extra_data, &vec![5, -6]);
                assert_eq!(matrices.len(), 3);
            }
            other => panic!("unexpected layout {other:?}"),
        }
        assert_eq!(anim.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_keyed_frames() {
        let mut bytes = header(10, 2);
        // frame 0: rotation + translation
        bytes.extend_from_slice(&0i16.to_le_bytes());
        bytes.extend_from_slice(&(HAS_ROTATION | HAS_TRANSLATION).to_le_bytes());
        bytes.extend(floats([1.0, 0.0, 0.0, 0.0]));
        bytes.extend(floats([4.0, 5.0, 6.0]));
        // frame 7: scale only
        bytes.extend_from_slice(&7i16.to_le_bytes());
        bytes.extend_from_slice(&HAS_SCALE.to_le_bytes());
        bytes.extend(floats([2.0, 2.0, 2.0]));

        let anim = KeyAnimation::from_bytes(&bytes).unwrap();
        let KeyAnimationData::Keyed(frames) = &anim.data else {
            panic!("expected keyed frames");
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].rotation, Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(frames[0].rotation_quat(), Some(Quat::IDENTITY));
        assert_eq!(frames[0].scale, None);
        assert_eq!(frames[0].translation_vec(), Some(Vec3::new(4.0, 5.0, 6.0)));
        assert_eq!(frames[1].frame_id, 7);
        assert_eq!(frames[1].presence_flags(), HAS_SCALE);
        assert_eq!(anim.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_keyed_presence_bits_derived_on_write() {
        let anim = KeyAnimation {
            frame_count: 0,
            data: KeyAnimationData::Keyed(vec![KeyFrame {
                frame_id: 3,
                rotation: None,
                scale: Some([1.0, 1.0, 1.0]),
                translation: Some([0.0, 0.0, 1.0]),
            }]),
        };
        let bytes = anim.to_bytes().unwrap();
        assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
        assert_eq!(&bytes[10..12], &(HAS_SCALE | HAS_TRANSLATION).to_le_bytes());
        assert_eq!(bytes.len(), 8 + 4 + 24);
    }

    #[test]
    fn test_unexpected_presence_bit() {
        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&0i16.to_le_bytes());
        bytes.extend_from_slice(&0x0001i16.to_le_bytes());
        let err = KeyAnimation::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::StructuralMismatch { .. }));

        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&0i16.to_le_bytes());
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        assert!(KeyAnimation::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_unknown_discriminant() {
        let err = KeyAnimation::from_bytes(&header(0, -4)).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownDiscriminant {
                field: "key animation format",
                value: -4
            }
        );
    }

    #[test]
    fn test_dense_row_count_checked_on_write() {
        let anim = KeyAnimation {
            frame_count: 3,
            data: KeyAnimationData::Matrix12(vec![[0.0; 12]; 2]),
        };
        assert!(matches!(anim.to_bytes(), Err(Error::StructuralMismatch { .. })));
    }

    #[test]
    fn test_negative_frame_count_dense() {
        // frame_count -1 means zero dense rows
        let bytes = header(-1, -1);
        let anim = KeyAnimation::from_bytes(&bytes).unwrap();
        assert_eq!(anim.data, KeyAnimationData::Matrix16(Vec::new()));
        assert_eq!(anim.to_bytes().unwrap(), bytes);

        assert!(KeyAnimation::from_bytes(&header(-2, -1)).is_err());
    }
}
