//! Fixed-size XBF records: vertices, faces and compressed animation vertices

use super::stream::read_f32_array;
use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

fn truncated(needed: usize, available: usize) -> Error {
    Error::TruncatedInput {
        offset: 0,
        needed: needed as u64,
        available: available as u64,
    }
}

const VERTEX_SIZE: usize = 24;
const FACE_SIZE: usize = 44;
const COMPRESSED_VERTEX_SIZE: usize = 8;

fn record<const N: usize>(buffer: &[u8]) -> Result<&[u8; N]> {
    buffer
        .get(..N)
        .and_then(|b| <&[u8; N]>::try_from(b).ok())
        .ok_or_else(|| truncated(N, buffer.len()))
}

/// Mesh vertex: position and normal, 24 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const SIZE: usize = VERTEX_SIZE;

    /// Decode a vertex from the first [`Vertex::SIZE`] bytes of `buffer`.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        Ok(Self::from_record(record::<VERTEX_SIZE>(buffer)?))
    }

    pub(crate) fn from_record(bytes: &[u8; VERTEX_SIZE]) -> Self {
        Self {
            position: read_f32_array::<3>(&bytes[0..12]),
            normal: read_f32_array::<3>(&bytes[12..24]),
        }
    }

    pub fn to_bytes(&self) -> [u8; VERTEX_SIZE] {
        let mut out = [0u8; VERTEX_SIZE];
        LittleEndian::write_f32_into(&self.position, &mut out[0..12]);
        LittleEndian::write_f32_into(&self.normal, &mut out[12..24]);
        out
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Triangle face, 44 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Face {
    pub vertex_indices: [i32; 3],
    pub texture_index: i32,
    pub flags: i32,
    pub uv_coords: [[f32; 2]; 3],
}

impl Face {
    pub const SIZE: usize = FACE_SIZE;

    /// Decode a face from the first [`Face::SIZE`] bytes of `buffer`.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        Ok(Self::from_record(record::<FACE_SIZE>(buffer)?))
    }

    pub(crate) fn from_record(bytes: &[u8; FACE_SIZE]) -> Self {
        let mut indices = [0i32; 5];
        LittleEndian::read_i32_into(&bytes[0..20], &mut indices);
        Self {
            vertex_indices: [indices[0], indices[1], indices[2]],
            texture_index: indices[3],
            flags: indices[4],
            uv_coords: [
                read_f32_array::<2>(&bytes[20..28]),
                read_f32_array::<2>(&bytes[28..36]),
                read_f32_array::<2>(&bytes[36..44]),
            ],
        }
    }

    pub fn to_bytes(&self) -> [u8; FACE_SIZE] {
        let mut out = [0u8; FACE_SIZE];
        LittleEndian::write_i32_into(&self.vertex_indices, &mut out[0..12]);
        LittleEndian::write_i32(&mut out[12..16], self.texture_index);
        LittleEndian::write_i32(&mut out[16..20], self.flags);
        for (i, uv) in self.uv_coords.iter().enumerate() {
            let start = 20 + i * 8;
            LittleEndian::write_f32_into(uv, &mut out[start..start + 8]);
        }
        out
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Decode one signed 5-bit normal component.
///
/// Values above 15 are negative with magnitude `v % 16`, so both 0 and 16
/// decode to zero.
pub fn decode_signed_5bit(v: u16) -> i8 {
    let v = v % 32;
    let magnitude = (v % 16) as i8;
    if v > 15 { -magnitude } else { magnitude }
}

/// Encode one normal component as signed 5-bit, clamping to `[-15, 15]`.
///
/// Lossy outside that range.
pub fn encode_signed_5bit(v: i32) -> u16 {
    let clamped = v.clamp(-15, 15);
    if clamped < 0 {
        (16 - clamped) as u16
    } else {
        clamped as u16
    }
}

const NORMAL_SHIFTS: [u16; 3] = [0, 5, 10];
const NORMAL_FLAG_BIT: u16 = 1 << 15;

/// Quantized animation vertex, 8 bytes on disk.
///
/// `normal_packed` holds three signed 5-bit components in bits 0-4, 5-9 and
/// 10-14, plus a flag in bit 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressedVertex {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub normal_packed: u16,
}

impl CompressedVertex {
    pub const SIZE: usize = COMPRESSED_VERTEX_SIZE;

    /// Decode a compressed vertex from the first [`CompressedVertex::SIZE`] bytes of `buffer`.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        Ok(Self::from_record(record::<COMPRESSED_VERTEX_SIZE>(buffer)?))
    }

    pub(crate) fn from_record(bytes: &[u8; COMPRESSED_VERTEX_SIZE]) -> Self {
        Self {
            x: LittleEndian::read_i16(&bytes[0..2]),
            y: LittleEndian::read_i16(&bytes[2..4]),
            z: LittleEndian::read_i16(&bytes[4..6]),
            normal_packed: LittleEndian::read_u16(&bytes[6..8]),
        }
    }

    pub fn to_bytes(&self) -> [u8; COMPRESSED_VERTEX_SIZE] {
        let mut out = [0u8; COMPRESSED_VERTEX_SIZE];
        LittleEndian::write_i16(&mut out[0..2], self.x);
        LittleEndian::write_i16(&mut out[2..4], self.y);
        LittleEndian::write_i16(&mut out[4..6], self.z);
        LittleEndian::write_u16(&mut out[6..8], self.normal_packed);
        out
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<LittleEndian>(self.x)?;
        writer.write_i16::<LittleEndian>(self.y)?;
        writer.write_i16::<LittleEndian>(self.z)?;
        writer.write_u16::<LittleEndian>(self.normal_packed)?;
        Ok(())
    }

    pub fn position(&self) -> [f32; 3] {
        [f32::from(self.x), f32::from(self.y), f32::from(self.z)]
    }

    /// Unpacked normal components, each in `[-15, 15]`.
    pub fn normal(&self) -> [i8; 3] {
        NORMAL_SHIFTS.map(|shift| decode_signed_5bit((self.normal_packed >> shift) & 0x1F))
    }

    /// The extra bit stored above the packed normal.
    pub fn flag(&self) -> bool {
        self.normal_packed & NORMAL_FLAG_BIT != 0
    }

    pub fn to_vertex(&self) -> Vertex {
        Vertex {
            position: self.position(),
            normal: self.normal().map(f32::from),
        }
    }

    /// Quantize a vertex. Positions are rounded into `i16`, normal components
    /// are rounded and clamped to `[-15, 15]`, the flag bit is left clear.
    ///
    /// Does not round-trip with [`to_vertex`](Self::to_vertex) in general.
    pub fn from_vertex(vertex: &Vertex) -> Self {
        let [x, y, z] = vertex.position.map(|p| {
            p.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        });
        let normal_packed = vertex
            .normal
            .iter()
            .zip(NORMAL_SHIFTS)
            .map(|(&n, shift)| (encode_signed_5bit(n.round() as i32) & 0x1F) << shift)
            .sum();
        Self { x, y, z, normal_packed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_bytes() -> Vec<u8> {
        [1.0f32, 2.0, 3.0, 0.0, 1.0, 0.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_vertex_decode_encode() {
        let bytes = vertex_bytes();
        let vertex = Vertex::from_bytes(&bytes).unwrap();
        assert_eq!(vertex.position, [1.0, 2.0, 3.0]);
        assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        assert_eq!(vertex.to_bytes().as_slice(), bytes.as_slice());
    }

    #[test]
    fn test_vertex_short_buffer() {
        let bytes = vertex_bytes();
        let err = Vertex::from_bytes(&bytes[..23]).unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedInput {
                offset: 0,
                needed: 24,
                available: 23
            }
        );
    }

    #[test]
    fn test_face_layout() {
        let mut bytes = Vec::new();
        for v in [0i32, 1, 2, 7, -1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0.0f32, 0.5, 1.0, 0.25, 0.75, 1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(bytes.len(), Face::SIZE);

        let face = Face::from_bytes(&bytes).unwrap();
        assert_eq!(face.vertex_indices, [0, 1, 2]);
        assert_eq!(face.texture_index, 7);
        assert_eq!(face.flags, -1);
        assert_eq!(face.uv_coords, [[0.0, 0.5], [1.0, 0.25], [0.75, 1.0]]);

        let mut written = Vec::new();
        face.write(&mut written).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn test_face_short_buffer() {
        assert!(matches!(
            Face::from_bytes(&[0u8; 43]),
            Err(Error::TruncatedInput { needed: 44, .. })
        ));
    }

    #[test]
    fn test_decode_signed_5bit() {
        assert_eq!(decode_signed_5bit(0), 0);
        assert_eq!(decode_signed_5bit(1), 1);
        assert_eq!(decode_signed_5bit(15), 15);
        assert_eq!(decode_signed_5bit(16), 0);
        assert_eq!(decode_signed_5bit(17), -1);
        assert_eq!(decode_signed_5bit(31), -15);
    }

    #[test]
    fn test_signed_5bit_exact_in_range() {
        for v in -15..=15 {
            assert_eq!(i32::from(decode_signed_5bit(encode_signed_5bit(v))), v);
        }
    }

    #[test]
    fn test_negative_5bit_sets_sign_bit() {
        assert_eq!(encode_signed_5bit(-1), 17);
        assert_eq!(encode_signed_5bit(-3), 19);
        assert_eq!(encode_signed_5bit(-15), 31);
        for v in -15..=-1 {
            assert_eq!(i32::from(decode_signed_5bit(encode_signed_5bit(v))), v);
        }
    }

    #[test]
    fn test_signed_5bit_clamps_out_of_range() {
        // Lossy: values outside [-15, 15] come back clamped, not equal
        assert_eq!(decode_signed_5bit(encode_signed_5bit(16)), 15);
        assert_eq!(decode_signed_5bit(encode_signed_5bit(100)), 15);
        assert_eq!(decode_signed_5bit(encode_signed_5bit(-16)), -15);
        assert_eq!(decode_signed_5bit(encode_signed_5bit(i32::MIN)), -15);
        assert_ne!(i32::from(decode_signed_5bit(encode_signed_5bit(20))), 20);
    }

    #[test]
    fn test_compressed_vertex_unpack() {
        // normal (1, -1, 15) with flag set
        let packed = 1 | (17 << 5) | (15 << 10) | (1 << 15);
        let mut bytes = Vec::new();
        for v in [10i16, -20, 30] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&(packed as u16).to_le_bytes());

        let cv = CompressedVertex::from_bytes(&bytes).unwrap();
        assert_eq!(cv.position(), [10.0, -20.0, 30.0]);
        assert_eq!(cv.normal(), [1, -1, 15]);
        assert!(cv.flag());
        assert_eq!(cv.to_bytes().as_slice(), bytes.as_slice());

        let vertex = cv.to_vertex();
        assert_eq!(vertex.normal, [1.0, -1.0, 15.0]);
    }

    #[test]
    fn test_compressed_vertex_from_vertex_is_lossy() {
        let vertex = Vertex {
            position: [1.4, -2.6, 40000.0],
            normal: [0.2, -3.0, 22.0],
        };
        let cv = CompressedVertex::from_vertex(&vertex);
        assert_eq!((cv.x, cv.y, cv.z), (1, -3, i16::MAX));
        assert_eq!(cv.normal(), [0, -3, 15]);
        assert!(!cv.flag());
        assert_ne!(cv.to_vertex(), vertex);
    }
}
