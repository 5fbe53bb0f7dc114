//! Little-endian primitives shared by the encoders and readers

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Vec2, Vec3};
use std::io::{self, Read, Write};

/// Write helpers on top of [`WriteBytesExt`].
pub trait WriteFormatExt: Write {
    /// `u8` length followed by the UTF-8 bytes.
    fn write_string8(&mut self, value: &str) -> io::Result<()> {
        let len = u8::try_from(value.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("name longer than 255 bytes: '{}'", value),
            )
        })?;
        self.write_u8(len)?;
        self.write_all(value.as_bytes())
    }

    fn write_vec3(&mut self, value: Vec3) -> io::Result<()> {
        self.write_f32::<LittleEndian>(value.x)?;
        self.write_f32::<LittleEndian>(value.y)?;
        self.write_f32::<LittleEndian>(value.z)
    }

    /// Texture coordinate with the V axis flipped.
    fn write_texel(&mut self, uv: Vec2) -> io::Result<()> {
        self.write_f32::<LittleEndian>(uv.x)?;
        self.write_f32::<LittleEndian>(1.0 - uv.y)
    }

    /// Index or count that is 16 bits wide, or 32 bits in large models.
    fn write_index(&mut self, value: usize, large: bool) -> io::Result<()> {
        if large {
            let value = u32::try_from(value)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "index exceeds u32"))?;
            self.write_u32::<LittleEndian>(value)
        } else {
            self.write_u16_checked(value)
        }
    }

    fn write_u16_checked(&mut self, value: usize) -> io::Result<()> {
        let value = u16::try_from(value).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("value {} does not fit 16 bits", value),
            )
        })?;
        self.write_u16::<LittleEndian>(value)
    }
}

impl<W: Write + ?Sized> WriteFormatExt for W {}

/// Read helpers on top of [`ReadBytesExt`].
pub trait ReadFormatExt: Read {
    fn read_string8(&mut self) -> io::Result<String> {
        let len = self.read_u8()? as usize;
        let mut bytes = vec![0u8; len];
        self.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_vec3(&mut self) -> io::Result<Vec3> {
        let x = self.read_f32::<LittleEndian>()?;
        let y = self.read_f32::<LittleEndian>()?;
        let z = self.read_f32::<LittleEndian>()?;
        Ok(Vec3::new(x, y, z))
    }
}

impl<R: Read + ?Sized> ReadFormatExt for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string8_layout() {
        let mut buffer = Vec::new();
        buffer.write_string8("root").unwrap();
        assert_eq!(buffer, b"\x04root");

        let mut cursor = Cursor::new(buffer);
        assert_eq!(cursor.read_string8().unwrap(), "root");
    }

    #[test]
    fn test_string8_too_long() {
        let mut buffer = Vec::new();
        let name = "x".repeat(256);
        assert!(buffer.write_string8(&name).is_err());
    }

    #[test]
    fn test_texel_flips_v() {
        let mut buffer = Vec::new();
        buffer.write_texel(Vec2::new(0.25, 0.25)).unwrap();
        let mut cursor = Cursor::new(buffer);
        assert_eq!(cursor.read_f32::<LittleEndian>().unwrap(), 0.25);
        assert_eq!(cursor.read_f32::<LittleEndian>().unwrap(), 0.75);
    }

    #[test]
    fn test_index_width() {
        let mut small = Vec::new();
        small.write_index(7, false).unwrap();
        assert_eq!(small, [7, 0]);

        let mut large = Vec::new();
        large.write_index(70000, true).unwrap();
        assert_eq!(large, 70000u32.to_le_bytes());

        let mut overflow = Vec::new();
        assert!(overflow.write_index(70000, false).is_err());
    }
}
