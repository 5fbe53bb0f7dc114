//! Binary serialization trait for format headers.
//!
//! Each header keeps its type-specific `to_bytes()` returning a fixed-size array; the
//! trait gives the file readers one entry point.

use std::io::{self, Read};

/// Trait for binary-serializable format headers.
pub trait BinarySerializable: Sized {
    /// Size of the serialized header in bytes.
    const SIZE: usize;

    /// Serialize to bytes.
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize from bytes.
    ///
    /// Returns `None` if the byte slice is too short or the signature does not match.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

/// Read a header from a stream, returning it together with its raw bytes.
pub fn read_header<H: BinarySerializable, R: Read>(reader: &mut R) -> io::Result<(H, Vec<u8>)> {
    let mut bytes = vec![0u8; H::SIZE];
    reader.read_exact(&mut bytes)?;
    let header = H::deserialize(&bytes)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid file signature"))?;
    Ok((header, bytes))
}

macro_rules! impl_binary_serializable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BinarySerializable for $ty {
                const SIZE: usize = <$ty>::SIZE;

                fn serialize(&self) -> Vec<u8> {
                    self.to_bytes().to_vec()
                }

                fn deserialize(bytes: &[u8]) -> Option<Self> {
                    Self::from_bytes(bytes)
                }
            }
        )*
    };
}

impl_binary_serializable!(
    super::ModelHeader,
    super::AnimationHeader,
    super::OcclusionMeshHeader,
    super::NavSpaceHeader,
);
