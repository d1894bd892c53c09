use std::fmt::Debug;

pub mod md5;

/// A collision resistant digest used to confirm that a block with a matching weak checksum
/// really is the same block.
pub trait StrongHash {
    type HashType: PartialEq + Debug + Copy;

    fn hash(data: &[u8]) -> Self::HashType;
}
