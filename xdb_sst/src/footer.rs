//! Table footer
//! 表尾部
//!
//! Fixed-size footer at end of table file.
//! 表文件末尾的固定大小尾部。

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Footer size in bytes (32 bytes)
/// 尾部大小（32字节）
pub const FOOTER_SIZE: usize = 32;

/// Table file magic number
/// 表文件魔数
pub const TABLE_MAGIC: u32 = 0x5844_4254; // "XDBT"

/// Footer builder
/// 尾部构建器
pub struct FooterBuilder {
  pub index_offset: u64,
  pub index_size: u32,
  pub meta_offset: u64,
  pub meta_size: u32,
  pub checksum: u32,
}

impl FooterBuilder {
  #[inline]
  pub fn build(self) -> Footer {
    Footer {
      index_offset: self.index_offset,
      index_size: self.index_size,
      meta_offset: self.meta_offset,
      meta_size: self.meta_size,
      checksum: self.checksum,
      magic: TABLE_MAGIC,
    }
  }
}

/// Table footer (32 bytes, packed)
/// 表尾部（32字节，紧凑）
///
/// Layout:
/// - index_offset: u64 - Block index position
/// - index_size: u32 - Block index size
/// - meta_offset: u64 - Table meta position
/// - meta_size: u32 - Table meta size
/// - checksum: u32 - CRC32 over everything before the footer
/// - magic: u32 - File magic
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Footer {
  index_offset: u64,
  index_size: u32,
  meta_offset: u64,
  meta_size: u32,
  checksum: u32,
  magic: u32,
}

impl Footer {
  #[inline]
  pub fn index_offset(&self) -> u64 {
    self.index_offset
  }

  #[inline]
  pub fn index_size(&self) -> u32 {
    self.index_size
  }

  #[inline]
  pub fn meta_offset(&self) -> u64 {
    self.meta_offset
  }

  #[inline]
  pub fn meta_size(&self) -> u32 {
    self.meta_size
  }

  #[inline]
  pub fn checksum(&self) -> u32 {
    self.checksum
  }

  #[inline]
  pub fn magic(&self) -> u32 {
    self.magic
  }
}

const _: () = assert!(size_of::<Footer>() == FOOTER_SIZE);
