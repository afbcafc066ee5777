#![cfg_attr(docsrs, feature(doc_cfg))]

//! xdb_sst - Sorted table file format
//! xdb 有序表文件格式
//!
//! File layout:
//! [Data Block 0] [Data Block 1] ... [Index] [Meta] [Footer]
//! 文件布局：
//! [数据块0] [数据块1] ... [索引] [元数据] [尾部]

mod block;
mod error;
mod footer;
mod meta;
mod reader;
mod writer;

pub use block::{BlockMeta, decode_block};
pub use error::{Error, Result};
pub use footer::{FOOTER_SIZE, Footer, FooterBuilder};
pub use meta::TableMeta;
pub use reader::Table;
pub use writer::{DEFAULT_BLOCK_SIZE, Writer};

/// Entry stored under a key
/// 键下存储的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
  /// Value bytes
  /// 值字节
  Value(Box<[u8]>),
  /// Tombstone marker for deletion
  /// 删除标记
  Tombstone,
}

impl Entry {
  /// Check if entry is tombstone
  /// 检查是否为删除标记
  #[inline(always)]
  pub fn is_tombstone(&self) -> bool {
    matches!(self, Entry::Tombstone)
  }

  /// Get value bytes if value
  /// 获取值字节（如果是值）
  #[inline(always)]
  pub fn val(&self) -> Option<&[u8]> {
    match self {
      Entry::Value(val) => Some(val),
      Entry::Tombstone => None,
    }
  }
}
