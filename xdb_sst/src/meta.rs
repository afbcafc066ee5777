//! Table metadata
//! 表元数据

use bitcode::{Decode, Encode};

/// Table metadata
/// 表元数据
///
/// Serialized in the meta section; id and file_size are taken from the
/// enclosing file at load time.
/// 序列化在元数据段；id 与 file_size 在加载时取自文件本身。
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct TableMeta {
  /// Table ID
  /// 表 ID
  pub id: u64,
  /// Minimum key
  /// 最小键
  pub min_key: Vec<u8>,
  /// Maximum key
  /// 最大键
  pub max_key: Vec<u8>,
  /// Item count (tombstones included)
  /// 条目数量（含删除标记）
  pub item_count: u64,
  /// Tombstone count
  /// 删除标记数量
  pub rm_count: u64,
  /// Max per-key sequence number (0 for externally built files)
  /// 键序列号最大值（外部构建的文件为 0）
  pub seq: u64,
  /// File size in bytes
  /// 文件大小（字节）
  pub file_size: u64,
}

impl TableMeta {
  /// Create empty metadata with ID
  /// 创建带 ID 的空元数据
  #[inline]
  pub fn new(id: u64) -> Self {
    Self {
      id,
      ..Self::default()
    }
  }

  /// Check if key range overlaps [min, max]
  /// 检查键范围是否与 [min, max] 重叠
  #[inline]
  pub fn overlaps(&self, min: &[u8], max: &[u8]) -> bool {
    self.max_key.as_slice() >= min && self.min_key.as_slice() <= max
  }
}
