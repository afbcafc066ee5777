//! Column family - independent key space
//! 列族 - 独立键空间
//!
//! Each column family has its own memtable, frozen memtables and levels,
//! and its own table directory.
//! 每个列族有独立的内存表、冻结内存表与层级，以及独立的表目录。

use std::path::{Path, PathBuf};

use crate::{Level, Memtable, Result};

/// Table directory name inside a column family directory
/// 列族目录内的表目录名
pub(crate) const SST_DIR: &str = "sst";

/// Column family state
/// 列族状态
#[derive(Debug)]
pub struct Cf {
  /// Column family name
  /// 列族名称
  pub name: String,
  /// Column family directory
  /// 列族目录
  dir: PathBuf,
  /// Active memtable
  /// 活跃内存表
  pub mem: Memtable,
  /// Frozen memtables (oldest first)
  /// 冻结内存表（最旧的在前）
  pub frozen: Vec<Memtable>,
  /// Levels (L0 first)
  /// 层级（L0 在前）
  pub levels: Vec<Level>,
}

impl Cf {
  /// Create new column family state
  /// 创建新的列族状态
  pub(crate) fn new(name: String, dir: PathBuf, level_count: usize, mem_id: u64) -> Self {
    Self {
      name,
      dir,
      mem: Memtable::new(mem_id),
      frozen: Vec::new(),
      levels: (0..level_count).map(Level::new).collect(),
    }
  }

  /// Get column family directory
  /// 获取列族目录
  #[inline]
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Get table directory
  /// 获取表目录
  #[inline]
  pub fn sst_dir(&self) -> PathBuf {
    self.dir.join(SST_DIR)
  }

  /// Ensure level exists
  /// 确保层级存在
  pub(crate) fn ensure_level(&mut self, n: usize) {
    while self.levels.len() <= n {
      let level = self.levels.len();
      self.levels.push(Level::new(level));
    }
  }

  /// Check if unflushed state (active or frozen) has keys in [min, max]
  /// 检查未刷写状态（活跃或冻结）是否有键落在 [min, max] 内
  pub fn mem_overlaps(&self, min: &[u8], max: &[u8]) -> bool {
    self.mem.overlaps(min, max) || self.frozen.iter().any(|m| m.overlaps(min, max))
  }

  /// Check if any persisted table overlaps [min, max]
  /// 检查是否有已持久化的表与 [min, max] 重叠
  pub fn tables_overlap(&self, min: &[u8], max: &[u8]) -> bool {
    self.levels.iter().any(|l| l.overlaps(min, max))
  }

  /// Get value by key
  /// 根据键获取值
  ///
  /// Search order: active mem → frozen mems (newest first) → L0 (newest
  /// first) → L1..Ln. The first hit wins; a tombstone hides deeper entries.
  /// 查找顺序：活跃内存表 → 冻结内存表（从新到旧）→ L0（从新到旧）→
  /// L1..Ln。首个命中生效；删除标记遮蔽更深的条目。
  pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    // 1. Check active memtable / 查活跃内存表
    if let Some(entry) = self.mem.get(key) {
      return Ok(entry.val().map(|v| v.to_vec()));
    }

    // 2. Check frozen memtables (newest first) / 查冻结内存表（从新到旧）
    for mem in self.frozen.iter().rev() {
      if let Some(entry) = mem.get(key) {
        return Ok(entry.val().map(|v| v.to_vec()));
      }
    }

    // 3. Check levels / 查层级
    for level in &self.levels {
      if level.level == 0 {
        // L0: newest first, tables may overlap
        // L0：从新到旧，表可能重叠
        for handle in level.tables.iter().rev() {
          let meta = handle.meta();
          if key < meta.min_key.as_slice() || key > meta.max_key.as_slice() {
            continue;
          }
          if let Some((_, entry)) = handle.table.get(key).await? {
            return Ok(entry.val().map(|v| v.to_vec()));
          }
        }
      } else if let Some(handle) = level.find(key) {
        // L1+: at most one table covers the key
        // L1+：至多一个表覆盖该键
        if let Some((_, entry)) = handle.table.get(key).await? {
          return Ok(entry.val().map(|v| v.to_vec()));
        }
      }
    }

    Ok(None)
  }
}
