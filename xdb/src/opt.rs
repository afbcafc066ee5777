//! Ingestion options
//! 摄入选项
//!
//! Plain value record carried into Db::ingest; immutable once the call
//! begins.
//! 传入 Db::ingest 的纯值记录；调用开始后不可变。

/// Options for ingesting externally built table files
/// 摄入外部构建表文件的选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOpt {
  /// Move (rename) source files instead of copying them
  /// 移动（重命名）源文件而非复制
  pub move_files: bool,
  /// Ingested keys must stay invisible to snapshots taken before the call
  /// 摄入的键对调用前创建的快照保持不可见
  pub snapshot_consistency: bool,
  /// Permit assigning one fresh sequence number to the whole file
  /// 允许为整个文件指派一个新的序列号
  pub allow_global_seq: bool,
  /// Permit a synchronous flush when the key range overlaps unflushed data
  /// 当键范围与未刷写数据重叠时允许同步刷写
  pub allow_blocking_flush: bool,
  /// Place at the bottommost level with seq 0 (historical backfill)
  /// 放置在最底层且序列号为 0（历史回填）
  pub allow_ingest_behind: bool,
}

impl Default for IngestOpt {
  #[inline]
  fn default() -> Self {
    Self {
      move_files: false,
      snapshot_consistency: true,
      allow_global_seq: true,
      allow_blocking_flush: true,
      allow_ingest_behind: false,
    }
  }
}

impl IngestOpt {
  /// Create with all five options
  /// 以全部五个选项创建
  #[inline]
  pub const fn new(
    move_files: bool,
    snapshot_consistency: bool,
    allow_global_seq: bool,
    allow_blocking_flush: bool,
    allow_ingest_behind: bool,
  ) -> Self {
    Self {
      move_files,
      snapshot_consistency,
      allow_global_seq,
      allow_blocking_flush,
      allow_ingest_behind,
    }
  }

  /// Set move_files
  /// 设置 move_files
  #[inline]
  pub const fn move_files(mut self, v: bool) -> Self {
    self.move_files = v;
    self
  }

  /// Set snapshot_consistency
  /// 设置 snapshot_consistency
  #[inline]
  pub const fn snapshot_consistency(mut self, v: bool) -> Self {
    self.snapshot_consistency = v;
    self
  }

  /// Set allow_global_seq
  /// 设置 allow_global_seq
  #[inline]
  pub const fn allow_global_seq(mut self, v: bool) -> Self {
    self.allow_global_seq = v;
    self
  }

  /// Set allow_blocking_flush
  /// 设置 allow_blocking_flush
  #[inline]
  pub const fn allow_blocking_flush(mut self, v: bool) -> Self {
    self.allow_blocking_flush = v;
    self
  }

  /// Set allow_ingest_behind
  /// 设置 allow_ingest_behind
  #[inline]
  pub const fn allow_ingest_behind(mut self, v: bool) -> Self {
    self.allow_ingest_behind = v;
    self
  }
}
