//! Database configuration
//! 数据库配置

/// Database configuration
/// 数据库配置
#[derive(Debug, Clone, Copy)]
pub enum Conf {
  /// Memory table size threshold (bytes), default 64MB
  /// 内存表大小阈值（字节），默认 64MB
  MemThreshold(u64),
  /// Level count, default 7
  /// 层级数量，默认 7
  LevelCount(usize),
  /// Ingest-behind capability: reserve the bottommost level for seq-0
  /// backfill; must hold for the database's entire lifetime
  /// 底层回填能力：为序列号 0 的回填保留最底层；必须在数据库整个生命周期内保持
  IngestBehind(bool),
}
