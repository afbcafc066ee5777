//! External file ingestion
//! 外部文件摄入
//!
//! Admits pre-built sorted table files into a live column family: validate,
//! flush overlapping memtables if allowed, pick a level, place files by move
//! or verified copy, then commit every assignment in one atomic manifest
//! save.
//! 将预构建的有序表文件接纳到运行中的列族：验证、按需刷写重叠的内存表、
//! 选择层级、以移动或带校验的复制放置文件，最后通过一次原子清单保存提交
//! 全部指派。

use std::{
  path::{Path, PathBuf},
  rc::Rc,
};

use crc32fast::Hasher;
use log::{debug, error, info};
use thiserror::Error;
use xdb_base::{id_path, read_file};
use xdb_sst::Table;

use crate::{
  Db, IngestOpt, Level, Result, TableHandle,
  db::{ensure_level_meta, table_entry},
  manifest::save_manifest,
};

/// Ingestion failure reasons
/// 摄入失败原因
///
/// Every failure before commit leaves visible database state unchanged.
/// Placed files from a failed call are not deleted; cleanup is the
/// caller's responsibility.
/// 提交前的任何失败都不会改变数据库可见状态。失败调用已放置的文件不会
/// 被删除；清理由调用方负责。
#[derive(Debug, Error)]
pub enum IngestError {
  /// Malformed, unsorted or mutually overlapping input files, or an
  /// illegal option combination
  /// 文件格式错误、未排序、相互重叠，或非法的选项组合
  #[error("Invalid input: {msg}")]
  InvalidInput { msg: String },

  /// Key range overlaps unflushed data and blocking flush is not allowed
  /// 键范围与未刷写数据重叠且不允许阻塞刷写
  #[error("Blocking flush required but not allowed")]
  FlushRequired,

  /// Key range overlaps persisted data and a global seq is not allowed
  /// 键范围与已持久化数据重叠且不允许全局序列号
  #[error("Key range overlaps existing data and global seq not allowed")]
  OverlapNotAllowed,

  /// Ingest-behind requested without the lifetime capability
  /// 请求底层回填但缺少生命周期能力
  #[error("Ingest behind requires the lifetime capability")]
  CapabilityNotEnabled,

  /// Rename failed (e.g. cross-device); caller must fall back to copy
  /// 重命名失败（如跨设备）；调用方须回退为复制
  #[error("Move failed: {source}")]
  MoveFailed {
    #[source]
    source: std::io::Error,
  },

  /// Copied file checksum does not match the source
  /// 复制文件的校验和与源不匹配
  #[error("Copy verification failed: {path}")]
  CopyVerificationFailed { path: PathBuf },

  /// Manifest save failed; caller may retry once the cause is resolved
  /// 清单保存失败；调用方可在原因解除后重试
  #[error("Commit failed: {msg}")]
  CommitFailed { msg: String },
}

/// Ingestion lifecycle state
/// 摄入生命周期状态
///
/// Failed and Committed are terminal.
/// Failed 与 Committed 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
  Pending,
  Validating,
  FlushIfNeeded,
  Committing,
  Committed,
  Failed,
}

impl Db {
  /// Ingest externally built table files into a column family
  /// 将外部构建的表文件摄入列族
  ///
  /// Blocking and synchronous from the caller's perspective; calls
  /// serialize at this handle's exclusive borrow, so ingestion commit,
  /// ordinary writes and snapshot creation are mutually exclusive.
  /// 从调用方角度看是阻塞同步的；调用在此句柄的独占借用处串行，摄入提交、
  /// 普通写入与快照创建因此互斥。
  pub async fn ingest(&mut self, cf_name: &str, files: &[PathBuf], opt: &IngestOpt) -> Result<()> {
    match self.ingest_inner(cf_name, files, opt).await {
      Ok(()) => Ok(()),
      Err(e) => {
        error!("ingest {cf_name}: {:?}: {e}", IngestState::Failed);
        Err(e)
      }
    }
  }

  async fn ingest_inner(
    &mut self,
    cf_name: &str,
    files: &[PathBuf],
    opt: &IngestOpt,
  ) -> Result<()> {
    let mut state = IngestState::Pending;
    transition(cf_name, &mut state, IngestState::Validating);

    // Option combination: seq-0 stamping is itself a whole-file sequence
    // assignment, which allow_global_seq=false forbids.
    // 选项组合：序列号 0 的整体盖章本身就是整文件序列号指派，
    // allow_global_seq=false 禁止这种指派。
    if opt.allow_ingest_behind && !opt.allow_global_seq {
      return Err(invalid("allow_ingest_behind requires allow_global_seq").into());
    }

    if files.is_empty() {
      return Err(invalid("no files to ingest").into());
    }

    // Load every file through the table reader: checksum and internal key
    // order are verified there.
    // 通过表读取器加载每个文件：校验和与内部键序在那里验证。
    let mut loaded = Vec::with_capacity(files.len());
    for path in files {
      let table = Table::load(path, 0)
        .await
        .map_err(|e| invalid(&format!("{}: {e}", path.display())))?;
      loaded.push(table);
    }

    // Files within one call must not overlap each other
    // 同一调用内的文件相互之间不得重叠
    let mut order: Vec<usize> = (0..loaded.len()).collect();
    order.sort_by(|&a, &b| loaded[a].meta().min_key.cmp(&loaded[b].meta().min_key));
    for pair in order.windows(2) {
      if loaded[pair[0]].meta().max_key >= loaded[pair[1]].meta().min_key {
        return Err(
          invalid(&format!(
            "files overlap: {} and {}",
            loaded[pair[0]].path().display(),
            loaded[pair[1]].path().display()
          ))
          .into(),
        );
      }
    }

    // Aggregate key range of the batch
    // 批次的聚合键范围
    let min = loaded[order[0]].meta().min_key.clone();
    let max = loaded[order[order.len() - 1]].meta().max_key.clone();

    // Flush decision: unflushed overlapping state must be persisted first
    // 刷写决策：重叠的未刷写状态必须先持久化
    let mem_overlap = {
      let cf = self.cf(cf_name);
      cf.mem_overlaps(&min, &max)
    };
    if mem_overlap {
      if !opt.allow_blocking_flush {
        return Err(IngestError::FlushRequired.into());
      }
      transition(cf_name, &mut state, IngestState::FlushIfNeeded);
      self.flush_all(cf_name).await?;
    }

    // Overlap with persisted data (live keys and tombstones alike)
    // 与已持久化数据（含删除标记）的重叠
    let table_overlap = self
      .cf_peek(cf_name)
      .is_some_and(|cf| cf.tables_overlap(&min, &max));

    // Placement and table sequence number
    // 放置与表序列号
    let (target, table_seq) = if opt.allow_ingest_behind {
      if !self.ingest_behind() {
        return Err(IngestError::CapabilityNotEnabled.into());
      }
      let bottom = self.level_count() - 1;
      let bottom_overlap = self
        .cf_peek(cf_name)
        .is_some_and(|cf| cf.levels[bottom].overlaps(&min, &max));
      if bottom_overlap {
        return Err(invalid("bottommost level must stay disjoint").into());
      }
      (bottom, 0)
    } else {
      if table_overlap && !opt.allow_global_seq {
        return Err(IngestError::OverlapNotAllowed.into());
      }

      // The bottommost level is reserved while the capability is on
      // 能力开启时最底层保留
      let deepest = self.level_count() - 1 - self.ingest_behind() as usize;
      let target = match self.cf_peek(cf_name) {
        Some(cf) => pick_level(&cf.levels, deepest, &min, &max),
        None => deepest,
      };

      // One fresh number for the whole batch; without allow_global_seq the
      // files keep their own per-key numbers.
      // 整个批次一个新序列号；不允许全局序列号时文件保留各自的键序列号。
      let seq = if opt.allow_global_seq {
        self.seq() + 1
      } else {
        loaded.iter().map(|t| t.meta().seq).max().unwrap_or(0)
      };
      (target, seq)
    };

    // A fresh number is allocated above the current counter, and every live
    // snapshot bound is at most the counter, so the consistency guarantee
    // holds; snapshot creation cannot interleave under the &mut borrow.
    // 新序列号在当前计数器之上分配，而所有活跃快照边界不超过计数器，
    // 一致性保证因此成立；独占借用下快照创建无法交错。
    if opt.snapshot_consistency
      && opt.allow_global_seq
      && !opt.allow_ingest_behind
      && let Some(bound) = self.snapshots().borrow().max()
    {
      debug_assert!(table_seq > bound);
    }

    transition(cf_name, &mut state, IngestState::Committing);

    // Place files into the column family table directory
    // 将文件放置到列族表目录
    let sst_dir = self.cf(cf_name).sst_dir();
    if !sst_dir.exists() {
      std::fs::create_dir_all(&sst_dir)?;
    }

    let mut next_id = self.next_table_id();
    let mut handles = Vec::with_capacity(loaded.len());
    for table in &loaded {
      let id = next_id;
      next_id += 1;
      let dest = id_path(&sst_dir, id);

      if opt.move_files {
        compio::fs::rename(table.path(), &dest)
          .await
          .map_err(|e| IngestError::MoveFailed { source: e })?;
      } else {
        copy_verify(table.path(), &dest).await?;
      }

      let placed = Table::load(&dest, id).await?;
      handles.push(Rc::new(TableHandle {
        seq: table_seq,
        table: placed,
      }));
    }

    // Atomic commit: one manifest save installs every assignment; a failed
    // save leaves in-memory state unchanged and the placed files orphaned.
    // 原子提交：一次清单保存安装全部指派；保存失败时内存状态不变，
    // 已放置的文件成为孤儿。
    let mut m = self.to_manifest();
    m.version += 1;
    m.seq = m.seq.max(table_seq);
    m.next_table_id = next_id;
    {
      let cfm = m.cf_mut(cf_name);
      ensure_level_meta(cfm, target);
      for handle in &handles {
        cfm.levels[target].tables.push(table_entry(handle.meta(), table_seq));
      }
    }
    if let Err(e) = save_manifest(self.dir(), &m).await {
      return Err(
        IngestError::CommitFailed {
          msg: e.to_string(),
        }
        .into(),
      );
    }

    self.apply_ingest(table_seq, next_id);
    let cf = self.cf(cf_name);
    cf.ensure_level(target);
    for handle in handles {
      cf.levels[target].add(handle);
    }

    transition(cf_name, &mut state, IngestState::Committed);
    info!("ingest {cf_name}: {} file(s) at level {target}, seq {table_seq}", loaded.len());
    Ok(())
  }
}

/// Log a state transition
/// 记录状态迁移
#[inline]
fn transition(cf_name: &str, state: &mut IngestState, next: IngestState) {
  debug!("ingest {cf_name}: {:?} -> {next:?}", *state);
  *state = next;
}

#[inline]
fn invalid(msg: &str) -> IngestError {
  IngestError::InvalidInput { msg: msg.into() }
}

/// Deepest level that neither overlaps the range nor sits above deeper
/// overlapping data; ties break toward deeper levels
/// 既不与范围重叠、下方也没有重叠数据的最深层级；平局时偏向更深层
fn pick_level(levels: &[Level], deepest: usize, min: &[u8], max: &[u8]) -> usize {
  for (n, level) in levels.iter().enumerate().take(deepest + 1) {
    if level.overlaps(min, max) {
      // Must sit above the shallowest overlapping level; L0 tolerates
      // overlap.
      // 必须位于最浅重叠层之上；L0 容许重叠。
      return n.saturating_sub(1);
    }
  }
  deepest
}

/// Copy src to dest and verify the destination checksum against the source
/// 将 src 复制到 dest 并用源校验和验证目标
async fn copy_verify(src: &Path, dest: &Path) -> Result<()> {
  let data = read_file(src).await?;

  let mut hasher = Hasher::new();
  hasher.update(&data);
  let expected = hasher.finalize();

  // A stale file may sit at dest after a crash, truncate it
  // 崩溃后 dest 处可能残留旧文件，截断之
  use compio::io::AsyncWriteAtExt;
  let mut file = compio::fs::OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .open(dest)
    .await?;
  file.write_all_at(data, 0).await.0?;
  file.sync_all().await?;
  drop(file);

  // Re-read the destination and verify
  // 重新读取目标并验证
  let back = read_file(dest).await?;
  let mut hasher = Hasher::new();
  hasher.update(&back);
  if hasher.finalize() != expected {
    return Err(
      IngestError::CopyVerificationFailed {
        path: dest.to_path_buf(),
      }
      .into(),
    );
  }

  Ok(())
}
