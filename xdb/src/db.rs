//! Database core structure
//! 数据库核心结构

use std::{
  cell::RefCell,
  collections::{BTreeMap, btree_map::Entry as MapEntry},
  path::{Path, PathBuf},
  rc::Rc,
};

use log::{info, warn};
use xdb_base::id_path;
use xdb_sst::{Entry as SstEntry, Table, Writer};

use crate::{
  Cf, Conf, Error, Manifest, Memtable, Result, Snapshot, SnapshotSet, TableEntry, TableHandle,
  manifest::{CfMeta, LevelMeta, load_manifest, save_manifest},
};

// Default memory table threshold: 64MB
// 默认内存表阈值：64MB
const DEFAULT_MEM_THRESHOLD: u64 = 64 * 1024 * 1024;

// Default level count
// 默认层级数量
const DEFAULT_LEVEL_COUNT: usize = 7;

// Column family directory name
// 列族目录名
const CF_DIR: &str = "cf";

/// Default column family name
/// 默认列族名称
pub const DEFAULT_CF: &str = "default";

/// Database core structure
/// 数据库核心结构
#[derive(Debug)]
pub struct Db {
  /// Data directory / 数据目录
  dir: PathBuf,
  /// Memory table size threshold / 内存表大小阈值
  mem_threshold: u64,
  /// Level count / 层级数量
  level_count: usize,
  /// Ingest-behind capability, fixed for the database lifetime
  /// 底层回填能力，数据库生命周期内固定
  ingest_behind: bool,
  /// Manifest version / 清单版本
  version: u64,
  /// Current sequence number / 当前序列号
  seq: u64,
  /// Next table ID / 下一个表 ID
  next_table_id: u64,
  /// Next memtable ID / 下一个内存表 ID
  next_mem_id: u64,
  /// Column families by name / 按名称的列族
  cfs: BTreeMap<String, Cf>,
  /// Live snapshot registry / 活跃快照注册表
  snapshots: Rc<RefCell<SnapshotSet>>,
}

impl Db {
  /// Open database at path
  /// 打开数据库
  ///
  /// Recovers all column families from the manifest. The ingest-behind
  /// capability is pinned at creation; reopening with a different setting
  /// is a configuration error.
  /// 从清单恢复所有列族。底层回填能力在创建时固定；以不同设置重新打开
  /// 是配置错误。
  pub async fn open(path: impl Into<PathBuf>, conf: &[Conf]) -> Result<Self> {
    let dir = path.into();

    // Extract configurations in a single pass
    // 单次遍历提取配置
    let mut mem_threshold = DEFAULT_MEM_THRESHOLD;
    let mut level_count = DEFAULT_LEVEL_COUNT;
    let mut ingest_behind = false;

    for c in conf {
      match c {
        Conf::MemThreshold(v) => mem_threshold = *v,
        Conf::LevelCount(v) => level_count = (*v).max(2),
        Conf::IngestBehind(v) => ingest_behind = *v,
      }
    }

    // Create directory if not exists
    // 如果目录不存在则创建
    if !dir.exists() {
      std::fs::create_dir_all(&dir)?;
    }

    let mut db = Self {
      dir,
      mem_threshold,
      level_count,
      ingest_behind,
      version: 0,
      seq: 0,
      next_table_id: 1,
      next_mem_id: 1,
      cfs: BTreeMap::new(),
      snapshots: Rc::new(RefCell::new(SnapshotSet::new())),
    };

    match load_manifest(&db.dir).await? {
      Some(m) => db.recover(m).await?,
      None => {
        // Fresh database: pin the ingest-behind capability in the manifest
        // 新数据库：将底层回填能力固定在清单中
        let m = db.to_manifest();
        save_manifest(&db.dir, &m).await?;
      }
    }

    info!("open {} (seq {})", db.dir.display(), db.seq);
    Ok(db)
  }

  /// Rebuild in-memory state from manifest
  /// 从清单重建内存状态
  async fn recover(&mut self, m: Manifest) -> Result<()> {
    if m.ingest_behind != self.ingest_behind {
      return Err(Error::Conf {
        msg: format!(
          "ingest_behind must hold for the database's entire lifetime (manifest: {}, conf: {})",
          m.ingest_behind, self.ingest_behind
        ),
      });
    }

    self.version = m.version;
    self.seq = m.seq;
    self.next_table_id = m.next_table_id;

    for cf_meta in &m.cfs {
      let mem_id = self.next_mem_id;
      self.next_mem_id += 1;

      let mut cf = Cf::new(
        cf_meta.name.clone(),
        self.dir.join(CF_DIR).join(&cf_meta.name),
        self.level_count,
        mem_id,
      );
      let sst_dir = cf.sst_dir();

      for level_meta in &cf_meta.levels {
        cf.ensure_level(level_meta.level);
        for entry in &level_meta.tables {
          let path = id_path(&sst_dir, entry.id);
          let table = Table::load(&path, entry.id).await?;

          if table.meta().min_key != entry.min_key || table.meta().max_key != entry.max_key {
            warn!("table {} key range differs from manifest", entry.id);
          }

          cf.levels[level_meta.level].add(Rc::new(TableHandle {
            seq: entry.seq,
            table,
          }));
        }
      }

      self.cfs.insert(cf_meta.name.clone(), cf);
    }

    Ok(())
  }

  /// Get data directory
  /// 获取数据目录
  #[inline]
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Get current sequence number
  /// 获取当前序列号
  #[inline]
  pub fn seq(&self) -> u64 {
    self.seq
  }

  /// Check ingest-behind capability
  /// 检查底层回填能力
  #[inline]
  pub fn ingest_behind(&self) -> bool {
    self.ingest_behind
  }

  /// Get level count
  /// 获取层级数量
  #[inline]
  pub(crate) fn level_count(&self) -> usize {
    self.level_count
  }

  /// Get live snapshot registry
  /// 获取活跃快照注册表
  #[inline]
  pub(crate) fn snapshots(&self) -> &Rc<RefCell<SnapshotSet>> {
    &self.snapshots
  }

  /// Get next table ID
  /// 获取下一个表 ID
  #[inline]
  pub(crate) fn next_table_id(&self) -> u64 {
    self.next_table_id
  }

  /// Apply a committed ingestion to the counters
  /// 将已提交的摄入应用到计数器
  pub(crate) fn apply_ingest(&mut self, table_seq: u64, next_table_id: u64) {
    self.version += 1;
    self.seq = self.seq.max(table_seq);
    self.next_table_id = next_table_id;
  }

  /// Get or create column family
  /// 获取或创建列族
  pub fn cf(&mut self, name: &str) -> &mut Cf {
    let dir = self.dir.join(CF_DIR).join(name);
    let level_count = self.level_count;
    match self.cfs.entry(name.into()) {
      MapEntry::Occupied(e) => e.into_mut(),
      MapEntry::Vacant(e) => {
        let mem_id = self.next_mem_id;
        self.next_mem_id += 1;
        e.insert(Cf::new(name.into(), dir, level_count, mem_id))
      }
    }
  }

  /// Get column family if it exists
  /// 获取列族（如果存在）
  #[inline]
  pub fn cf_peek(&self, name: &str) -> Option<&Cf> {
    self.cfs.get(name)
  }

  /// Write key-value pair
  /// 写入键值对
  ///
  /// 1. Allocate fresh seq
  /// 2. Update memtable
  /// 3. Freeze memtable at threshold
  pub async fn put(&mut self, cf_name: &str, key: &[u8], val: &[u8]) -> Result<()> {
    self.seq += 1;
    let seq = self.seq;
    let threshold = self.mem_threshold;

    let cf = self.cf(cf_name);
    cf.mem.put(key.into(), seq, val.into());

    if cf.mem.size() >= threshold {
      self.seal(cf_name);
    }
    Ok(())
  }

  /// Delete key (write tombstone)
  /// 删除键（写入 tombstone）
  pub async fn del(&mut self, cf_name: &str, key: &[u8]) -> Result<()> {
    self.seq += 1;
    let seq = self.seq;
    let threshold = self.mem_threshold;

    let cf = self.cf(cf_name);
    cf.mem.del(key.into(), seq);

    if cf.mem.size() >= threshold {
      self.seal(cf_name);
    }
    Ok(())
  }

  /// Get value by key
  /// 根据键获取值
  pub async fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match self.cfs.get(cf_name) {
      Some(cf) => cf.get(key).await,
      None => Ok(None),
    }
  }

  /// Freeze active memtable if non-empty
  /// 冻结非空的活跃内存表
  pub fn seal(&mut self, cf_name: &str) {
    let mem_id = self.next_mem_id;
    if let Some(cf) = self.cfs.get_mut(cf_name)
      && !cf.mem.is_empty()
    {
      self.next_mem_id += 1;
      let old = std::mem::replace(&mut cf.mem, Memtable::new(mem_id));
      cf.frozen.push(old);
    }
  }

  /// Flush oldest frozen memtable to an L0 table
  /// 将最旧的冻结内存表刷写为 L0 表
  ///
  /// The manifest is saved before in-memory state changes, so a failed
  /// save leaves the database unchanged.
  /// 清单在内存状态变更前保存，保存失败时数据库保持不变。
  pub async fn flush(&mut self, cf_name: &str) -> Result<()> {
    // Check oldest frozen memtable (FIFO order)
    // 检查最旧的冻结内存表（FIFO 顺序）
    {
      let Some(cf) = self.cfs.get_mut(cf_name) else {
        return Ok(());
      };
      match cf.frozen.first() {
        None => return Ok(()),
        Some(mem) if mem.is_empty() => {
          cf.frozen.remove(0);
          return Ok(());
        }
        Some(_) => {}
      }
    }

    let id = self.next_table_id;

    // Ensure table directory exists
    // 确保表目录存在
    let Some(cf) = self.cfs.get(cf_name) else {
      return Ok(());
    };
    let sst_dir = cf.sst_dir();
    if !sst_dir.exists() {
      std::fs::create_dir_all(&sst_dir)?;
    }

    // Write memtable to table file
    // 将内存表写入表文件
    let path = id_path(&sst_dir, id);
    let mut writer = Writer::new(&path, id).await?;
    if let Some(mem) = cf.frozen.first() {
      for (key, entry) in mem.iter() {
        let sst_entry = match entry.val() {
          Some(val) => SstEntry::Value(val.into()),
          None => SstEntry::Tombstone,
        };
        writer.add(key, entry.seq(), &sst_entry).await?;
      }
    }
    let meta = writer.finish().await?;
    let table_seq = meta.seq;

    // Load table for the new file
    // 加载新表文件
    let table = Table::load(&path, id).await?;

    // Save manifest with the new table before mutating state
    // 在变更状态前保存带新表的清单
    let mut m = self.to_manifest();
    m.version = self.version + 1;
    m.next_table_id = id + 1;
    {
      let cfm = m.cf_mut(cf_name);
      ensure_level_meta(cfm, 0);
      cfm.levels[0].tables.push(table_entry(&meta, table_seq));
    }
    save_manifest(&self.dir, &m).await?;

    // Install in memory
    // 安装到内存
    self.version += 1;
    self.next_table_id = id + 1;
    if let Some(cf) = self.cfs.get_mut(cf_name) {
      cf.frozen.remove(0);
      cf.levels[0].add(Rc::new(TableHandle {
        seq: table_seq,
        table,
      }));
    }

    info!("flush {cf_name}: table {id} (seq {table_seq})");
    Ok(())
  }

  /// Freeze active memtable and flush all frozen memtables
  /// 冻结活跃内存表并刷写所有冻结内存表
  pub async fn flush_all(&mut self, cf_name: &str) -> Result<()> {
    self.seal(cf_name);
    while self
      .cfs
      .get(cf_name)
      .is_some_and(|cf| !cf.frozen.is_empty())
    {
      self.flush(cf_name).await?;
    }
    Ok(())
  }

  /// Create snapshot of a column family at the current sequence number
  /// 在当前序列号处创建列族快照
  ///
  /// Snapshot creation and ingestion commit both run under the exclusive
  /// &mut borrow of this handle, which serializes them.
  /// 快照创建与摄入提交都在此句柄的独占 &mut 借用下运行，因此相互串行。
  pub fn snapshot(&mut self, cf_name: &str) -> Snapshot {
    let seq = self.seq;
    let set = Rc::clone(&self.snapshots);
    let cf = self.cf(cf_name);
    Snapshot::new(seq, &cf.levels, set)
  }

  /// Build manifest from current in-memory state
  /// 从当前内存状态构建清单
  pub(crate) fn to_manifest(&self) -> Manifest {
    let mut m = Manifest::new();
    m.version = self.version;
    m.seq = self.seq;
    m.next_table_id = self.next_table_id;
    m.ingest_behind = self.ingest_behind;

    for (name, cf) in &self.cfs {
      m.cfs.push(CfMeta {
        name: name.clone(),
        levels: cf
          .levels
          .iter()
          .map(|l| LevelMeta {
            level: l.level,
            tables: l
              .tables
              .iter()
              .map(|t| table_entry(t.meta(), t.seq))
              .collect(),
          })
          .collect(),
      });
    }

    m
  }
}

/// Build manifest table entry from table metadata
/// 从表元数据构建清单表条目
pub(crate) fn table_entry(meta: &xdb_sst::TableMeta, seq: u64) -> TableEntry {
  TableEntry {
    id: meta.id,
    min_key: meta.min_key.clone(),
    max_key: meta.max_key.clone(),
    item_count: meta.item_count,
    rm_count: meta.rm_count,
    file_size: meta.file_size,
    seq,
  }
}

/// Ensure level exists in manifest column family metadata
/// 确保清单列族元数据中的层级存在
pub(crate) fn ensure_level_meta(cfm: &mut CfMeta, n: usize) {
  while cfm.levels.len() <= n {
    let level = cfm.levels.len();
    cfm.levels.push(LevelMeta {
      level,
      tables: Vec::new(),
    });
  }
}
