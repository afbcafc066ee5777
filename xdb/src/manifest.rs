//! Manifest - engine metadata persistence
//! 清单 - 引擎元数据持久化
//!
//! Tracks tables per column family and level, the sequence counter and the
//! ingest-behind capability; supports atomic updates.
//! 跟踪每个列族每个层级的表、序列号计数器与底层回填能力；支持原子更新。

use std::path::{Path, PathBuf};

use bitcode::{Decode, Encode};
use compio::io::AsyncWriteAtExt;
use crc32fast::Hasher;
use xdb_base::{open_read, read_all};

use crate::Result;

/// Manifest file magic number
/// 清单文件魔数
const MANIFEST_MAGIC: u32 = 0x5844_424D; // "XDBM"

/// Manifest format version
/// 清单格式版本
const MANIFEST_VERSION: u8 = 1;

/// Table entry in manifest
/// 清单中的表条目
#[derive(Debug, Clone, Encode, Decode)]
pub struct TableEntry {
  /// Table ID
  /// 表 ID
  pub id: u64,
  /// Minimum key
  /// 最小键
  pub min_key: Vec<u8>,
  /// Maximum key
  /// 最大键
  pub max_key: Vec<u8>,
  /// Item count
  /// 条目数量
  pub item_count: u64,
  /// Tombstone count
  /// 删除标记数量
  pub rm_count: u64,
  /// File size
  /// 文件大小
  pub file_size: u64,
  /// Assigned table sequence number
  /// 指派的表序列号
  pub seq: u64,
}

/// Level metadata in manifest
/// 清单中的层级元数据
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct LevelMeta {
  /// Level number
  /// 层级编号
  pub level: usize,
  /// Tables in this level
  /// 此层级的表
  pub tables: Vec<TableEntry>,
}

/// Column family metadata in manifest
/// 清单中的列族元数据
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct CfMeta {
  /// Column family name
  /// 列族名称
  pub name: String,
  /// Level metadata
  /// 层级元数据
  pub levels: Vec<LevelMeta>,
}

/// Manifest body (bitcode-encoded between header and checksum)
/// 清单主体（头部与校验和之间以 bitcode 编码）
#[derive(Debug, Clone, Encode, Decode)]
pub struct Manifest {
  /// Manifest version (monotonically increasing)
  /// 清单版本（单调递增）
  pub version: u64,
  /// Current sequence number
  /// 当前序列号
  pub seq: u64,
  /// Next table ID
  /// 下一个表 ID
  pub next_table_id: u64,
  /// Ingest-behind capability, fixed at database creation
  /// 底层回填能力，数据库创建时固定
  pub ingest_behind: bool,
  /// Column family metadata
  /// 列族元数据
  pub cfs: Vec<CfMeta>,
}

impl Default for Manifest {
  fn default() -> Self {
    Self::new()
  }
}

impl Manifest {
  /// Create new empty manifest
  /// 创建新的空清单
  pub fn new() -> Self {
    Self {
      version: 0,
      seq: 0,
      next_table_id: 1,
      ingest_behind: false,
      cfs: Vec::new(),
    }
  }

  /// Get column family metadata by name
  /// 按名称获取列族元数据
  #[inline]
  pub fn cf(&self, name: &str) -> Option<&CfMeta> {
    self.cfs.iter().find(|cf| cf.name == name)
  }

  /// Get or insert column family metadata
  /// 获取或插入列族元数据
  pub fn cf_mut(&mut self, name: &str) -> &mut CfMeta {
    let pos = match self.cfs.iter().position(|cf| cf.name == name) {
      Some(pos) => pos,
      None => {
        self.cfs.push(CfMeta {
          name: name.into(),
          levels: Vec::new(),
        });
        self.cfs.len() - 1
      }
    };
    &mut self.cfs[pos]
  }

  /// Encode manifest to bytes
  /// 将清单编码为字节
  ///
  /// Header: magic (4) + version (1) + reserved (3), then bitcode body,
  /// then CRC32 (4).
  /// 头部：魔数 (4) + 版本 (1) + 保留 (3)，之后 bitcode 主体，最后 CRC32 (4)。
  pub fn encode(&self) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(&MANIFEST_MAGIC.to_le_bytes());
    buf.push(MANIFEST_VERSION);
    buf.extend_from_slice(&[0u8; 3]); // Reserved

    buf.extend_from_slice(&bitcode::encode(self));

    let mut hasher = Hasher::new();
    hasher.update(&buf);
    let checksum = hasher.finalize();
    buf.extend_from_slice(&checksum.to_le_bytes());

    buf
  }

  /// Decode manifest from bytes
  /// 从字节解码清单
  pub fn decode(data: &[u8]) -> Result<Self> {
    if data.len() < 12 {
      // Minimum: header (8) + checksum (4)
      return Err(crate::Error::Corruption {
        msg: "Manifest too small".into(),
      });
    }

    // Verify checksum first
    // 先验证校验和
    let checksum_offset = data.len() - 4;
    let stored_checksum = u32::from_le_bytes([
      data[checksum_offset],
      data[checksum_offset + 1],
      data[checksum_offset + 2],
      data[checksum_offset + 3],
    ]);

    let mut hasher = Hasher::new();
    hasher.update(&data[..checksum_offset]);
    let computed_checksum = hasher.finalize();

    if stored_checksum != computed_checksum {
      return Err(crate::Error::Corruption {
        msg: format!(
          "Manifest checksum mismatch: expected {stored_checksum}, got {computed_checksum}"
        ),
      });
    }

    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic != MANIFEST_MAGIC {
      return Err(crate::Error::Corruption {
        msg: format!("Invalid manifest magic: {magic:#x}"),
      });
    }

    let format_version = data[4];
    if format_version != MANIFEST_VERSION {
      return Err(crate::Error::Corruption {
        msg: format!("Unsupported manifest version: {format_version}"),
      });
    }

    bitcode::decode(&data[8..checksum_offset]).map_err(|e| crate::Error::Corruption {
      msg: format!("Invalid manifest body: {e}"),
    })
  }
}

/// Manifest file name
/// 清单文件名
const MANIFEST_FILE: &str = "MANIFEST";

/// Temporary manifest file name
/// 临时清单文件名
const MANIFEST_TMP: &str = "MANIFEST.tmp";

/// Load manifest from directory
/// 从目录加载清单
///
/// Returns None if manifest doesn't exist.
/// 如果清单不存在则返回 None。
pub async fn load_manifest(dir: &Path) -> Result<Option<Manifest>> {
  let path = dir.join(MANIFEST_FILE);

  // Check if file exists
  // 检查文件是否存在
  match compio::fs::metadata(&path).await {
    Ok(_) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  }

  // Read file
  // 读取文件
  let file = open_read(&path).await?;
  let meta = file.metadata().await?;
  let data = read_all(&file, meta.len()).await?;

  let manifest = Manifest::decode(&data)?;
  Ok(Some(manifest))
}

/// Save manifest to directory atomically
/// 原子地保存清单到目录
///
/// Writes to temporary file, syncs, then renames.
/// 写入临时文件并同步，然后重命名。
pub async fn save_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
  let tmp_path = dir.join(MANIFEST_TMP);
  let final_path = dir.join(MANIFEST_FILE);

  // Encode, write and sync temporary file
  // 编码、写入并同步临时文件
  // The temp path is reused across saves, so truncate stale bytes.
  // 临时路径在多次保存间复用，截断残留字节。
  let data = manifest.encode();
  let mut file = compio::fs::OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .open(&tmp_path)
    .await?;
  file.write_all_at(data, 0).await.0?;
  file.sync_all().await?;
  drop(file);

  // Atomic rename
  // 原子重命名
  compio::fs::rename(&tmp_path, &final_path).await?;

  // Sync directory (important for durability on Unix)
  // 同步目录（在 Unix 上对持久性很重要）
  #[cfg(unix)]
  {
    if let Ok(dir_file) = compio::fs::File::open(dir).await {
      let _ = dir_file.sync_all().await;
    }
  }

  Ok(())
}

/// Get manifest file path
/// 获取清单文件路径
#[inline]
pub fn manifest_path(dir: &Path) -> PathBuf {
  dir.join(MANIFEST_FILE)
}
