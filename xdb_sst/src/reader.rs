//! Table reader with lazy file handle
//! 懒加载文件句柄的表读取器

use std::path::{Path, PathBuf};

use compio::{
  buf::{IntoInner, IoBuf},
  io::AsyncReadAtExt,
};
use crc32fast::Hasher;
use xdb_base::{open_read, read_all};
use zerocopy::FromBytes;

use crate::{
  BlockMeta, Entry, Error, FOOTER_SIZE, Footer, Result, TableMeta, decode_block,
  footer::TABLE_MAGIC,
};

/// Loaded table (metadata and block index only, no file handle)
/// 已加载的表（仅元数据与块索引，无文件句柄）
#[derive(Debug)]
pub struct Table {
  path: PathBuf,
  meta: TableMeta,
  index: Vec<BlockMeta>,
}

impl Table {
  /// Load table from file, verifying checksum and key order
  /// 从文件加载表，验证校验和与键顺序
  pub async fn load(path: impl Into<PathBuf>, id: u64) -> Result<Self> {
    let path = path.into();
    let file = open_read(&path).await?;

    let file_meta = file.metadata().await?;
    let file_size = file_meta.len();

    if file_size < FOOTER_SIZE as u64 {
      return Err(Error::Corruption {
        msg: format!("Table too small: {file_size} bytes"),
      });
    }

    // Read footer
    // 读取尾部
    let footer_offset = file_size - FOOTER_SIZE as u64;
    let buf = vec![0u8; FOOTER_SIZE];
    let slice = buf.slice(0..FOOTER_SIZE);
    let res = file.read_exact_at(slice, footer_offset).await;
    res.0?;
    let buf = res.1.into_inner();

    let footer = Footer::read_from_bytes(&buf).map_err(|_| Error::Corruption {
      msg: "Invalid footer".into(),
    })?;

    if footer.magic() != TABLE_MAGIC {
      return Err(Error::Corruption {
        msg: format!("Invalid table magic: {:#x}", footer.magic()),
      });
    }

    let meta_end = footer.meta_offset() + footer.meta_size() as u64;
    if meta_end != footer_offset
      || footer.index_offset() + footer.index_size() as u64 != footer.meta_offset()
    {
      return Err(Error::Corruption {
        msg: "Footer section layout mismatch".into(),
      });
    }

    // Verify checksum over everything before the footer
    // 验证尾部之前所有内容的校验和
    let data = read_all(&file, footer_offset).await?;
    let mut hasher = Hasher::new();
    hasher.update(&data);
    let computed = hasher.finalize();

    if computed != footer.checksum() {
      return Err(Error::Corruption {
        msg: format!(
          "Checksum mismatch: expected {}, got {computed}",
          footer.checksum()
        ),
      });
    }

    // Decode index
    // 解码索引
    let index_start = footer.index_offset() as usize;
    let index_end = index_start + footer.index_size() as usize;
    let index: Vec<BlockMeta> =
      bitcode::decode(&data[index_start..index_end]).map_err(|e| Error::Corruption {
        msg: format!("Invalid index: {e}"),
      })?;

    // Index last keys must be strictly ascending
    // 索引最后键必须严格升序
    for pair in index.windows(2) {
      if pair[0].last_key >= pair[1].last_key {
        return Err(Error::Corruption {
          msg: "Index keys not ascending".into(),
        });
      }
    }

    // Decode meta
    // 解码元数据
    let meta_start = footer.meta_offset() as usize;
    let meta_end = meta_start + footer.meta_size() as usize;
    let mut meta: TableMeta =
      bitcode::decode(&data[meta_start..meta_end]).map_err(|e| Error::Corruption {
        msg: format!("Invalid meta: {e}"),
      })?;

    if meta.min_key > meta.max_key {
      return Err(Error::Corruption {
        msg: "Meta key range inverted".into(),
      });
    }

    meta.id = id;
    meta.file_size = file_size;

    Ok(Self { path, meta, index })
  }

  /// Get table metadata
  /// 获取表元数据
  #[inline(always)]
  pub fn meta(&self) -> &TableMeta {
    &self.meta
  }

  /// Get table file path
  /// 获取表文件路径
  #[inline(always)]
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Get entry by key
  /// 按键获取条目
  ///
  /// Returns (seq, entry) when present (tombstones included).
  /// 存在时返回 (seq, entry)（包含删除标记）。
  pub async fn get(&self, key: &[u8]) -> Result<Option<(u64, Entry)>> {
    if key < self.meta.min_key.as_slice() || key > self.meta.max_key.as_slice() {
      return Ok(None);
    }

    // First block whose last_key covers this key
    // 第一个 last_key 覆盖此键的块
    let pos = self
      .index
      .partition_point(|b| b.last_key.as_slice() < key);
    let Some(block) = self.index.get(pos) else {
      return Ok(None);
    };

    for (entry_key, seq, entry) in self.read_block(block).await? {
      if entry_key.as_ref() == key {
        return Ok(Some((seq, entry)));
      }
    }
    Ok(None)
  }

  /// Read all entries in order
  /// 按序读取所有条目
  pub async fn entries(&self) -> Result<Vec<(Box<[u8]>, u64, Entry)>> {
    let mut all = Vec::with_capacity(self.meta.item_count as usize);
    for block in &self.index {
      all.extend(self.read_block(block).await?);
    }
    Ok(all)
  }

  /// Read and decode one block
  /// 读取并解码一个块
  async fn read_block(&self, block: &BlockMeta) -> Result<Vec<(Box<[u8]>, u64, Entry)>> {
    let file = open_read(&self.path).await?;
    let size = block.size as usize;

    let buf = vec![0u8; size];
    let slice = buf.slice(0..size);
    let res = file.read_exact_at(slice, block.offset).await;
    res.0?;
    let buf = res.1.into_inner();

    decode_block(&buf)
  }
}
