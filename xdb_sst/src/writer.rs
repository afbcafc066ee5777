//! Table writer
//! 表写入器
//!
//! Also the public builder for externally ingestible files: keys must be
//! added in strictly ascending order.
//! 同时是外部摄入文件的公开构建器：键必须严格升序添加。

use std::path::PathBuf;

use compio::fs::File;
use crc32fast::Hasher;
use zerocopy::IntoBytes;

use crate::{
  BlockMeta, Entry, Error, FooterBuilder, Result, TableMeta, block::encode_entry,
};

/// Default block size (4KB)
/// 默认块大小（4KB）
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Table writer
/// 表写入器
pub struct Writer {
  path: PathBuf,
  file: File,
  buf: Vec<u8>,
  block_size: usize,
  blocks: Vec<BlockMeta>,
  meta: TableMeta,
  offset: u64,
  last_key: Option<Box<[u8]>>,
  hasher: Hasher,
}

impl Writer {
  /// Create writer for path
  /// 创建路径的写入器
  pub async fn new(path: impl Into<PathBuf>, id: u64) -> Result<Self> {
    let path = path.into();
    let file = File::create(&path).await?;
    Ok(Self {
      path,
      file,
      buf: Vec::with_capacity(DEFAULT_BLOCK_SIZE),
      block_size: DEFAULT_BLOCK_SIZE,
      blocks: Vec::new(),
      meta: TableMeta::new(id),
      offset: 0,
      last_key: None,
      hasher: Hasher::new(),
    })
  }

  /// Set block size
  /// 设置块大小
  #[inline]
  pub fn block_size(mut self, size: usize) -> Self {
    self.block_size = size.max(1024);
    self
  }

  /// Add value entry with seq 0 (external file builder API)
  /// 添加序列号为 0 的值条目（外部文件构建器 API）
  #[inline]
  pub async fn put(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
    self.add(key, 0, &Entry::Value(val.into())).await
  }

  /// Add tombstone entry with seq 0 (external file builder API)
  /// 添加序列号为 0 的删除标记条目（外部文件构建器 API）
  #[inline]
  pub async fn del(&mut self, key: &[u8]) -> Result<()> {
    self.add(key, 0, &Entry::Tombstone).await
  }

  /// Add key-entry pair (keys must be strictly ascending)
  /// 添加键-条目对（键必须严格升序）
  pub async fn add(&mut self, key: &[u8], seq: u64, entry: &Entry) -> Result<()> {
    if key.len() > u16::MAX as usize {
      return Err(Error::KeyTooLong { len: key.len() });
    }

    if let Some(last) = &self.last_key
      && key <= last.as_ref()
    {
      return Err(Error::Unsorted);
    }

    if self.meta.item_count == 0 {
      self.meta.min_key = key.to_vec();
    }

    encode_entry(&mut self.buf, key, seq, entry);
    self.last_key = Some(key.into());
    self.meta.item_count += 1;
    if entry.is_tombstone() {
      self.meta.rm_count += 1;
    }
    if seq > self.meta.seq {
      self.meta.seq = seq;
    }

    if self.buf.len() >= self.block_size {
      self.flush_block().await?;
    }
    Ok(())
  }

  async fn flush_block(&mut self) -> Result<()> {
    if self.buf.is_empty() {
      return Ok(());
    }

    let last_key = match &self.last_key {
      Some(key) => key.to_vec(),
      None => return Ok(()),
    };

    let data = std::mem::take(&mut self.buf);
    self.blocks.push(BlockMeta {
      last_key,
      offset: self.offset,
      size: data.len() as u32,
    });
    self.hasher.update(&data);
    self.write(&data).await?;
    Ok(())
  }

  async fn write(&mut self, data: &[u8]) -> Result<()> {
    use compio::io::AsyncWriteAtExt;

    let res = self.file.write_all_at(data.to_vec(), self.offset).await;
    res.0?;
    self.offset += data.len() as u64;
    Ok(())
  }

  /// Finish table: write index, meta and footer, sync to disk
  /// 完成表：写入索引、元数据与尾部，同步到磁盘
  pub async fn finish(mut self) -> Result<TableMeta> {
    self.flush_block().await?;

    if self.meta.item_count == 0 {
      drop(self.file);
      if let Err(e) = compio::fs::remove_file(&self.path).await {
        log::warn!("rm empty table {}: {e}", self.path.display());
      }
      return Err(Error::Empty);
    }

    if let Some(key) = &self.last_key {
      self.meta.max_key = key.to_vec();
    }

    // Write index
    // 写入索引
    let index_offset = self.offset;
    let index_data = bitcode::encode(&self.blocks);
    self.hasher.update(&index_data);
    self.write(&index_data).await?;
    let index_size = (self.offset - index_offset) as u32;

    // Write meta (file_size is taken from the file itself at load)
    // 写入元数据（file_size 加载时取自文件本身）
    let meta_offset = self.offset;
    let meta_data = bitcode::encode(&self.meta);
    self.hasher.update(&meta_data);
    self.write(&meta_data).await?;
    let meta_size = (self.offset - meta_offset) as u32;

    // Write footer
    // 写入尾部
    let checksum = self.hasher.clone().finalize();
    let footer = FooterBuilder {
      index_offset,
      index_size,
      meta_offset,
      meta_size,
      checksum,
    }
    .build();
    self.write(footer.as_bytes()).await?;
    self.file.sync_all().await?;

    self.meta.file_size = self.offset;
    Ok(self.meta)
  }
}
