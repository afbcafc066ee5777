//! File operations utilities
//! 文件操作工具

use std::path::Path;

use compio::{
  buf::{IntoInner, IoBuf},
  fs::File,
  io::{AsyncReadAtExt, AsyncWriteAtExt},
};

/// Open file for reading
/// 打开文件用于读取
#[inline]
pub async fn open_read(path: impl AsRef<Path>) -> std::io::Result<File> {
  compio::fs::OpenOptions::new().read(true).open(path).await
}

/// Open file for writing, create if not exists
/// 打开文件用于写入，不存在则创建
#[inline]
pub async fn open_write_create(path: impl AsRef<Path>) -> std::io::Result<File> {
  compio::fs::OpenOptions::new()
    .write(true)
    .create(true)
    .open(path)
    .await
}

/// Write data to file at offset 0
/// 将数据写入文件（偏移 0）
#[inline]
pub async fn write_file(path: impl AsRef<Path>, data: &[u8]) -> std::io::Result<()> {
  let mut file = open_write_create(&path).await?;
  file.write_all_at(data.to_vec(), 0).await.0
}

/// Read len bytes from file start
/// 从文件起始读取 len 字节
#[inline]
pub async fn read_all(file: &File, len: u64) -> std::io::Result<Vec<u8>> {
  if len == 0 {
    return Ok(Vec::new());
  }

  let len = len as usize;
  let buf = vec![0u8; len];
  let slice = buf.slice(0..len);
  let res = file.read_exact_at(slice, 0).await;
  res.0?;
  Ok(res.1.into_inner())
}

/// Read entire file into Vec
/// 读取整个文件到 Vec
pub async fn read_file(path: impl AsRef<Path>) -> std::io::Result<Vec<u8>> {
  let file = open_read(path).await?;
  let meta = file.metadata().await?;
  read_all(&file, meta.len()).await
}
