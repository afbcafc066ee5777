//! Error types for xdb_sst
//! xdb_sst 错误类型定义

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("Corruption: {msg}")]
  Corruption { msg: String },

  #[error("Key not in ascending order")]
  Unsorted,

  #[error("Key too long: {len} bytes")]
  KeyTooLong { len: usize },

  #[error("Table has no entries")]
  Empty,
}

pub type Result<T> = std::result::Result<T, Error>;
