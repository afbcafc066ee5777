//! Error types for xdb
//! xdb 错误类型定义

use thiserror::Error;

use crate::IngestError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("Table: {0}")]
  Sst(#[from] xdb_sst::Error),

  #[error("Corruption: {msg}")]
  Corruption { msg: String },

  #[error("Conf: {msg}")]
  Conf { msg: String },

  #[error("Ingest: {0}")]
  Ingest(#[from] IngestError),
}

pub type Result<T> = std::result::Result<T, Error>;
