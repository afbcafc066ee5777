#![cfg_attr(docsrs, feature(doc_cfg))]

//! xdb - Embedded LSM KV engine with external-file ingestion
//! xdb - 支持外部文件摄入的嵌入式 LSM KV 引擎

mod cf;
mod conf;
mod db;
mod error;
mod ingest;
mod level;
mod manifest;
mod memtable;
mod opt;
mod snapshot;

pub use cf::Cf;
pub use conf::Conf;
pub use db::{DEFAULT_CF, Db};
pub use error::{Error, Result};
pub use ingest::{IngestError, IngestState};
pub use level::{Level, TableHandle};
pub use manifest::{
  CfMeta, LevelMeta, Manifest, TableEntry, load_manifest, manifest_path, save_manifest,
};
pub use memtable::{Entry, Memtable};
pub use opt::IngestOpt;
pub use snapshot::{Snapshot, SnapshotSet};
