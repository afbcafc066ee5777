#![cfg_attr(docsrs, feature(doc_cfg))]

//! xdb_base - Shared helpers for xdb
//! xdb 共享工具
//!
//! File operations and table file naming.
//! 文件操作与表文件命名。

mod fs;
mod fs_id;

pub use fs::{open_read, open_write_create, read_all, read_file, write_file};
pub use fs_id::{decode_id, encode_id, id_path};
