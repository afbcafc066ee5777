//! Table file ID encoding/decoding
//! 表文件 ID 编码/解码

use std::path::{Path, PathBuf};

use fast32::base32::CROCKFORD_LOWER;

/// Encode id to base32 string
/// 将 id 编码为 base32 字符串
#[inline(always)]
pub fn encode_id(id: u64) -> String {
  CROCKFORD_LOWER.encode_u64(id)
}

/// Decode base32 string to id
/// 将 base32 字符串解码为 id
#[inline(always)]
pub fn decode_id(name: &str) -> Option<u64> {
  CROCKFORD_LOWER.decode_u64(name.as_bytes()).ok()
}

/// Join dir with encoded id
/// 将目录与编码后的 id 拼接
#[inline(always)]
pub fn id_path(dir: &Path, id: u64) -> PathBuf {
  dir.join(encode_id(id))
}
