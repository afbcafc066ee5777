//! External file ingestion tests
//! 外部文件摄入测试

use std::path::{Path, PathBuf};

use aok::{OK, Void};
use xdb::{Conf, DEFAULT_CF, Db, Error, IngestError, IngestOpt};
use xdb_sst::Writer;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

/// Build an external table file from sorted (key, value) items
/// 从有序 (键, 值) 条目构建外部表文件
async fn build_file(path: &Path, items: &[(&[u8], Option<&[u8]>)]) -> Void {
  let mut writer = Writer::new(path, 0).await?;
  for (key, val) in items {
    match val {
      Some(val) => writer.put(key, val).await?,
      None => writer.del(key).await?,
    }
  }
  writer.finish().await?;
  OK
}

#[test]
fn test_non_overlapping_succeeds_regardless_of_flags() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    for (allow_global_seq, allow_blocking_flush) in
      [(true, true), (true, false), (false, true), (false, false)]
    {
      let dir = tempfile::tempdir()?;
      let ext = tempfile::tempdir()?;
      let mut db = Db::open(dir.path(), &[]).await?;

      // Unflushed data far away from the ingested range
      // 与摄入范围相距很远的未刷写数据
      db.put(DEFAULT_CF, b"a", b"1").await?;
      db.put(DEFAULT_CF, b"b", b"2").await?;

      let file = ext.path().join("ext");
      build_file(&file, &[(b"x".as_slice(), Some(b"24".as_slice())), (b"z".as_slice(), Some(b"26".as_slice()))]).await?;

      let opt = IngestOpt::default()
        .allow_global_seq(allow_global_seq)
        .allow_blocking_flush(allow_blocking_flush);
      db.ingest(DEFAULT_CF, &[file], &opt).await?;

      assert_eq!(
        db.get(DEFAULT_CF, b"x").await?.as_deref(),
        Some(b"24".as_slice()),
        "combo ({allow_global_seq}, {allow_blocking_flush})"
      );
      assert_eq!(db.get(DEFAULT_CF, b"z").await?.as_deref(), Some(b"26".as_slice()));

      // Existing data untouched
      // 已有数据不受影响
      assert_eq!(db.get(DEFAULT_CF, b"a").await?.as_deref(), Some(b"1".as_slice()));
    }
    OK
  })
}

#[test]
fn test_flush_required() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    db.put(DEFAULT_CF, b"k1", b"mem").await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"k0".as_slice(), Some(b"x".as_slice())), (b"k2".as_slice(), Some(b"y".as_slice()))]).await?;

    let opt = IngestOpt::default().allow_blocking_flush(false);
    let err = db
      .ingest(DEFAULT_CF, &[file.clone()], &opt)
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::FlushRequired)));

    // Visible state unchanged
    // 可见状态不变
    assert_eq!(db.get(DEFAULT_CF, b"k1").await?.as_deref(), Some(b"mem".as_slice()));
    assert_eq!(db.get(DEFAULT_CF, b"k0").await?, None);
    assert_eq!(db.get(DEFAULT_CF, b"k2").await?, None);

    // Same call with blocking flush allowed goes through
    // 允许阻塞刷写后同一调用成功
    db.ingest(DEFAULT_CF, &[file], &IngestOpt::default()).await?;
    assert_eq!(db.get(DEFAULT_CF, b"k0").await?.as_deref(), Some(b"x".as_slice()));
    OK
  })
}

#[test]
fn test_blocking_flush_then_ingest_wins() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    db.put(DEFAULT_CF, b"k1", b"old").await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"k1".as_slice(), Some(b"new".as_slice())), (b"k5".as_slice(), Some(b"five".as_slice()))]).await?;

    db.ingest(DEFAULT_CF, &[file], &IngestOpt::default()).await?;

    // Memtable was flushed synchronously during the call
    // 内存表在调用期间被同步刷写
    let cf = db.cf_peek(DEFAULT_CF).expect("cf exists");
    assert!(cf.mem.is_empty());
    assert!(cf.frozen.is_empty());

    // The ingested file carries the freshest sequence number
    // 摄入的文件携带最新的序列号
    assert_eq!(db.get(DEFAULT_CF, b"k1").await?.as_deref(), Some(b"new".as_slice()));
    assert_eq!(db.get(DEFAULT_CF, b"k5").await?.as_deref(), Some(b"five".as_slice()));
    OK
  })
}

#[test]
fn test_overlap_not_allowed() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    db.put(DEFAULT_CF, b"k1", b"persisted").await?;
    db.flush_all(DEFAULT_CF).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"k0".as_slice(), Some(b"x".as_slice())), (b"k2".as_slice(), Some(b"y".as_slice()))]).await?;

    let opt = IngestOpt::default().allow_global_seq(false);
    let err = db
      .ingest(DEFAULT_CF, &[file], &opt)
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::OverlapNotAllowed)));

    // Visible state unchanged
    // 可见状态不变
    assert_eq!(
      db.get(DEFAULT_CF, b"k1").await?.as_deref(),
      Some(b"persisted".as_slice())
    );
    assert_eq!(db.get(DEFAULT_CF, b"k0").await?, None);
    OK
  })
}

#[test]
fn test_ingest_behind_requires_capability() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"h".as_slice(), Some(b"hist".as_slice()))]).await?;

    let opt = IngestOpt::default().allow_ingest_behind(true);
    let err = db
      .ingest(DEFAULT_CF, &[file], &opt)
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::CapabilityNotEnabled)));
    assert_eq!(db.get(DEFAULT_CF, b"h").await?, None);
    OK
  })
}

#[test]
fn test_ingest_behind_never_shadows_newer_data() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[Conf::IngestBehind(true)]).await?;

    db.put(DEFAULT_CF, b"k", b"new").await?;
    db.flush_all(DEFAULT_CF).await?;

    // Backfill carries a stale duplicate of k plus a historical key
    // 回填携带 k 的陈旧副本以及一个历史键
    let file = ext.path().join("ext");
    build_file(&file, &[(b"hist".as_slice(), Some(b"old-data".as_slice())), (b"k".as_slice(), Some(b"stale".as_slice()))]).await?;

    let opt = IngestOpt::default().allow_ingest_behind(true);
    db.ingest(DEFAULT_CF, &[file], &opt).await?;

    // Duplicate key is shadowed by the newer existing value
    // 重复键被更新的已有值遮蔽
    assert_eq!(db.get(DEFAULT_CF, b"k").await?.as_deref(), Some(b"new".as_slice()));
    assert_eq!(
      db.get(DEFAULT_CF, b"hist").await?.as_deref(),
      Some(b"old-data".as_slice())
    );

    // Placed at the bottommost level with seq 0
    // 放置在最底层且序列号为 0
    let cf = db.cf_peek(DEFAULT_CF).expect("cf exists");
    let bottom = cf.levels.last().expect("levels non-empty");
    assert_eq!(bottom.len(), 1);
    assert_eq!(bottom.tables[0].seq, 0);
    OK
  })
}

#[test]
fn test_snapshot_never_sees_ingested_keys() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    db.put(DEFAULT_CF, b"base", b"before").await?;
    db.flush_all(DEFAULT_CF).await?;

    let snap = db.snapshot(DEFAULT_CF);

    // Interleaved ordinary write after the snapshot
    // 快照之后交错的普通写入
    db.put(DEFAULT_CF, b"w", b"after-snap").await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"ing1".as_slice(), Some(b"i1".as_slice())), (b"ing2".as_slice(), Some(b"i2".as_slice()))]).await?;
    db.ingest(DEFAULT_CF, &[file], &IngestOpt::default()).await?;

    // The snapshot observes neither ingested keys nor later writes
    // 快照既看不到摄入的键也看不到之后的写入
    assert_eq!(snap.get(b"ing1").await?, None);
    assert_eq!(snap.get(b"ing2").await?, None);
    assert_eq!(snap.get(b"base").await?.as_deref(), Some(b"before".as_slice()));

    // The live view does
    // 实时视图可以看到
    assert_eq!(db.get(DEFAULT_CF, b"ing1").await?.as_deref(), Some(b"i1".as_slice()));

    drop(snap);
    OK
  })
}

#[test]
fn test_mutually_overlapping_files_rejected() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let f1 = ext.path().join("f1");
    let f2 = ext.path().join("f2");
    build_file(&f1, &[(b"a".as_slice(), Some(b"1".as_slice())), (b"c".as_slice(), Some(b"3".as_slice()))]).await?;
    build_file(&f2, &[(b"b".as_slice(), Some(b"2".as_slice())), (b"d".as_slice(), Some(b"4".as_slice()))]).await?;

    let err = db
      .ingest(DEFAULT_CF, &[f1, f2], &IngestOpt::default())
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::InvalidInput { .. })));
    assert_eq!(db.get(DEFAULT_CF, b"a").await?, None);
    OK
  })
}

#[test]
fn test_disjoint_batch_in_one_call() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    // Unordered paths, disjoint ranges
    // 路径乱序，范围互不重叠
    let f1 = ext.path().join("f1");
    let f2 = ext.path().join("f2");
    build_file(&f1, &[(b"m".as_slice(), Some(b"13".as_slice()))]).await?;
    build_file(&f2, &[(b"c".as_slice(), Some(b"3".as_slice())), (b"f".as_slice(), Some(b"6".as_slice()))]).await?;

    db.ingest(DEFAULT_CF, &[f1, f2], &IngestOpt::default()).await?;

    assert_eq!(db.get(DEFAULT_CF, b"m").await?.as_deref(), Some(b"13".as_slice()));
    assert_eq!(db.get(DEFAULT_CF, b"c").await?.as_deref(), Some(b"3".as_slice()));
    assert_eq!(db.get(DEFAULT_CF, b"f").await?.as_deref(), Some(b"6".as_slice()));
    OK
  })
}

#[test]
fn test_move_files() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"q".as_slice(), Some(b"17".as_slice()))]).await?;

    let opt = IngestOpt::default().move_files(true);
    db.ingest(DEFAULT_CF, &[file.clone()], &opt).await?;

    // Source was renamed away
    // 源文件已被重命名移走
    assert!(!file.exists());
    assert_eq!(db.get(DEFAULT_CF, b"q").await?.as_deref(), Some(b"17".as_slice()));
    OK
  })
}

#[test]
fn test_copy_keeps_source() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"q".as_slice(), Some(b"17".as_slice()))]).await?;

    db.ingest(DEFAULT_CF, &[file.clone()], &IngestOpt::default()).await?;

    // Source intact
    // 源文件保持原样
    assert!(file.exists());
    assert_eq!(db.get(DEFAULT_CF, b"q").await?.as_deref(), Some(b"17".as_slice()));
    OK
  })
}

#[test]
fn test_corrupt_file_rejected() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"k".as_slice(), Some(b"v".as_slice()))]).await?;

    // Flip one byte
    // 翻转一个字节
    let mut data = std::fs::read(&file)?;
    data[0] ^= 0xff;
    std::fs::write(&file, &data)?;

    let err = db
      .ingest(DEFAULT_CF, &[file], &IngestOpt::default())
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::InvalidInput { .. })));
    assert_eq!(db.get(DEFAULT_CF, b"k").await?, None);
    OK
  })
}

#[test]
fn test_empty_file_list_rejected() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[]).await?;

    let files: Vec<PathBuf> = Vec::new();
    let err = db
      .ingest(DEFAULT_CF, &files, &IngestOpt::default())
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::InvalidInput { .. })));
    OK
  })
}

#[test]
fn test_behind_without_global_seq_rejected() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;
    let mut db = Db::open(dir.path(), &[Conf::IngestBehind(true)]).await?;

    let file = ext.path().join("ext");
    build_file(&file, &[(b"h".as_slice(), Some(b"hist".as_slice()))]).await?;

    // Seq-0 stamping is a whole-file sequence assignment
    // 序列号 0 的整体盖章也是整文件序列号指派
    let opt = IngestOpt::default()
      .allow_ingest_behind(true)
      .allow_global_seq(false);
    let err = db
      .ingest(DEFAULT_CF, &[file], &opt)
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Ingest(IngestError::InvalidInput { .. })));
    OK
  })
}

#[test]
fn test_reopen_after_ingest() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;
    let ext = tempfile::tempdir()?;

    {
      let mut db = Db::open(dir.path(), &[]).await?;
      db.put(DEFAULT_CF, b"a", b"1").await?;
      db.flush_all(DEFAULT_CF).await?;

      let file = ext.path().join("ext");
      build_file(&file, &[(b"x".as_slice(), Some(b"24".as_slice()))]).await?;
      db.ingest(DEFAULT_CF, &[file], &IngestOpt::default()).await?;
    }

    // Recovery reloads the ingested table from the manifest
    // 恢复时从清单重新加载摄入的表
    let db = Db::open(dir.path(), &[]).await?;
    assert_eq!(db.get(DEFAULT_CF, b"a").await?.as_deref(), Some(b"1".as_slice()));
    assert_eq!(db.get(DEFAULT_CF, b"x").await?.as_deref(), Some(b"24".as_slice()));
    OK
  })
}

#[test]
fn test_capability_mismatch_on_reopen() -> Void {
  compio::runtime::Runtime::new()?.block_on(async {
    let dir = tempfile::tempdir()?;

    {
      let _db = Db::open(dir.path(), &[]).await?;
    }

    // The capability must hold since creation
    // 能力必须自创建起保持
    let err = Db::open(dir.path(), &[Conf::IngestBehind(true)])
      .await
      .expect_err("must fail");
    assert!(matches!(err, Error::Conf { .. }));
    OK
  })
}
