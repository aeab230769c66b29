//! FileSnapshotStore - スナップショットをファイルに保存・読み込み
//!
//! # 実装詳細
//! - 書き込みは `<name>.tmp` に行い、`commit` で fsync してから本来のファイル名に rename する
//! - 途中で失敗した（`cancel` された）スナップショットは残さない
//! - 読み込み側はファイルが無ければ `None`

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::ports::consensus::SnapshotSink;

const SNAPSHOT_FILE: &str = "snapshot";

/// Directory holding the latest snapshot of one node.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Start a new snapshot; it replaces the current one only on `commit`.
    pub fn create(&self) -> io::Result<FileSnapshotSink> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp)?;
        Ok(FileSnapshotSink {
            path,
            tmp,
            file: Some(BufWriter::new(file)),
        })
    }

    /// Latest committed snapshot, if any.
    pub fn open(&self) -> io::Result<Option<BufReader<File>>> {
        match File::open(self.path()) {
            Ok(file) => Ok(Some(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub struct FileSnapshotSink {
    path: PathBuf,
    tmp: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSnapshotSink {
    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("snapshot sink already cancelled"))
    }

    /// Make the written snapshot the current one.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| io::Error::other("snapshot sink already cancelled"))?;
        file.flush()?;
        file.get_ref().sync_all()?;
        drop(file);
        fs::rename(&self.tmp, &self.path)?;
        info!(path = %self.path.display(), "snapshot committed");
        Ok(self.path.clone())
    }
}

impl Write for FileSnapshotSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn cancel(&mut self) -> io::Result<()> {
        self.file = None;
        remove_if_exists(&self.tmp)
    }
}

impl Drop for FileSnapshotSink {
    fn drop(&mut self) {
        // an uncommitted snapshot never survives
        if self.file.take().is_some() {
            let _ = remove_if_exists(&self.tmp);
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
