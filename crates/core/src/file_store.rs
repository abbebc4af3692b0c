// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Document store persisted as one pretty-printed JSON file.
//!
//! Every operation re-reads the file under an advisory lock, so edits made
//! by other processes are picked up on the next read. There are no change
//! notifications; the reverse channel polls this backend.
//!
//! File access and lock waits run on tokio's blocking pool.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{DocumentStore, FieldUpdate, StoreFuture};
use crate::tree::DocTree;

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Opens the store at `path`, creating an empty one if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        let store = FileStore {
            path,
            lock_path: PathBuf::from(lock_path),
        };

        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !store.path.exists() {
            store.save(&DocTree::new())?;
        } else {
            // Fail at startup rather than on the first sync.
            store.load()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        Ok(file)
    }

    fn load(&self) -> Result<DocTree> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DocTree::new()),
            Err(e) => return Err(e.into()),
        };
        if json.trim().is_empty() {
            return Ok(DocTree::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    fn save(&self, tree: &DocTree) -> Result<()> {
        let json = serde_json::to_string_pretty(tree)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn inspect<T>(&self, f: impl FnOnce(&DocTree) -> T) -> Result<T> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let result = self.load().map(|tree| f(&tree));
        let _ = FileExt::unlock(&lock);
        result
    }

    async fn inspect_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocTree) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.inspect(f))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    async fn modify_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DocTree) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.modify(f))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    fn modify<T>(&self, f: impl FnOnce(&mut DocTree) -> Result<T>) -> Result<T> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        let result = self.load().and_then(|mut tree| {
            let out = f(&mut tree)?;
            self.save(&tree)?;
            Ok(out)
        });
        let _ = FileExt::unlock(&lock);
        result
    }
}

impl DocumentStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn read<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Option<Value>> {
        let path = path.to_string();
        Box::pin(self.inspect_blocking(move |tree| tree.read(&path)))
    }

    fn write<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        let path = path.to_string();
        Box::pin(self.modify_blocking(move |tree| tree.write(&path, value)))
    }

    fn update<'a>(
        &'a self,
        path: &'a str,
        updates: Vec<(String, FieldUpdate)>,
    ) -> StoreFuture<'a, ()> {
        let path = path.to_string();
        Box::pin(self.modify_blocking(move |tree| {
            tree.update(&path, &updates);
            Ok(())
        }))
    }

    fn delete<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool> {
        let path = path.to_string();
        Box::pin(self.modify_blocking(move |tree| Ok(tree.delete(&path))))
    }

    fn is_collection<'a>(&'a self, path: &'a str) -> StoreFuture<'a, bool> {
        let path = path.to_string();
        Box::pin(self.inspect_blocking(move |tree| tree.is_collection(&path)))
    }

    fn entry_count<'a>(&'a self, path: &'a str, stem: &'a str) -> StoreFuture<'a, u64> {
        let path = path.to_string();
        let stem = stem.to_string();
        Box::pin(self.inspect_blocking(move |tree| tree.entry_count(&path, &stem)))
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
