#![cfg(feature = "std")]

use crate::backend::StorageBackend;
use s31_core::{S31Error, S31Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::vec::Vec;

/// Flash file system emulated by a host directory.
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        fs::create_dir_all(path.as_ref())?;
        Ok(Self { root: path.as_ref().to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl StorageBackend for FileSystemBackend {
    fn write(&mut self, name: &str, data: &[u8]) -> S31Result<usize> {
        let path = self.path_of(name);
        let tmp_path = path.with_extension("tmp");

        let written = {
            let mut file = OpenOptions::new()
                .write(true).create(true).truncate(true)
                .open(&tmp_path).map_err(|_| S31Error::HalError)?;

            let mut written = 0;
            while written < data.len() {
                match file.write(&data[written..]) {
                    Ok(0) => break,
                    Ok(n) => written += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }

            file.sync_all().map_err(|_| S31Error::HalError)?;
            written
        };

        // A short .tmp never replaces the previous good file.
        if written != data.len() {
            let _ = fs::remove_file(&tmp_path);
            return Ok(written);
        }

        // Rename is atomic; the old file stays valid until here.
        fs::rename(tmp_path, path).map_err(|_| S31Error::HalError)?;

        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }

        Ok(written)
    }

    fn read(&self, name: &str) -> S31Result<Vec<u8>> {
        let path = self.path_of(name);
        let mut file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => S31Error::NotFound,
            _ => S31Error::HalError,
        })?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|_| S31Error::HalError)?;
        Ok(buf)
    }

    fn delete(&mut self, name: &str) -> S31Result<()> {
        let path = self.path_of(name);
        if path.exists() {
            fs::remove_file(path).map_err(|_| S31Error::HalError)
        } else {
            Ok(())
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).exists()
    }
}
