#![forbid(unsafe_code)]

//! ZIP part store.
//!
//! All entries are loaded into memory on open; writes and deletes mutate
//! the in-memory map only. `flush` rewrites the complete archive to a
//! temporary file and renames it over the original, so a failed flush
//! leaves the original file intact.

use crate::uri;
use sigtuna_core::{Error, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Whether the package may be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    ReadOnly,
    ReadWrite,
}

/// An OPC package's parts, keyed by normalized part URI.
pub struct PartStore {
    path: PathBuf,
    mode: FileMode,
    entries: BTreeMap<String, Vec<u8>>,
    dirty: bool,
}

impl PartStore {
    /// Open a package file and load every entry.
    pub fn open(path: &Path, mode: FileMode) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| Error::MalformedPackage(format!("not a ZIP archive: {e}")))?;

        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| Error::MalformedPackage(format!("bad ZIP entry: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = uri::normalize(entry.name());
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            entries.insert(name, data);
        }

        log::debug!("opened {} with {} parts", path.display(), entries.len());
        Ok(Self {
            path: path.to_owned(),
            mode,
            entries,
            dirty: false,
        })
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a part URI to the stored key, case-insensitively.
    fn find_key(&self, part_uri: &str) -> Option<&String> {
        self.entries
            .keys()
            .find(|k| uri::eq_ignore_case(k, part_uri))
    }

    pub fn contains(&self, part_uri: &str) -> bool {
        self.find_key(part_uri).is_some()
    }

    /// Read a part's bytes.
    pub fn read(&self, part_uri: &str) -> Result<&[u8]> {
        let key = self
            .find_key(part_uri)
            .ok_or_else(|| Error::MalformedPackage(format!("missing part: {part_uri}")))?;
        Ok(self.entries[key].as_slice())
    }

    /// Write (or replace) a part.
    pub fn write(&mut self, part_uri: &str, data: Vec<u8>) -> Result<()> {
        if self.mode == FileMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        let key = match self.find_key(part_uri) {
            Some(existing) => existing.clone(),
            None => part_uri.to_owned(),
        };
        self.entries.insert(key, data);
        self.dirty = true;
        Ok(())
    }

    /// Delete a part; returns whether it existed.
    pub fn delete(&mut self, part_uri: &str) -> Result<bool> {
        if self.mode == FileMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        match self.find_key(part_uri).cloned() {
            Some(key) => {
                self.entries.remove(&key);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All part URIs, in stable (byte-wise) order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Materialize buffered state: rewrite the archive via temp + rename.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.mode == FileMode::ReadOnly {
            return Err(Error::ReadOnly);
        }

        let tmp_path = self.temp_path();
        let result = self.write_archive(&tmp_path).and_then(|()| {
            std::fs::rename(&tmp_path, &self.path).map_err(Error::Io)
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
            return result;
        }

        log::debug!(
            "flushed {} parts to {}",
            self.entries.len(),
            self.path.display()
        );
        self.dirty = false;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_owned());
        self.path
            .with_file_name(format!("{file_name}.{}.tmp", std::process::id()))
    }

    fn write_archive(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, data) in &self.entries {
            writer
                .start_file(uri::to_zip_name(name), options)
                .map_err(|e| Error::MalformedPackage(format!("ZIP write failed: {e}")))?;
            writer.write_all(data)?;
        }
        writer
            .finish()
            .map_err(|e| Error::MalformedPackage(format!("ZIP finalize failed: {e}")))?;
        Ok(())
    }
}
