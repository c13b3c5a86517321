#![forbid(unsafe_code)]

//! The `Package` façade: part store plus parsed metadata registries.

use crate::content_types::{ContentTypes, CONTENT_TYPES_PART};
use crate::relationships::Relationships;
use crate::store::PartStore;
use crate::uri;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sigtuna_core::{Error, Result};
use std::path::Path;

pub use crate::store::FileMode;

/// An opened OPC package. Single-owner: one `Package` mutates one archive.
pub struct Package {
    store: PartStore,
    content_types: ContentTypes,
    rels: Vec<Relationships>,
    rng: Box<dyn RngCore>,
}

impl Package {
    /// Open a package from disk and parse its metadata parts.
    pub fn open(path: &Path, mode: FileMode) -> Result<Self> {
        let store = PartStore::open(path, mode)?;

        let content_types = if store.contains(CONTENT_TYPES_PART) {
            let xml = String::from_utf8(store.read(CONTENT_TYPES_PART)?.to_vec())
                .map_err(|e| Error::MalformedPackage(format!("content types: {e}")))?;
            ContentTypes::parse(&xml)?
        } else {
            return Err(Error::MalformedPackage(
                "package has no [Content_Types].xml".into(),
            ));
        };

        let rels_parts: Vec<String> = store
            .part_names()
            .filter(|name| uri::is_rels_part(name))
            .map(str::to_owned)
            .collect();
        let mut rels = Vec::new();
        for rels_part in rels_parts {
            let source = uri::source_part_for_rels(&rels_part).ok_or_else(|| {
                Error::MalformedPackage(format!("unplaceable relationships part: {rels_part}"))
            })?;
            let xml = String::from_utf8(store.read(&rels_part)?.to_vec())
                .map_err(|e| Error::MalformedPackage(format!("{rels_part}: {e}")))?;
            rels.push(Relationships::parse(&source, &xml)?);
        }

        Ok(Self {
            store,
            content_types,
            rels,
            rng: Box::new(StdRng::from_entropy()),
        })
    }

    /// Replace the randomness source used for id generation.
    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.rng = rng;
    }

    /// The package's randomness source (relationship ids, signature part
    /// names, timestamp nonces all draw from here).
    pub fn rng_mut(&mut self) -> &mut dyn RngCore {
        self.rng.as_mut()
    }

    pub fn mode(&self) -> FileMode {
        self.store.mode()
    }

    pub fn is_read_only(&self) -> bool {
        self.store.mode() == FileMode::ReadOnly
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    // ── Parts ────────────────────────────────────────────────────────

    pub fn part_names(&self) -> Vec<String> {
        self.store.part_names().map(str::to_owned).collect()
    }

    pub fn has_part(&self, part_uri: &str) -> bool {
        self.store.contains(part_uri)
    }

    pub fn read_part(&self, part_uri: &str) -> Result<&[u8]> {
        self.store.read(part_uri)
    }

    pub fn write_part(&mut self, part_uri: &str, data: Vec<u8>) -> Result<()> {
        self.store.write(part_uri, data)
    }

    pub fn delete_part(&mut self, part_uri: &str) -> Result<bool> {
        self.store.delete(part_uri)
    }

    // ── Content types ────────────────────────────────────────────────

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> Result<&mut ContentTypes> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(&mut self.content_types)
    }

    pub fn content_type_of(&self, part_uri: &str) -> Result<&str> {
        self.content_types.resolve(part_uri)
    }

    // ── Relationships ────────────────────────────────────────────────

    /// The relationships owned by `source` (`/` for the root), if any.
    pub fn relationships(&self, source: &str) -> Option<&Relationships> {
        self.rels
            .iter()
            .find(|r| uri::eq_ignore_case(r.source(), source))
    }

    /// Sources that currently own a non-empty relationship collection.
    pub fn relationship_sources(&self) -> Vec<String> {
        self.rels
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.source().to_owned())
            .collect()
    }

    /// Add a relationship, generating a fresh id. Creates the collection
    /// when the source does not own one yet.
    pub fn add_relationship(
        &mut self,
        source: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<String> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        let idx = match self
            .rels
            .iter()
            .position(|r| uri::eq_ignore_case(r.source(), source))
        {
            Some(idx) => idx,
            None => {
                self.rels.push(Relationships::new(source));
                self.rels.len() - 1
            }
        };
        Ok(self.rels[idx].add(rel_type, target, self.rng.as_mut()))
    }

    /// Remove a relationship by id; returns whether it existed.
    pub fn remove_relationship(&mut self, source: &str, id: &str) -> Result<bool> {
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(self
            .rels
            .iter_mut()
            .find(|r| uri::eq_ignore_case(r.source(), source))
            .is_some_and(|r| r.remove(id)))
    }

    // ── Flush ────────────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
            || self.content_types.is_dirty()
            || self.rels.iter().any(|r| r.is_dirty())
    }

    /// Materialize all buffered mutations: re-serialize dirty registries,
    /// then rewrite the archive atomically.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        if self.is_read_only() {
            return Err(Error::ReadOnly);
        }

        if self.content_types.is_dirty() {
            let xml = self.content_types.serialize();
            self.store.write(CONTENT_TYPES_PART, xml.into_bytes())?;
            self.content_types.mark_clean();
        }

        let mut writes: Vec<(String, Option<String>)> = Vec::new();
        for rels in self.rels.iter_mut().filter(|r| r.is_dirty()) {
            let rels_part = uri::rels_part_for(rels.source());
            if rels.is_empty() {
                writes.push((rels_part, None));
            } else {
                writes.push((rels_part, Some(rels.serialize())));
            }
            rels.mark_clean();
        }
        for (rels_part, xml) in writes {
            match xml {
                Some(xml) => self.store.write(&rels_part, xml.into_bytes())?,
                None => {
                    self.store.delete(&rels_part)?;
                }
            }
        }
        self.rels.retain(|r| !r.is_empty());

        self.store.flush()
    }
}
