use crate::core::file_tree::{EntryKind, VirtualFileTree};
use crate::core::state::{Deadline, Stage};
use crate::utils::error::{Result, ScaffoldError};
use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

/// A finished archive, either held in memory or spooled to an anonymous
/// temporary file that is removed when dropped.
#[derive(Debug)]
pub enum PackedArchive {
    Memory(Vec<u8>),
    Spooled { file: File, len: u64 },
}

impl PackedArchive {
    pub fn len(&self) -> u64 {
        match self {
            PackedArchive::Memory(bytes) => bytes.len() as u64,
            PackedArchive::Spooled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            PackedArchive::Memory(bytes) => Ok(bytes),
            PackedArchive::Spooled { mut file, len } => {
                let mut bytes = Vec::with_capacity(len as usize);
                file.seek(SeekFrom::Start(0))?;
                std::io::Read::read_to_end(&mut file, &mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

pub struct ArchivePackager;

impl ArchivePackager {
    /// Writes every tree entry, in tree order, into a ZIP on `writer`.
    ///
    /// All entries carry the ZIP epoch as their timestamp and fixed
    /// permissions, so the same tree always produces the same bytes.
    pub fn pack_into<W: Write + Seek>(
        tree: &VirtualFileTree,
        writer: W,
        deadline: &Deadline,
    ) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        for entry in tree.entries() {
            deadline.check(Stage::Packaging)?;
            match entry.kind {
                EntryKind::Directory => {
                    zip.add_directory(entry.path.as_str(), entry_options(0o755))
                        .map_err(packaging)?;
                }
                EntryKind::File { executable } => {
                    let mode = if executable { 0o755 } else { 0o644 };
                    zip.start_file(entry.path.as_str(), entry_options(mode))
                        .map_err(packaging)?;
                    zip.write_all(&entry.contents).map_err(packaging)?;
                }
            }
        }
        let writer = zip.finish().map_err(packaging)?;
        Ok(writer)
    }

    pub fn pack(tree: &VirtualFileTree, deadline: &Deadline) -> Result<Vec<u8>> {
        let cursor = Self::pack_into(tree, Cursor::new(Vec::new()), deadline)?;
        let bytes = cursor.into_inner();
        tracing::debug!("Packed {} entries into {} bytes", tree.len(), bytes.len());
        Ok(bytes)
    }

    /// Packs in memory for small trees and into an anonymous temp file once
    /// the tree's content exceeds `spool_threshold` bytes.
    pub fn pack_spooled(
        tree: &VirtualFileTree,
        deadline: &Deadline,
        spool_threshold: usize,
    ) -> Result<PackedArchive> {
        if tree.total_bytes() <= spool_threshold {
            return Ok(PackedArchive::Memory(Self::pack(tree, deadline)?));
        }

        let file = tempfile::tempfile().map_err(packaging)?;
        let mut file = Self::pack_into(tree, file, deadline)?;
        file.flush().map_err(packaging)?;
        let len = file.stream_position().map_err(packaging)?;
        file.seek(SeekFrom::Start(0)).map_err(packaging)?;
        tracing::debug!("Spooled {} entries into a {} byte temp file", tree.len(), len);
        Ok(PackedArchive::Spooled { file, len })
    }
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}

fn packaging(err: impl std::fmt::Display) -> ScaffoldError {
    ScaffoldError::Packaging {
        message: err.to_string(),
    }
}
