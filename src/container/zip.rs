//! Zip/cbz archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use ::zip::ZipArchive;
use tracing::debug;

use super::{display_name, image_indices, Container, ContainerDownload, ContainerItem};
use crate::domain::ContainerKind;
use crate::error::{LibraryError, Result};

/// Upper bound on the buffer reserved from a member's declared size
const PREALLOC_LIMIT: u64 = 64 << 20;

fn capacity_hint(declared: u64) -> usize {
    declared.min(PREALLOC_LIMIT) as usize
}

/// Pages stored as members of a zip archive
#[derive(Debug, Clone)]
pub struct ZipContainer {
    path: PathBuf,
    file_indices: Vec<usize>,
    extensions: Vec<String>,
}

impl ZipContainer {
    pub fn new(path: PathBuf, file_indices: Vec<usize>, extensions: Vec<String>) -> Self {
        Self {
            path,
            file_indices,
            extensions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_archive(&self) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LibraryError::ContainerNotFound(self.path.clone()),
            _ => LibraryError::Io(e),
        })?;

        Ok(ZipArchive::new(BufReader::new(file))?)
    }

    fn page_not_found(&self, index: usize) -> LibraryError {
        LibraryError::PageNotFound {
            entry: self.path.display().to_string(),
            index,
        }
    }
}

impl Container for ZipContainer {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Zip
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        let mut archive = self.open_archive()?;
        let mut names = Vec::with_capacity(self.file_indices.len());

        for (page, &native) in self.file_indices.iter().enumerate() {
            if native >= archive.len() {
                return Err(self.page_not_found(page));
            }
            names.push(archive.by_index_raw(native)?.name().to_string());
        }

        Ok(names)
    }

    fn open_entry(&self, index: usize) -> Result<ContainerItem> {
        let native = *self
            .file_indices
            .get(index)
            .ok_or_else(|| self.page_not_found(index))?;

        let mut archive = self.open_archive()?;
        if native >= archive.len() {
            return Err(self.page_not_found(index));
        }

        let mut member = archive.by_index(native)?;
        let name = display_name(member.name(), index);

        let mut data = Vec::with_capacity(capacity_hint(member.size()));
        member.read_to_end(&mut data)?;

        debug!(path = %self.path.display(), index, native, bytes = data.len(), "Read zip member");

        Ok(ContainerItem { name, data })
    }

    fn download(&self) -> Result<ContainerDownload> {
        let data = std::fs::read(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LibraryError::ContainerNotFound(self.path.clone()),
            _ => LibraryError::Io(e),
        })?;

        let filename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download.zip".to_string());

        Ok(ContainerDownload { filename, data })
    }

    fn content_indices(&self) -> Result<Vec<usize>> {
        let mut archive = self.open_archive()?;
        let mut names = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let member = archive.by_index_raw(i)?;
            // Directory members keep their slot so positions stay native
            if member.is_dir() {
                names.push(String::new());
            } else {
                names.push(member.name().to_string());
            }
        }

        Ok(image_indices(&names, &self.extensions))
    }
}
