//! Plain directories of image files.
//!
//! Native order is a depth-first walk with siblings sorted by file name.
//! Member paths are relative to the container root and always use `/`.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipWriter};
use walkdir::WalkDir;

use super::{display_name, image_indices, Container, ContainerDownload, ContainerItem};
use crate::domain::ContainerKind;
use crate::error::{LibraryError, Result};

/// Pages stored as files under a directory
#[derive(Debug, Clone)]
pub struct DirectoryContainer {
    root: PathBuf,
    file_indices: Vec<usize>,
    extensions: Vec<String>,
}

impl DirectoryContainer {
    pub fn new(root: PathBuf, file_indices: Vec<usize>, extensions: Vec<String>) -> Self {
        Self {
            root,
            file_indices,
            extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All files under the root in native order
    fn members(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(LibraryError::ContainerNotFound(self.root.clone()));
        }

        let mut members = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            members.push(relative);
        }

        Ok(members)
    }

    fn page_not_found(&self, index: usize) -> LibraryError {
        LibraryError::PageNotFound {
            entry: self.root.display().to_string(),
            index,
        }
    }
}

impl Container for DirectoryContainer {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Directory
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        let members = self.members()?;

        self.file_indices
            .iter()
            .enumerate()
            .map(|(page, &native)| {
                members
                    .get(native)
                    .cloned()
                    .ok_or_else(|| self.page_not_found(page))
            })
            .collect()
    }

    fn open_entry(&self, index: usize) -> Result<ContainerItem> {
        let native = *self
            .file_indices
            .get(index)
            .ok_or_else(|| self.page_not_found(index))?;

        let members = self.members()?;
        let member = members
            .get(native)
            .ok_or_else(|| self.page_not_found(index))?;

        let data = std::fs::read(self.root.join(member))?;

        Ok(ContainerItem {
            name: display_name(member, index),
            data,
        })
    }

    fn download(&self) -> Result<ContainerDownload> {
        let members = self.members()?;
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for member in &members {
            let data = std::fs::read(self.root.join(member))?;
            writer.start_file(member.as_str(), options)?;
            writer.write_all(&data)?;
        }
        let data = writer.finish()?.into_inner();

        let base = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        Ok(ContainerDownload {
            filename: format!("{}.zip", base),
            data,
        })
    }

    fn content_indices(&self) -> Result<Vec<usize>> {
        let members = self.members()?;
        Ok(image_indices(&members, &self.extensions))
    }
}
