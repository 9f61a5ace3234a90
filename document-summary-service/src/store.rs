use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// A document discovered in or written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub name: String,
    pub path: PathBuf,
}

/// Directory-backed store of uploaded PDF files, keyed by filename.
///
/// The store is append-mostly: saving an existing name overwrites the file,
/// and nothing ever deletes one. Sessions hold their own view of the store
/// in their file cache; the directory is the only state shared between
/// sessions.
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating the directory if it does not exist.
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the PDF documents currently on disk.
    pub async fn scan(&self) -> io::Result<Vec<StoredDocument>> {
        let mut documents = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".pdf") {
                documents.push(StoredDocument {
                    name,
                    path: entry.path(),
                });
            }
        }

        Ok(documents)
    }

    /// Write uploaded bytes verbatim to `<dir>/<file_name>`.
    ///
    /// An existing file of the same name is overwritten, matching the
    /// upload semantics of the store's single-directory layout.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if !is_valid_file_name(file_name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid document file name: {file_name}"),
            ));
        }

        let path = self.dir.join(file_name);
        if tokio::fs::try_exists(&path).await? {
            warn!(file_name, "overwriting existing document");
        }

        tokio::fs::write(&path, bytes).await?;
        info!(file_name, size = bytes.len(), "document saved");
        Ok(path)
    }

    /// Read a stored document's bytes back.
    pub async fn load(&self, file_name: &str) -> io::Result<Vec<u8>> {
        if !is_valid_file_name(file_name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid document file name: {file_name}"),
            ));
        }
        tokio::fs::read(self.dir.join(file_name)).await
    }
}

/// A valid document name is a plain file name: no path separators, no
/// traversal, not empty.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
