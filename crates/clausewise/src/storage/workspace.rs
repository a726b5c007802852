use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

/// Highest numbered suffix tried when an upload name is already taken.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Scratch directory owned by one submission.
///
/// `close` removes it and reports failures. Dropping an unclosed workspace
/// still removes the directory, silently.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates a uniquely named directory under `root`, or the system temp dir.
    pub fn create(prefix: &str, root: Option<&Path>) -> Result<Self, StorageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| StorageError::CreateDirectory {
                    path: root.to_path_buf(),
                    source: e,
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| StorageError::CreateDirectory {
            path: root
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;

        log::debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` under `filename`, picking `name_2.ext`, `name_3.ext`
    /// and so on when the name is taken. Returns the path written.
    pub async fn store(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            _ => (filename, None),
        };

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = self.path().join(&try_filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .await
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    file.flush().await.map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(self.path().join(filename)))
    }

    /// Removes the directory and everything in it.
    pub fn close(self) -> Result<(), StorageError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| StorageError::RemoveDirectory { path: path.clone(), source: e })?;
        log::debug!("Removed workspace {}", path.display());
        Ok(())
    }
}
