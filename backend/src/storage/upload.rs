use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid file type '{filename}'. Allowed formats: .mp4, .avi, .mov, .mkv")]
    InvalidFormat { filename: String },
    #[error("File too large: limit is {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returns the lowercased extension when it is one of the accepted video
/// containers.
pub fn validate_extension(filename: &str) -> Result<String, UploadError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(UploadError::InvalidFormat {
            filename: filename.to_string(),
        }),
    }
}

/// An uploaded file in its own temporary directory. Dropping it removes the
/// file and the directory; removal failures are logged and ignored.
#[derive(Debug)]
pub struct TempUpload {
    dir: PathBuf,
    path: PathBuf,
    file: Option<File>,
    written: usize,
    limit: usize,
}

impl TempUpload {
    /// Creates `<root>/action-upload-<uuid>/<file name>`. The name is checked
    /// before anything touches the disk.
    pub fn create(root: &Path, filename: &str, limit: usize) -> Result<Self, UploadError> {
        let extension = validate_extension(filename)?;
        let dir = root.join(format!("action-upload-{}", Uuid::new_v4()));
        fs::create_dir(&dir)?;

        let name = Path::new(filename)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("upload.{extension}")));
        let path = dir.join(name);

        let mut upload = Self {
            dir,
            path,
            file: None,
            written: 0,
            limit,
        };
        upload.file = Some(File::create(&upload.path)?);
        Ok(upload)
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let written = self.written.saturating_add(chunk.len());
        if written > self.limit {
            return Err(UploadError::TooLarge { limit: self.limit });
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk)?;
        }
        self.written = written;
        Ok(())
    }

    /// Flushes and closes the file so it can be handed to the decoder.
    pub fn finish(&mut self) -> Result<(), UploadError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        self.file.take();
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove temp upload {}: {}", self.path.display(), e);
            }
        }
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir(&self.dir) {
                log::warn!("Failed to remove temp dir {}: {}", self.dir.display(), e);
            }
        }
    }
}
