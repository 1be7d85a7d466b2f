pub mod upload;

pub use upload::{ALLOWED_EXTENSIONS, TempUpload, UploadError, validate_extension};
