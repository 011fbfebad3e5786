use crate::error::UploadError;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// A file received from the page
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Write an uploaded file into `data_dir`, creating the folder if needed.
///
/// Only the final path component of the supplied name is used. Uploading the
/// same name twice overwrites the earlier file.
pub fn save_upload(data_dir: &Path, file: Option<UploadedFile>) -> Result<PathBuf, UploadError> {
    let file = match file {
        Some(file) if !file.name.trim().is_empty() => file,
        _ => return Err(UploadError::EmptyPayload),
    };

    let file_name = Path::new(file.name.trim())
        .file_name()
        .ok_or_else(|| UploadError::InvalidName(file.name.clone()))?;

    fs::create_dir_all(data_dir)?;

    let destination = data_dir.join(file_name);
    fs::write(&destination, &file.bytes)?;

    info!(
        "Saved upload {} ({} bytes)",
        destination.display(),
        file.bytes.len()
    );

    Ok(destination)
}
