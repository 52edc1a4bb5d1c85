use std::{io, path::Path};

use tempfile::TempPath;

/// An uploaded file parked on disk for the lifetime of one request.
///
/// The file is removed by [`TempUpload::close`] or, if the request future is
/// dropped first, when the guard itself is dropped.
pub struct TempUpload {
    path: TempPath,
}

impl TempUpload {
    pub async fn write(dir: &Path, ext: &str, bytes: &[u8]) -> io::Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{ext}"))
            .tempfile_in(dir)?
            .into_temp_path();
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file. Never fails: a missing file is fine, anything else is logged.
    pub fn close(self) {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %shown, error = %e, "failed to remove temp upload"),
        }
    }
}
