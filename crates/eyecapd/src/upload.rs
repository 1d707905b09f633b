use std::path::PathBuf;

use eyecap_core::{EyeSelection, UploadReceipt, UploadRequest, Uploader, UpstreamError};

use crate::store::{CaptureStore, NewImage};

/// Saves cropped eye images to disk and indexes them in the store.
///
/// Iris and pupil measurements are produced by a later analysis stage, so
/// they are recorded as absent here.
#[derive(Clone)]
pub struct LocalUploader {
    save_dir: PathBuf,
    store: CaptureStore,
}

impl LocalUploader {
    pub fn new(save_dir: PathBuf, store: CaptureStore) -> Self {
        Self { save_dir, store }
    }

    /// Write `bytes` under the first free `{stem}[_n].png` name.
    async fn write_new(&self, stem: &str, bytes: &[u8]) -> Result<String, UpstreamError> {
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(&self.save_dir)
            .await
            .map_err(|e| UpstreamError::Upload(format!("{}: {e}", self.save_dir.display())))?;

        for n in 0..MAX_NAME_ATTEMPTS {
            let filename = if n == 0 {
                format!("{stem}.png")
            } else {
                format!("{stem}_{n}.png")
            };
            let path = self.save_dir.join(&filename);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(UpstreamError::Upload(format!("{}: {e}", path.display()))),
            };
            file.write_all(bytes)
                .await
                .map_err(|e| UpstreamError::Upload(format!("{}: {e}", path.display())))?;
            file.flush()
                .await
                .map_err(|e| UpstreamError::Upload(format!("{}: {e}", path.display())))?;
            return Ok(filename);
        }

        Err(UpstreamError::Upload(format!("no free filename for {stem}")))
    }
}

/// `{user}_{eye}_eye_{YYYYmmdd_HHMMSS}`, without extension.
pub fn image_stem(user: &str, eye: EyeSelection, at: chrono::DateTime<chrono::Utc>) -> String {
    format!("{user}_{eye}_eye_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Attempts at a unique filename before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Usernames end up in filenames; keep them to a safe alphabet.
fn valid_user(user: &str) -> bool {
    !user.is_empty()
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !user.starts_with('.')
}

impl Uploader for LocalUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, UpstreamError> {
        let UploadRequest { user, eye, image } = request;
        if !valid_user(&user) {
            return Err(UpstreamError::Upload(format!("invalid user name '{user}'")));
        }

        let created_at = chrono::Utc::now();
        let filename = self
            .write_new(&image_stem(&user, eye, created_at), &image.encoded)
            .await?;
        let path = self.save_dir.join(&filename);

        let record = NewImage {
            user: user.clone(),
            filename: filename.clone(),
            eye,
            iris_radius: None,
            pupil_diameter: None,
            created_at,
        };
        if let Err(e) = self.store.insert(record).await {
            // Don't leave an unindexed file behind.
            tokio::fs::remove_file(&path).await.ok();
            return Err(UpstreamError::Upload(e.to_string()));
        }

        tracing::info!(
            user = %user,
            eye = %eye,
            filename = %filename,
            bytes = image.encoded.len(),
            "eye image saved"
        );

        Ok(UploadReceipt {
            success: true,
            message: "Eye image saved successfully.".to_string(),
            filename,
            iris_radius: None,
            pupil_diameter: None,
        })
    }
}
