use std::path::PathBuf;

use eyecap_core::{ShareReceipt, ShareRequest, Sharer, UpstreamError};
use serde::Serialize;
use thiserror::Error;

use crate::store::{CaptureStore, StoreError};

const SUBJECT: &str = "Your Captured Eye Image";
const BODY: &str = "Please find attached your captured eye image.";

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("No recipient email provided.")]
    MissingRecipient,
    #[error("Invalid recipient email '{0}'.")]
    InvalidRecipient(String),
    #[error("Image not found or access denied.")]
    NotFound,
    #[error("outbox I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("envelope encoding failed: {0}")]
    Envelope(#[from] serde_json::Error),
}

impl ShareError {
    /// Whether the caller asked for something that can't be done, as opposed
    /// to the outbox failing underneath it.
    fn is_rejection(&self) -> bool {
        matches!(
            self,
            ShareError::MissingRecipient | ShareError::InvalidRecipient(_) | ShareError::NotFound
        )
    }
}

/// Mail envelope written next to the attachment for the relay to send.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: &'a str,
    user: &'a str,
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
    attachment: &'a str,
    content_type: &'a str,
    created_at: String,
}

/// Queues captured images for e-mail delivery.
///
/// Each share becomes `{outbox}/{uuid}/` holding a copy of the image and an
/// `envelope.json`. Delivery is left to whatever relay watches the outbox.
#[derive(Clone)]
pub struct OutboxSharer {
    save_dir: PathBuf,
    outbox_dir: PathBuf,
    store: CaptureStore,
}

impl OutboxSharer {
    pub fn new(save_dir: PathBuf, outbox_dir: PathBuf, store: CaptureStore) -> Self {
        Self {
            save_dir,
            outbox_dir,
            store,
        }
    }

    async fn enqueue(&self, request: &ShareRequest) -> Result<String, ShareError> {
        let recipient = request.recipient.trim();
        if recipient.is_empty() {
            return Err(ShareError::MissingRecipient);
        }
        if !plausible_address(recipient) {
            return Err(ShareError::InvalidRecipient(recipient.to_string()));
        }

        let image = self
            .store
            .find(&request.user, &request.filename)
            .await?
            .ok_or(ShareError::NotFound)?;
        let source = self.save_dir.join(&image.filename);
        if !tokio::fs::try_exists(&source).await? {
            return Err(ShareError::NotFound);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let dir = self.outbox_dir.join(&id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(&source, dir.join(&image.filename)).await?;

        let envelope = Envelope {
            id: &id,
            user: &request.user,
            recipient,
            subject: SUBJECT,
            body: BODY,
            attachment: &image.filename,
            content_type: "image/png",
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        tokio::fs::write(dir.join("envelope.json"), serde_json::to_vec_pretty(&envelope)?).await?;

        Ok(id)
    }
}

/// One `@`, something on both sides, and a dot in the domain.
fn plausible_address(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !addr.chars().any(char::is_whitespace)
}

impl Sharer for OutboxSharer {
    async fn share(&self, request: ShareRequest) -> Result<ShareReceipt, UpstreamError> {
        match self.enqueue(&request).await {
            Ok(id) => {
                tracing::info!(
                    user = %request.user,
                    filename = %request.filename,
                    envelope = %id,
                    "share queued"
                );
                Ok(ShareReceipt {
                    success: true,
                    message: "Email queued for delivery.".to_string(),
                })
            }
            Err(e) if e.is_rejection() => {
                tracing::warn!(user = %request.user, filename = %request.filename, error = %e, "share rejected");
                Ok(ShareReceipt {
                    success: false,
                    message: e.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "share failed");
                Err(UpstreamError::Share(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewImage;
    use eyecap_core::EyeSelection;
    use std::path::Path;

    async fn fixture() -> (tempfile::TempDir, OutboxSharer) {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("images");
        std::fs::create_dir_all(&save_dir).unwrap();
        std::fs::write(save_dir.join("alice_left_eye_1.png"), b"png").unwrap();

        let store = CaptureStore::open(Path::new(":memory:")).await.unwrap();
        store
            .insert(NewImage {
                user: "alice".into(),
                filename: "alice_left_eye_1.png".into(),
                eye: EyeSelection::Left,
                iris_radius: None,
                pupil_diameter: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let sharer = OutboxSharer::new(save_dir, dir.path().join("outbox"), store);
        (dir, sharer)
    }

    fn request(user: &str, recipient: &str) -> ShareRequest {
        ShareRequest {
            user: user.into(),
            filename: "alice_left_eye_1.png".into(),
            recipient: recipient.into(),
        }
    }

    #[test]
    fn test_plausible_address() {
        assert!(plausible_address("dr.lee@clinic.example"));
        assert!(!plausible_address("clinic.example"));
        assert!(!plausible_address("@clinic.example"));
        assert!(!plausible_address("lee@localhost"));
        assert!(!plausible_address("a@b@c.d"));
        assert!(!plausible_address("lee @clinic.example"));
    }

    #[tokio::test]
    async fn test_share_writes_envelope() {
        let (dir, sharer) = fixture().await;
        let receipt = sharer
            .share(request("alice", "dr.lee@clinic.example"))
            .await
            .unwrap();
        assert!(receipt.success);

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("outbox"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        let envelope_dir = entries[0].path();
        assert!(envelope_dir.join("alice_left_eye_1.png").exists());
        let envelope: serde_json::Value =
            serde_json::from_slice(&std::fs::read(envelope_dir.join("envelope.json")).unwrap())
                .unwrap();
        assert_eq!(envelope["recipient"], "dr.lee@clinic.example");
        assert_eq!(envelope["subject"], SUBJECT);
    }

    #[tokio::test]
    async fn test_share_other_users_image_denied() {
        let (_dir, sharer) = fixture().await;
        let receipt = sharer
            .share(request("bob", "dr.lee@clinic.example"))
            .await
            .unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.message, "Image not found or access denied.");
    }

    #[tokio::test]
    async fn test_share_without_recipient_rejected() {
        let (_dir, sharer) = fixture().await;
        let receipt = sharer.share(request("alice", "  ")).await.unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.message, "No recipient email provided.");
    }
}
