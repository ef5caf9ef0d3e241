use anyhow::Context;
use bytes::Bytes;
use rand::RngCore;
use tracing::{info, warn};

use crate::auth::repo_types::DEFAULT_IMAGE_FILE;
use crate::error::{AppError, ValidationError};
use crate::storage::StorageClient;

const PROFILE_PREFIX: &str = "profile_pics";
const PRESIGN_TTL_SECS: u64 = 30 * 60;

pub struct UploadItem<'a> {
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub body: Bytes,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

fn ext_from_filename(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" => Some("jpg"),
        "jpeg" => Some("jpeg"),
        "png" => Some("png"),
        _ => None,
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

/// 16 random hex chars plus the upload's own extension.
pub fn random_picture_name(ext: &str) -> String {
    let mut raw = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut raw);
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
    format!("{hex}.{ext}")
}

pub fn picture_key(image_file: &str) -> String {
    format!("{PROFILE_PREFIX}/{image_file}")
}

/// Stores an uploaded profile picture and returns its `image_file` name.
pub async fn save_profile_picture(
    storage: &dyn StorageClient,
    upload: UploadItem<'_>,
) -> Result<String, AppError> {
    if upload.body.is_empty() {
        return Err(ValidationError::invalid("picture", "Picture is empty").into());
    }
    let ext = match upload.filename {
        Some(name) if name.contains('.') => ext_from_filename(name),
        _ => upload.content_type.and_then(ext_from_mime),
    }
    .ok_or_else(|| ValidationError::invalid("picture", "Only jpg and png images are allowed"))?;

    let name = random_picture_name(ext);
    let key = picture_key(&name);
    storage
        .put_object(&key, upload.body, content_type_for(ext))
        .await
        .with_context(|| format!("store profile picture {key}"))?;
    info!(%key, "profile picture stored");
    Ok(name)
}

/// Best effort; the shared default picture is never deleted.
pub async fn discard_profile_picture(storage: &dyn StorageClient, image_file: &str) {
    if image_file == DEFAULT_IMAGE_FILE {
        return;
    }
    let key = picture_key(image_file);
    if let Err(e) = storage.delete_object(&key).await {
        warn!(error = %e, %key, "old profile picture not deleted");
    }
}

pub async fn picture_url(storage: &dyn StorageClient, image_file: &str) -> anyhow::Result<String> {
    let key = picture_key(image_file);
    storage
        .presign_get(&key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {key}"))
}
