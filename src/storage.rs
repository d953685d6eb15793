//! Uploaded pictures, kept on disk under the same key layout as a bucket
//! and served back at `/uploads/<key>`.

use std::{collections::HashMap, path::{Path, PathBuf}};

use axum::{body::Bytes, extract::Multipart};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppError, AppResult};

pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
const URL_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Copy)]
pub enum Folder<'a> {
    ProfilePicture { uid: &'a str },
    PlantPicture { plant_id: Uuid },
    Image,
}

impl Folder<'_> {
    fn prefix(&self) -> AppResult<String> {
        Ok(match self {
            Folder::ProfilePicture { uid } => {
                if uid.is_empty() || !uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                    return Err(AppError::bad_request("unusable user id for storage"));
                }
                format!("profilePictures/{uid}")
            }
            Folder::PlantPicture { plant_id } => format!("plantProfilePictures/{plant_id}"),
            Folder::Image => "images".to_owned(),
        })
    }
}

/// A file field pulled out of a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub content_type: String,
    pub bytes: Bytes,
}

impl Upload {
    fn extension(&self) -> Option<&'static str> {
        match self.content_type.as_str() {
            "image/png" => Some("png"),
            "image/jpeg" => Some("jpg"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            _ => None,
        }
    }
}

/// Text fields plus at most one file of a multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<FormData> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if field.file_name().is_some() {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                // browsers send an empty part when no file was picked
                if !bytes.is_empty() {
                    form.file = Some(Upload { content_type, bytes });
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `upload` under `folder` and returns the url it is served at.
    pub async fn put(&self, folder: Folder<'_>, upload: &Upload) -> AppResult<String> {
        if upload.bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::bad_request("pictures can be at most 10 MiB"));
        }
        let Some(extension) = upload.extension() else {
            return Err(AppError::bad_request(format!("{} isn't a picture we can show", upload.content_type)));
        };

        let prefix = folder.prefix()?;
        let key = format!("{prefix}/{}.{extension}", Uuid::now_v7());

        tokio::fs::create_dir_all(self.root.join(&prefix)).await?;
        let mut file = tokio::fs::File::create(self.root.join(&key)).await?;
        file.write_all(&upload.bytes).await?;
        file.flush().await?;

        info!(%key, size = upload.bytes.len(), "stored upload");
        Ok(format!("{URL_PREFIX}{key}"))
    }

    /// Deletes an upload previously returned by [`Storage::put`]. Unknown urls are ignored.
    pub async fn remove(&self, url: &str) {
        let Some(key) = url.strip_prefix(URL_PREFIX) else {
            return;
        };
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.root.join(key)).await {
            warn!(key, "couldn't remove upload: {e}");
        }
    }
}
