use anyhow::{anyhow, Result};
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::article::Article;
use crate::infra::storage::ObjectStorage;

#[derive(Clone)]
pub struct PhotoService {
    storage: ObjectStorage,
    url_ttl_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct UploadIntent {
    pub object_key: String,
    pub upload_url: String,
    pub expires_in_seconds: u64,
    pub headers: Vec<UploadHeader>,
}

#[derive(Debug, Serialize)]
pub struct UploadHeader {
    pub name: String,
    pub value: String,
}

impl PhotoService {
    pub fn new(storage: ObjectStorage, url_ttl_seconds: u64) -> Self {
        Self {
            storage,
            url_ttl_seconds,
        }
    }

    /// Presigned PUT for a new article photo under the owner's key prefix.
    pub async fn create_upload(
        &self,
        owner_id: Uuid,
        content_type: &str,
        bytes: i64,
        expires_in_seconds: u64,
    ) -> Result<UploadIntent> {
        let ext = extension_from_content_type(content_type)?;
        let object_key = format!("{}{}.{}", owner_prefix(owner_id), Uuid::new_v4(), ext);

        let presigned = self
            .storage
            .presign_put(&object_key, content_type, bytes, expires_in_seconds)
            .await?;

        Ok(UploadIntent {
            object_key,
            upload_url: presigned.url,
            expires_in_seconds,
            headers: presigned
                .headers
                .into_iter()
                .map(|(name, value)| UploadHeader { name, value })
                .collect(),
        })
    }

    pub async fn photo_url(&self, key: &str) -> Option<String> {
        match self.storage.presign_get(key, self.url_ttl_seconds).await {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = ?err, key, "failed to presign photo URL");
                None
            }
        }
    }

    pub async fn populate_photo_url(&self, article: &mut Article) {
        if let Some(key) = article.photo_key.as_deref() {
            article.photo_url = self.photo_url(key).await;
        }
    }

    pub async fn populate_photo_urls<'a, I>(&self, articles: I)
    where
        I: IntoIterator<Item = &'a mut Article>,
    {
        join_all(
            articles
                .into_iter()
                .map(|article| self.populate_photo_url(article)),
        )
        .await;
    }

    pub async fn delete_photo(&self, key: &str) {
        if let Err(err) = self.storage.delete(key).await {
            tracing::warn!(error = ?err, key, bucket = self.storage.bucket(), "failed to delete photo object");
        }
    }
}

/// Photos may only be attached by the user who uploaded them.
pub fn is_owned_photo_key(owner_id: Uuid, key: &str) -> bool {
    key.strip_prefix(&owner_prefix(owner_id))
        .map_or(false, |rest| !rest.is_empty() && !rest.contains('/') && !rest.contains(".."))
}

fn owner_prefix(owner_id: Uuid) -> String {
    format!("articles/{}/", owner_id)
}

fn extension_from_content_type(content_type: &str) -> Result<&'static str> {
    match content_type {
        "image/jpeg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        _ => Err(anyhow!("unsupported content type")),
    }
}

pub fn is_supported_content_type(content_type: &str) -> bool {
    extension_from_content_type(content_type).is_ok()
}
