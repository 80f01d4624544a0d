use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pixdrop_core::constants::{DEFAULT_CONTENT_TYPE, PROCESSED_PREFIX, THUMBNAILS_PREFIX};
use pixdrop_core::{AppError, IngestionPolicy};
use pixdrop_processing::{
    decode_image_payload, sanitize_file_name, TransformDispatcher, TransformOperation,
};
use pixdrop_storage::keys::{
    all_image_keys, generate_upload_key, image_id, processed_key, thumbnail_key,
};
use pixdrop_storage::{list_all, Storage};

use crate::ingestion::IngestionGate;

/// Body of an upload request. Missing fields deserialize as empty and are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadRequest {
    /// Base64 payload, optionally wrapped in a `data:` URL.
    pub image: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub key: String,
    pub uploaded_filename: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessRequest {
    pub image: String,
    /// Operation name, one of [`TransformOperation::ALL`].
    pub option: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedImage {
    pub url: String,
    pub name: String,
}

/// One processed image in a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: String,
}

/// Upload persistence and the image operations built on the object store.
///
/// Admission is delegated to the [`IngestionGate`]; this service only writes once the gate
/// admits.
pub struct MediaService {
    storage: Arc<dyn Storage>,
    gate: IngestionGate,
    max_file_size_bytes: u64,
    url_expiry: Duration,
}

impl MediaService {
    pub fn new(
        storage: Arc<dyn Storage>,
        gate: IngestionGate,
        policy: &IngestionPolicy,
        url_expiry: Duration,
    ) -> Self {
        Self {
            storage,
            gate,
            max_file_size_bytes: policy.max_file_size_bytes,
            url_expiry,
        }
    }

    /// Decode, gate and store one upload under `uploads/{uuid}-{file name}`.
    #[tracing::instrument(skip(self, request), fields(file_name = %request.file_name))]
    pub async fn upload(
        &self,
        client_id: &str,
        request: UploadRequest,
        now: DateTime<Utc>,
    ) -> Result<UploadedImage, AppError> {
        if request.image.is_empty()
            || request.file_name.is_empty()
            || request.content_type.is_empty()
        {
            return Err(AppError::InvalidInput(
                "Missing required fields: image, fileName, contentType".to_string(),
            ));
        }
        let file_name = sanitize_file_name(&request.file_name)?;
        let data = decode_image_payload(&request.image)?;

        self.gate
            .evaluate(client_id, data.len() as u64, &request.content_type, now)
            .await?
            .into_result()?;

        let (key, uploaded_filename) = generate_upload_key(&file_name);
        let size = data.len();
        self.storage
            .put(&key, Bytes::from(data), request.content_type.trim())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Failed to store upload");
                AppError::StoreUnavailable(e.to_string())
            })?;

        tracing::info!(key = %key, size_bytes = size, client_id = %client_id, "Upload stored");

        Ok(UploadedImage {
            key,
            uploaded_filename,
        })
    }

    /// Run a named transform and store the result plus a thumbnail under `file_name`.
    #[tracing::instrument(
        skip(self, request),
        fields(file_name = %request.file_name, option = %request.option)
    )]
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessedImage, AppError> {
        if request.image.is_empty() || request.option.is_empty() || request.file_name.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing required fields: image, option, fileName".to_string(),
            ));
        }
        let operation: TransformOperation = request.option.parse()?;
        let file_name = sanitize_file_name(&request.file_name)?;
        let data = decode_image_payload(&request.image)?;

        let (output, thumbnail) = tokio::task::spawn_blocking(move || {
            let output = TransformDispatcher::apply(&data, operation)?;
            let thumbnail = TransformDispatcher::thumbnail(&output.data)?;
            Ok::<_, AppError>((output, thumbnail))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Transform task failed: {}", e)))??;

        let output_size = output.data.len() as u64;
        if output_size > self.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge {
                size: output_size,
                max: self.max_file_size_bytes,
            });
        }

        let key = processed_key(&file_name);
        self.storage
            .put(&key, output.data, output.content_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Failed to store processed image");
                AppError::StoreUnavailable(e.to_string())
            })?;

        let thumb_key = thumbnail_key(&file_name);
        if let Err(e) = self
            .storage
            .put(&thumb_key, thumbnail.data, thumbnail.content_type)
            .await
        {
            tracing::warn!(
                error = %e,
                key = %thumb_key,
                "Failed to store thumbnail, listing will omit it"
            );
        }

        let url = self.storage.presigned_url(&key, self.url_expiry).await?;

        tracing::info!(
            key = %key,
            operation = %operation,
            size_bytes = output_size,
            width = output.width,
            height = output.height,
            "Image processed"
        );

        Ok(ProcessedImage {
            url,
            name: file_name,
        })
    }

    /// Processed images, newest first, with presigned URLs.
    pub async fn list_images(&self) -> Result<Vec<ImageSummary>, AppError> {
        let processed = list_all(self.storage.as_ref(), PROCESSED_PREFIX).await?;
        let thumbnails: HashSet<String> = list_all(self.storage.as_ref(), THUMBNAILS_PREFIX)
            .await?
            .into_iter()
            .map(|object| object.file_name().to_string())
            .collect();

        let mut images = Vec::with_capacity(processed.len());
        for object in processed {
            let name = object.file_name().to_string();
            let url = self.storage.presigned_url(&object.key, self.url_expiry).await?;
            let thumbnail_url = if thumbnails.contains(&name) {
                self.storage
                    .presigned_url(&thumbnail_key(&name), self.url_expiry)
                    .await
                    .ok()
            } else {
                None
            };

            images.push(ImageSummary {
                id: image_id(&name).to_string(),
                name,
                url,
                thumbnail_url,
                last_modified: object.last_modified,
                size: object.size,
            });
        }

        images.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(images)
    }

    /// Bytes of a processed image.
    pub async fn get_image(&self, file_name: &str) -> Result<FetchedImage, AppError> {
        let file_name = sanitize_file_name(file_name)?;
        let blob = self.storage.get(&processed_key(&file_name)).await?;
        Ok(FetchedImage {
            data: blob.data,
            content_type: blob
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        })
    }

    /// Time-limited read URL for a processed image.
    pub async fn presigned_url(&self, file_name: &str) -> Result<String, AppError> {
        let file_name = sanitize_file_name(file_name)?;
        let key = processed_key(&file_name);
        if !self.storage.exists(&key).await? {
            return Err(AppError::NotFound(format!("Image {} not found", file_name)));
        }
        Ok(self.storage.presigned_url(&key, self.url_expiry).await?)
    }

    /// Remove every copy of `file_name`. Missing keys are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn delete_image(&self, file_name: &str) -> Result<(), AppError> {
        let file_name = sanitize_file_name(file_name)?;
        let keys = all_image_keys(&file_name);
        let report = self.storage.delete_many(&keys).await?;
        if let Some((key, reason)) = report.failed.first() {
            tracing::error!(key = %key, reason = %reason, "Failed to delete image copy");
            return Err(AppError::StoreUnavailable(format!(
                "Failed to delete {}: {}",
                key, reason
            )));
        }
        tracing::info!(file_name = %file_name, deleted = report.deleted.len(), "Image deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::Duration as ChronoDuration;
    use pixdrop_core::{CapacityPolicy, QuotaPolicy};
    use pixdrop_infra::{ObjectStoreQuotaLedger, StorageCapacityGate};
    use pixdrop_storage::MemoryStorage;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn service(storage: &MemoryStorage, policy: IngestionPolicy) -> MediaService {
        let storage: Arc<dyn Storage> = Arc::new(storage.clone());
        let ledger = Arc::new(ObjectStoreQuotaLedger::new(
            storage.clone(),
            QuotaPolicy::default(),
        ));
        let capacity = Arc::new(StorageCapacityGate::new(
            storage.clone(),
            CapacityPolicy::default(),
        ));
        let gate = IngestionGate::new(&policy, ledger, capacity);
        MediaService::new(storage, gate, &policy, Duration::from_secs(3600))
    }

    fn upload_request(file_name: &str) -> UploadRequest {
        UploadRequest {
            image: format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(4, 4))),
            file_name: file_name.to_string(),
            content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn upload_stores_under_unique_key() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());

        let uploaded = service
            .upload("10.0.0.1", upload_request("cat.png"), Utc::now())
            .await
            .unwrap();

        assert!(uploaded.key.starts_with("uploads/"));
        assert!(uploaded.uploaded_filename.ends_with("-cat.png"));
        assert!(storage.keys().contains(&uploaded.key));
        assert!(storage.keys().contains(&"stats/monthly-usage.json".to_string()));
    }

    #[tokio::test]
    async fn sixth_upload_in_window_is_rate_limited() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());
        let start = Utc::now();

        for i in 0..5 {
            service
                .upload("10.0.0.1", upload_request("a.png"), start + ChronoDuration::minutes(i))
                .await
                .unwrap();
        }
        let err = service
            .upload("10.0.0.1", upload_request("a.png"), start + ChronoDuration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::RateLimited {
                limit: 5,
                window_hours: 6
            }
        ));

        let later = start + ChronoDuration::minutes(4) + ChronoDuration::hours(6);
        assert!(service
            .upload("10.0.0.1", upload_request("a.png"), later)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejected_upload_writes_nothing() {
        let storage = MemoryStorage::new();
        let policy = IngestionPolicy {
            max_file_size_bytes: 10,
            ..IngestionPolicy::default()
        };
        let service = service(&storage, policy);

        let err = service
            .upload("10.0.0.1", upload_request("cat.png"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { max: 10, .. }));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_missing_fields_and_unsafe_names() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());

        let err = service
            .upload("c", UploadRequest::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = service
            .upload("c", upload_request(".."), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn process_stores_output_and_thumbnail() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());

        let processed = service
            .process(ProcessRequest {
                image: STANDARD.encode(png_bytes(300, 100)),
                option: "grayscale".to_string(),
                file_name: "1700000000-cat.png".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(processed.name, "1700000000-cat.png");
        assert!(processed.url.contains("processed%2F1700000000-cat.png"));
        assert_eq!(
            storage.keys(),
            vec!["processed/1700000000-cat.png", "thumbnails/1700000000-cat.png"]
        );

        let fetched = service.get_image("1700000000-cat.png").await.unwrap();
        assert_eq!(fetched.content_type, "image/png");
        let thumb = image::load_from_memory(
            &storage.get("thumbnails/1700000000-cat.png").await.unwrap().data,
        )
        .unwrap();
        assert_eq!(thumb.width(), 200);
    }

    #[tokio::test]
    async fn process_rejects_unknown_operation() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());

        let err = service
            .process(ProcessRequest {
                image: STANDARD.encode(png_bytes(4, 4)),
                option: "emboss".to_string(),
                file_name: "x.png".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownOperation(_)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn process_checks_output_size() {
        let storage = MemoryStorage::new();
        let policy = IngestionPolicy {
            max_file_size_bytes: 16,
            ..IngestionPolicy::default()
        };
        let service = service(&storage, policy);

        let err = service
            .process(ProcessRequest {
                image: STANDARD.encode(png_bytes(64, 64)),
                option: "negative".to_string(),
                file_name: "x.png".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { max: 16, .. }));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_thumbnails() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage
            .insert_object(
                "processed/1-old.png",
                vec![1u8; 3],
                "image/png",
                now - ChronoDuration::hours(2),
            )
            .unwrap();
        storage
            .insert_object("processed/2-new.png", vec![1u8; 5], "image/png", now)
            .unwrap();
        storage
            .insert_object("thumbnails/2-new.png", vec![1u8; 2], "image/png", now)
            .unwrap();
        storage
            .insert_object("uploads/3-raw.png", vec![1u8; 2], "image/png", now)
            .unwrap();
        let service = service(&storage, IngestionPolicy::default());

        let images = service.list_images().await.unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "2-new.png");
        assert_eq!(images[0].id, "2");
        assert_eq!(images[0].size, 5);
        assert!(images[0].thumbnail_url.is_some());
        assert_eq!(images[1].name, "1-old.png");
        assert!(images[1].thumbnail_url.is_none());

        let json = serde_json::to_value(&images[0]).unwrap();
        assert!(json.get("thumbnailUrl").is_some());
        assert!(json.get("lastModified").is_some());
    }

    #[tokio::test]
    async fn missing_image_is_not_found() {
        let storage = MemoryStorage::new();
        let service = service(&storage, IngestionPolicy::default());

        assert!(matches!(
            service.get_image("nope.png").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.presigned_url("nope.png").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_removes_every_copy_and_ignores_missing() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        storage
            .insert_object("processed/1-a.png", vec![1u8], "image/png", now)
            .unwrap();
        storage
            .insert_object("uploads/1-a.png", vec![1u8], "image/png", now)
            .unwrap();
        storage
            .insert_object("processed/2-b.png", vec![1u8], "image/png", now)
            .unwrap();
        let service = service(&storage, IngestionPolicy::default());

        service.delete_image("1-a.png").await.unwrap();
        assert_eq!(storage.keys(), vec!["processed/2-b.png"]);

        service.delete_image("1-a.png").await.unwrap();
    }
}
