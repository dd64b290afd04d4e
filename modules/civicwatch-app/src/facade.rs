use std::sync::Arc;

use ai_client::InlineImage;
use tracing::{info, warn};
use uuid::Uuid;

use civicwatch_common::error::Result;
use civicwatch_common::{Report, User};

use crate::backend::Backend;

/// Policy layer over `Backend`: reads fail open, report writes fail loudly,
/// image uploads degrade to storing the encoded payload.
#[derive(Clone)]
pub struct Facade {
    backend: Arc<dyn Backend>,
}

impl Facade {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// All reports, or an empty list when the backend errors.
    pub async fn get_all_reports(&self) -> Vec<Report> {
        match self.try_get_all_reports().await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "Failed to load reports, showing none");
                Vec::new()
            }
        }
    }

    pub async fn try_get_all_reports(&self) -> Result<Vec<Report>> {
        let reports = self.backend.fetch_reports().await?;
        info!(count = reports.len(), "Loaded reports");
        Ok(reports)
    }

    /// Persist the image, then insert the report. Returns what was stored.
    pub async fn save_report(&self, report: &Report) -> Result<Report> {
        let stored = Report {
            image_url: self.persist_image(&report.image_url).await,
            ..report.clone()
        };
        self.backend.insert_report(&stored).await?;
        info!(report_id = %stored.id, category = %stored.category, "Report saved");
        Ok(stored)
    }

    pub async fn update_report(&self, report: &Report) -> Result<()> {
        self.backend.update_report(report).await?;
        info!(report_id = %report.id, status = %report.status, progress = report.progress, "Report updated");
        Ok(())
    }

    /// Upload a data-URL image and return its public URL.
    ///
    /// Anything that is not a data URL is returned unchanged (already remote).
    /// If decoding or uploading fails the encoded payload itself is returned.
    pub async fn persist_image(&self, encoded: &str) -> String {
        let Ok(image) = InlineImage::from_data_url(encoded) else {
            return encoded.to_string();
        };

        let bytes = match image.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Image payload is not decodable, storing it inline");
                return encoded.to_string();
            }
        };

        let path = format!("reports/{}.{}", Uuid::new_v4(), image.extension());
        match self.backend.upload_image(&path, bytes, &image.mime_type).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, path = %path, "Image upload failed, storing it inline");
                encoded.to_string()
            }
        }
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<User>> {
        self.backend.fetch_profile(user_id).await
    }

    /// Push a profile change; failures are logged only.
    pub async fn sync_profile(&self, user: &User) {
        if let Err(e) = self.backend.upsert_profile(user).await {
            warn!(error = %e, user_id = %user.id, "Profile sync failed");
        }
    }
}
