//! Reuse of generated designs while the proposal is unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::canva::store;
use crate::errors::AppError;
use crate::models::canva::CanvaProposalDesignRow;

#[derive(Debug, Clone, Copy)]
pub struct DesignKey<'a> {
    pub proposal_id: Uuid,
    pub company_id: &'a str,
    pub brand_template_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct GeneratedDesign {
    pub design_id: String,
    pub edit_url: Option<String>,
    pub view_url: Option<String>,
}

#[async_trait]
pub trait DesignCacheStore: Send + Sync {
    async fn find(&self, key: DesignKey<'_>) -> Result<Option<CanvaProposalDesignRow>, AppError>;
    async fn save(&self, row: &CanvaProposalDesignRow) -> Result<CanvaProposalDesignRow, AppError>;
}

/// Produces a fresh design; only called on a cache miss.
#[async_trait]
pub trait DesignGenerator: Send + Sync {
    async fn generate(&self) -> Result<GeneratedDesign, AppError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsuredDesign {
    #[serde(flatten)]
    pub design: CanvaProposalDesignRow,
    pub cached: bool,
}

pub struct PgDesignCache<'a> {
    pub pool: &'a PgPool,
}

#[async_trait]
impl DesignCacheStore for PgDesignCache<'_> {
    async fn find(&self, key: DesignKey<'_>) -> Result<Option<CanvaProposalDesignRow>, AppError> {
        Ok(store::get_proposal_design(
            self.pool,
            key.proposal_id,
            key.company_id,
            key.brand_template_id,
        )
        .await?)
    }

    async fn save(&self, row: &CanvaProposalDesignRow) -> Result<CanvaProposalDesignRow, AppError> {
        Ok(store::upsert_proposal_design(self.pool, row).await?)
    }
}

/// Returns the cached design when it was built from the current proposal
/// revision, otherwise generates a new one and records it.
pub async fn ensure_canva_design_for_proposal(
    cache: &dyn DesignCacheStore,
    generator: &dyn DesignGenerator,
    key: DesignKey<'_>,
    proposal_updated_at: DateTime<Utc>,
) -> Result<EnsuredDesign, AppError> {
    if let Some(existing) = cache.find(key).await? {
        if existing.last_proposal_updated_at >= proposal_updated_at {
            info!(
                "Reusing design {} for proposal {}",
                existing.design_id, key.proposal_id
            );
            return Ok(EnsuredDesign {
                design: existing,
                cached: true,
            });
        }
    }

    let generated = generator.generate().await?;
    info!(
        "Generated design {} for proposal {}",
        generated.design_id, key.proposal_id
    );

    let row = CanvaProposalDesignRow {
        proposal_id: key.proposal_id,
        company_id: key.company_id.to_string(),
        brand_template_id: key.brand_template_id.to_string(),
        design_id: generated.design_id,
        edit_url: generated.edit_url,
        view_url: generated.view_url,
        export_url: None,
        last_proposal_updated_at: proposal_updated_at,
        updated_at: Utc::now(),
    };
    let saved = cache.save(&row).await?;
    Ok(EnsuredDesign {
        design: saved,
        cached: false,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;

    #[derive(Default)]
    struct MemoryCache {
        row: Mutex<Option<CanvaProposalDesignRow>>,
        saves: AtomicU32,
    }

    #[async_trait]
    impl DesignCacheStore for MemoryCache {
        async fn find(
            &self,
            key: DesignKey<'_>,
        ) -> Result<Option<CanvaProposalDesignRow>, AppError> {
            Ok(self
                .row
                .lock()
                .unwrap()
                .clone()
                .filter(|r| r.proposal_id == key.proposal_id && r.company_id == key.company_id))
        }

        async fn save(
            &self,
            row: &CanvaProposalDesignRow,
        ) -> Result<CanvaProposalDesignRow, AppError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.row.lock().unwrap() = Some(row.clone());
            Ok(row.clone())
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DesignGenerator for CountingGenerator {
        async fn generate(&self) -> Result<GeneratedDesign, AppError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(GeneratedDesign {
                design_id: format!("D{n}"),
                edit_url: Some(format!("https://canva.example/D{n}/edit")),
                view_url: None,
            })
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl DesignGenerator for FailingGenerator {
        async fn generate(&self) -> Result<GeneratedDesign, AppError> {
            Err(AppError::JobTimeout("autofill job did not finish in time".to_string()))
        }
    }

    fn key(proposal_id: Uuid) -> DesignKey<'static> {
        DesignKey {
            proposal_id,
            company_id: "acme",
            brand_template_id: "BT1",
        }
    }

    fn cached_row(proposal_id: Uuid, at: DateTime<Utc>) -> CanvaProposalDesignRow {
        CanvaProposalDesignRow {
            proposal_id,
            company_id: "acme".to_string(),
            brand_template_id: "BT1".to_string(),
            design_id: "D0".to_string(),
            edit_url: None,
            view_url: None,
            export_url: None,
            last_proposal_updated_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_fresh_cache_entry_is_reused_without_generating() {
        let id = Uuid::new_v4();
        let updated = Utc::now() - Duration::hours(1);
        let cache = MemoryCache::default();
        *cache.row.lock().unwrap() = Some(cached_row(id, updated));
        let generator = CountingGenerator::default();

        let ensured = ensure_canva_design_for_proposal(&cache, &generator, key(id), updated)
            .await
            .unwrap();

        assert!(ensured.cached);
        assert_eq!(ensured.design.design_id, "D0");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_regenerated_and_overwritten() {
        let id = Uuid::new_v4();
        let cache = MemoryCache::default();
        *cache.row.lock().unwrap() = Some(cached_row(id, Utc::now() - Duration::days(1)));
        let generator = CountingGenerator::default();
        let proposal_updated = Utc::now();

        let ensured = ensure_canva_design_for_proposal(&cache, &generator, key(id), proposal_updated)
            .await
            .unwrap();

        assert!(!ensured.cached);
        assert_eq!(ensured.design.design_id, "D1");
        assert_eq!(ensured.design.last_proposal_updated_at, proposal_updated);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let again = ensure_canva_design_for_proposal(&cache, &generator, key(id), proposal_updated)
            .await
            .unwrap();
        assert!(again.cached);
        assert_eq!(again.design.design_id, "D1");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_cache_untouched() {
        let id = Uuid::new_v4();
        let cache = MemoryCache::default();
        let result =
            ensure_canva_design_for_proposal(&cache, &FailingGenerator, key(id), Utc::now()).await;

        assert!(matches!(result, Err(AppError::JobTimeout(_))));
        assert!(cache.row.lock().unwrap().is_none());
    }

    #[test]
    fn test_ensured_design_flattens_row() {
        let ensured = EnsuredDesign {
            design: cached_row(Uuid::new_v4(), Utc::now()),
            cached: true,
        };
        let value = serde_json::to_value(&ensured).unwrap();
        assert_eq!(value["design_id"], "D0");
        assert_eq!(value["cached"], true);
    }
}
