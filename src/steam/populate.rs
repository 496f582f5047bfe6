//! Catalog download orchestrator: paginated id listing, then detail fetches

use super::rest::{CatalogSource, MAX_DETAILS_PER_CALL};
use super::WorkshopItem;
use crate::progress::ProgressObserver;
use anyhow::{bail, Result};
use std::time::Duration;
use tokio::time::sleep;

/// Statistics from a catalog download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub pages_fetched: u32,
    pub ids_listed: usize,
    pub detail_batches_failed: usize,
    pub mods_fetched: usize,
}

/// Downloads the full Workshop catalog of one game
pub struct CatalogFetcher<'a> {
    source: &'a dyn CatalogSource,
    per_page: u32,
    delay_between_pages: Duration,
}

impl<'a> CatalogFetcher<'a> {
    pub fn new(source: &'a dyn CatalogSource, per_page: u32) -> Result<Self> {
        if per_page == 0 {
            bail!("mods_per_page must be at least 1");
        }

        Ok(Self {
            source,
            per_page,
            delay_between_pages: Duration::ZERO,
        })
    }

    /// Pause between page requests
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.delay_between_pages = delay;
        self
    }

    /// List every published file id of the game.
    ///
    /// Stops at the first empty or short page. A failed page aborts the
    /// whole listing; nothing partial is returned.
    pub async fn fetch_all_ids(
        &self,
        app_id: u32,
        progress: &dyn ProgressObserver,
        stats: &mut FetchStats,
    ) -> Result<Vec<String>> {
        let probe = self.source.query_page(app_id, 1, 1).await?;
        let total = probe.total;

        tracing::info!("Catalog for app {} reports {} items", app_id, total);

        let mut ids = Vec::new();
        let mut page = 1;

        loop {
            let result = self.source.query_page(app_id, page, self.per_page).await?;
            stats.pages_fetched += 1;

            if result.items.is_empty() {
                break;
            }

            let count = result.items.len();
            ids.extend(result.items.into_iter().map(|item| item.publishedfileid));
            progress.on_progress(ids.len() as u64, total.max(ids.len() as u64), "IDs retrieved");

            if count < self.per_page as usize {
                break;
            }

            page += 1;
            if !self.delay_between_pages.is_zero() {
                sleep(self.delay_between_pages).await;
            }
        }

        stats.ids_listed = ids.len();
        tracing::info!("Listed {} ids over {} pages", ids.len(), stats.pages_fetched);
        Ok(ids)
    }

    /// Fetch full records in batches of 100.
    ///
    /// A failed batch is logged and skipped so one bad batch does not cost
    /// the whole download.
    pub async fn fetch_details(
        &self,
        ids: &[String],
        progress: &dyn ProgressObserver,
        stats: &mut FetchStats,
    ) -> Vec<WorkshopItem> {
        let batches = ids.len().div_ceil(MAX_DETAILS_PER_CALL) as u64;
        let mut mods = Vec::with_capacity(ids.len());

        for (i, chunk) in ids.chunks(MAX_DETAILS_PER_CALL).enumerate() {
            match self.source.fetch_details(chunk).await {
                Ok(items) => mods.extend(items),
                Err(e) => {
                    stats.detail_batches_failed += 1;
                    tracing::warn!("Skipping detail batch {}: {:#}", i + 1, e);
                }
            }
            progress.on_progress(i as u64 + 1, batches, "Downloading metadata");
        }

        stats.mods_fetched = mods.len();
        mods
    }

    /// List and fetch everything
    pub async fn fetch_all(
        &self,
        app_id: u32,
        progress: &dyn ProgressObserver,
    ) -> Result<(Vec<WorkshopItem>, FetchStats)> {
        let mut stats = FetchStats::default();
        let ids = self.fetch_all_ids(app_id, progress, &mut stats).await?;
        let mods = self.fetch_details(&ids, progress, &mut stats).await;
        progress.finish();

        tracing::info!(
            "Catalog download complete for app {}: {} ids, {} records, {} failed batches",
            app_id,
            stats.ids_listed,
            stats.mods_fetched,
            stats.detail_batches_failed
        );

        Ok((mods, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::steam::rest::{MockCatalogSource, QueryPage};
    use anyhow::anyhow;

    fn item(id: usize) -> WorkshopItem {
        serde_json::from_value(serde_json::json!({
            "publishedfileid": id.to_string(),
            "tags": [{"tag": "Mod"}]
        }))
        .unwrap()
    }

    fn page(ids: std::ops::Range<usize>, total: u64) -> QueryPage {
        QueryPage {
            total,
            items: ids.map(item).collect(),
        }
    }

    #[tokio::test]
    async fn pagination_stops_on_short_page() {
        let mut source = MockCatalogSource::new();
        source
            .expect_query_page()
            .withf(|_, _, per_page| *per_page == 1)
            .returning(|_, _, _| Ok(page(0..1, 5)));
        source
            .expect_query_page()
            .withf(|_, p, per_page| *per_page == 2 && *p == 1)
            .returning(|_, _, _| Ok(page(0..2, 5)));
        source
            .expect_query_page()
            .withf(|_, p, per_page| *per_page == 2 && *p == 2)
            .returning(|_, _, _| Ok(page(2..4, 5)));
        source
            .expect_query_page()
            .withf(|_, p, per_page| *per_page == 2 && *p == 3)
            .returning(|_, _, _| Ok(page(4..5, 5)));

        let fetcher = CatalogFetcher::new(&source, 2).unwrap();
        let mut stats = FetchStats::default();
        let ids = fetcher
            .fetch_all_ids(42, &NoProgress, &mut stats)
            .await
            .unwrap();

        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(stats.pages_fetched, 3);
    }

    #[tokio::test]
    async fn pagination_stops_on_empty_page() {
        let mut source = MockCatalogSource::new();
        source.expect_query_page().returning(|_, p, per_page| {
            if per_page == 1 {
                Ok(page(0..1, 2))
            } else if p == 1 {
                Ok(page(0..2, 2))
            } else {
                Ok(QueryPage::default())
            }
        });

        let fetcher = CatalogFetcher::new(&source, 2).unwrap();
        let mut stats = FetchStats::default();
        let ids = fetcher
            .fetch_all_ids(42, &NoProgress, &mut stats)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(stats.pages_fetched, 2);
    }

    #[tokio::test]
    async fn failed_page_fails_listing() {
        let mut source = MockCatalogSource::new();
        source.expect_query_page().returning(|_, p, per_page| {
            if per_page == 1 || p == 1 {
                Ok(page(0..2, 10))
            } else {
                Err(anyhow!("boom"))
            }
        });

        let fetcher = CatalogFetcher::new(&source, 2).unwrap();
        let mut stats = FetchStats::default();
        assert!(fetcher
            .fetch_all_ids(42, &NoProgress, &mut stats)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn details_are_batched_and_failed_batches_skipped() {
        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_details()
            .times(3)
            .returning(|ids: &[String]| {
                assert!(ids.len() <= MAX_DETAILS_PER_CALL);
                if ids[0] == "100" {
                    Err(anyhow!("timeout"))
                } else {
                    Ok(ids.iter().map(|id| item(id.parse().unwrap())).collect())
                }
            });

        let ids: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let fetcher = CatalogFetcher::new(&source, 100).unwrap();
        let mut stats = FetchStats::default();
        let mods = fetcher.fetch_details(&ids, &NoProgress, &mut stats).await;

        assert_eq!(mods.len(), 150);
        assert_eq!(stats.detail_batches_failed, 1);
        assert_eq!(stats.mods_fetched, 150);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let source = MockCatalogSource::new();
        assert!(CatalogFetcher::new(&source, 0).is_err());
    }
}
