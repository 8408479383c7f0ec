//! Canonical drift detection and compensation.

use std::sync::Arc;

use super::ReconcileError;
use crate::remote::RemoteCatalogClient;
use crate::source::{ArticleSource, Renderer};
use crate::store::ArticleRepository;
use pressmirror_types::{HistoryEntry, HistoryKind, Item, RemoteRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The cached canonical is still current
    Unchanged { canonical: String },
    /// The canonical moved and the stored record was migrated
    Renamed { from: String, to: String, republished: bool },
    /// The source no longer resolves the id
    Gone { canonical: String },
}

#[derive(Clone)]
pub struct CanonicalResolver {
    source: Arc<dyn ArticleSource>,
    remote: RemoteCatalogClient,
    repo: ArticleRepository,
    renderer: Arc<dyn Renderer>,
}

impl CanonicalResolver {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        remote: RemoteCatalogClient,
        repo: ArticleRepository,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self { source, remote, repo, renderer }
    }

    pub fn source(&self) -> &Arc<dyn ArticleSource> {
        &self.source
    }

    /// Compare `cached` with the source's current canonical for `id`.
    pub async fn resolve(&self, id: &str, cached: &str) -> Result<Resolution, ReconcileError> {
        let Some(current) = self.source.canonical_for_id(id).await? else {
            tracing::info!("[Resolver] {} ({}) no longer resolves, treating as deleted", id, cached);
            return Ok(Resolution::Gone { canonical: cached.to_string() });
        };
        if current == cached {
            return Ok(Resolution::Unchanged { canonical: current });
        }
        tracing::info!("[Resolver] Canonical changed for {}: {} -> {}", id, cached, current);
        self.migrate(cached, &current).await
    }

    /// Move the record from `from` to `to`. A remote article under the old
    /// key is deleted before the record moves, so a failed delete leaves
    /// the old record and id mapping in place for the next notification.
    async fn migrate(&self, from: &str, to: &str) -> Result<Resolution, ReconcileError> {
        let mode = self.repo.mode();
        let Some(mut item) = self.repo.item(from).await? else {
            return Ok(Resolution::Unchanged { canonical: from.to_string() });
        };

        let was_sent = item.was_sent(mode);
        let was_published = item.record(mode).is_published();
        if was_sent {
            let deleted = match self.remote.delete(from).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    let entry =
                        HistoryEntry::failure(HistoryKind::Delete, mode, format!("rename to {to}: {e}"));
                    self.repo.append_history(from, entry).await?;
                    return Err(e.into());
                },
            };
            item.remote.set(mode, RemoteRecord::Absent);
            item.push_history(
                HistoryEntry::success(HistoryKind::Delete, mode).with_detail(format!("old canonical {from}")),
            );
            tracing::debug!("[Resolver] Remote delete for {} returned {}", from, deleted);
        }

        item.canonical = to.to_string();
        self.repo.save_item(&item).await?;
        self.repo.remove_item(from).await?;

        let republished = match self.source.fetch(to).await? {
            Some(content) if was_sent => {
                item.refresh(content);
                self.republish(&mut item, was_published).await?
            },
            Some(content) => {
                item.refresh(content);
                false
            },
            None => {
                tracing::warn!("[Resolver] {} resolved but could not be fetched", to);
                false
            },
        };

        if !republished {
            item.push_history(
                HistoryEntry::success(HistoryKind::CanonicalChanged, mode).with_detail(format!("{from} -> {to}")),
            );
        }
        self.repo.save_item(&item).await?;
        Ok(Resolution::Renamed { from: from.to_string(), to: to.to_string(), republished })
    }

    /// Render and post `item`, recording the outcome on it. Returns false
    /// when the item was rejected (unsupported content or a failed import);
    /// other failures propagate.
    pub(crate) async fn republish(
        &self,
        item: &mut Item,
        published: bool,
    ) -> Result<bool, ReconcileError> {
        let mode = self.repo.mode();
        let rendered = match self.renderer.render(item) {
            Ok(rendered) => rendered,
            Err(e) if e.is_validation() => {
                tracing::warn!("[Resolver] Not republishing {}: {}", item.canonical, e);
                item.push_history(HistoryEntry::failure(HistoryKind::Update, mode, e.to_string()));
                return Ok(false);
            },
            Err(e) => return Err(e.into()),
        };

        match self.remote.post(&rendered.html, published, true).await {
            Ok(outcome) => {
                let remote_id = outcome.remote_id.unwrap_or(outcome.import_id);
                item.remote.set(mode, RemoteRecord::Present { remote_id, published });
                let mut entry = HistoryEntry::success(HistoryKind::Update, mode);
                if !outcome.warnings.is_empty() {
                    entry = entry.with_detail(outcome.warnings.join("; "));
                }
                item.push_history(entry);
                Ok(true)
            },
            Err(e) if e.is_import_failure() => {
                tracing::warn!("[Resolver] Import rejected for {}: {}", item.canonical, e);
                item.push_history(HistoryEntry::failure(HistoryKind::Update, mode, e.to_string()));
                Ok(false)
            },
            Err(e) => Err(e.into()),
        }
    }
}
