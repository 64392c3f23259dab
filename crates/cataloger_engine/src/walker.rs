//! Depth-first traversal of one server's catalog.
//!
//! The catalog is an untrusted graph: folders may cross-link and listings may
//! repeat children. Traversal uses an explicit stack and a visited set owned by
//! the [`CrawlSession`], so cycles terminate and depth never grows the call
//! stack.

use std::collections::HashSet;
use std::sync::Arc;

use cataloger_core::descriptor::{self, ChildRef};
use cataloger_core::{
    child_url, classify, classify_leaf, folder_url, service_url, Classification, DisplayInfo,
    ResourceType,
};
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::fetch::{Fetcher, ProgressSink};
use crate::store::{blocking, CatalogStore, NewResource, StoreError};
use crate::{CrawlStats, EngineEvent, VersionChange};

/// Traversal state for one crawl of one server.
#[derive(Debug)]
pub struct CrawlSession {
    server_url: String,
    run_id: i64,
    visited: HashSet<String>,
    cancel: CancellationToken,
    stats: CrawlStats,
}

impl CrawlSession {
    pub fn new(server_url: impl Into<String>, run_id: i64, cancel: CancellationToken) -> Self {
        Self {
            server_url: server_url.into(),
            run_id,
            visited: HashSet::new(),
            cancel,
            stats: CrawlStats::default(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(node_key(url))
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }

    /// Marks `url` visited; false if it already was.
    fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(node_key(url).to_string())
    }

    /// True once cancellation was requested; no new fetches are issued after.
    fn check_cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.stats.cancelled = true;
        }
        self.stats.cancelled
    }
}

/// Nodes are identified without a trailing slash.
fn node_key(url: &str) -> &str {
    url.trim_end_matches('/')
}

struct Frame {
    url: String,
    parent_url: Option<String>,
}

pub struct TreeWalker<'a> {
    fetcher: &'a dyn Fetcher,
    store: &'a Arc<CatalogStore>,
    sink: &'a dyn ProgressSink,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        store: &'a Arc<CatalogStore>,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            fetcher,
            store,
            sink,
        }
    }

    /// Crawl the subtree rooted at `url`. Fetch failures only truncate the
    /// affected subtree; store failures abort the crawl.
    pub async fn crawl(
        &self,
        session: &mut CrawlSession,
        url: &str,
        parent_url: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut frontier = vec![Frame {
            url: node_key(url).to_string(),
            parent_url: parent_url.map(ToOwned::to_owned),
        }];

        while let Some(frame) = frontier.pop() {
            if !session.mark_visited(&frame.url) {
                engine_debug!("Already visited {}", frame.url);
                continue;
            }
            if session.check_cancelled() {
                engine_info!(
                    "Crawl run {} of {} cancelled",
                    session.run_id(),
                    session.server_url
                );
                break;
            }
            let children = self.visit_node(session, &frame).await?;
            // Reversed so the first declared child is visited first.
            frontier.extend(children.into_iter().rev());
        }
        Ok(())
    }

    async fn visit_node(
        &self,
        session: &mut CrawlSession,
        frame: &Frame,
    ) -> Result<Vec<Frame>, StoreError> {
        engine_info!("Crawling: {}", frame.url);
        let fetched = self.fetch(&frame.url).await;

        let classification = classify(&frame.url, fetched.as_ref(), frame.parent_url.is_some());
        let display = match (&fetched, classification.kind) {
            (Some(d), ResourceType::Service) => descriptor::service_display(d),
            _ => DisplayInfo::default(),
        };
        let server_url = session.server_url.clone();
        self.persist(
            session,
            NewResource {
                url: frame.url.clone(),
                classification,
                parent_url: frame.parent_url.clone(),
                server_url,
                accessible: fetched.is_some(),
                metadata: fetched.clone().unwrap_or_else(descriptor::empty),
                display,
            },
        )
        .await?;

        let Some(node) = fetched else {
            return Ok(Vec::new());
        };

        let mut children = Vec::new();
        for folder in descriptor::child_folders(&node) {
            match folder_url(&frame.url, &folder) {
                Ok(url) => children.push(Frame::child_of(url, &frame.url)),
                Err(err) => engine_warn!("Skipping folder {:?} of {}: {}", folder, frame.url, err),
            }
        }
        for service in descriptor::child_services(&node) {
            match service_url(&frame.url, &service) {
                Ok(url) => children.push(Frame::child_of(url, &frame.url)),
                Err(err) => {
                    engine_warn!("Skipping service {:?} of {}: {}", service.name, frame.url, err)
                }
            }
        }

        let leaves = [
            (ResourceType::Layer, descriptor::layer_refs(&node)),
            (ResourceType::Table, descriptor::table_refs(&node)),
        ];
        for (kind, refs) in leaves {
            for child in refs {
                if session.check_cancelled() {
                    return Ok(Vec::new());
                }
                self.visit_leaf(session, &frame.url, kind, child).await?;
            }
        }

        Ok(children)
    }

    /// Layers and tables are listed by reference and fetched individually.
    /// A failed fetch still records the node from its listing summary.
    async fn visit_leaf(
        &self,
        session: &mut CrawlSession,
        parent_url: &str,
        kind: ResourceType,
        child: ChildRef,
    ) -> Result<(), StoreError> {
        let url = match child_url(parent_url, &child.id) {
            Ok(url) => url,
            Err(err) => {
                engine_warn!("Skipping {} {:?} of {}: {}", kind, child.id, parent_url, err);
                return Ok(());
            }
        };
        if !session.mark_visited(&url) {
            engine_debug!("Already visited {}", url);
            return Ok(());
        }

        let server_url = session.server_url.clone();
        let Some(leaf) = self.fetch(&url).await else {
            let display = descriptor::leaf_display(&child.summary);
            self.persist(
                session,
                NewResource {
                    url,
                    classification: Classification::new(kind),
                    parent_url: Some(parent_url.to_string()),
                    server_url,
                    accessible: false,
                    metadata: child.summary,
                    display,
                },
            )
            .await?;
            return Ok(());
        };

        let fields = descriptor::fields(&leaf);
        let classification = classify_leaf(kind, Some(&leaf));
        let display = descriptor::leaf_display(&leaf);
        self.persist(
            session,
            NewResource {
                url: url.clone(),
                classification,
                parent_url: Some(parent_url.to_string()),
                server_url,
                accessible: true,
                metadata: leaf,
                display,
            },
        )
        .await?;

        let store = Arc::clone(self.store);
        let recorded = blocking(move || {
            let mut recorded = Vec::with_capacity(fields.len());
            for field in &fields {
                let change = store.upsert_field(&url, field)?;
                let domains = store.record_domain_entries(&url, &field.name, &field.coded_values)?;
                recorded.push((change, domains));
            }
            Ok(recorded)
        })
        .await?;
        for (change, domains) in recorded {
            session.stats.record_field(change);
            session.stats.domain_entries += domains;
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Option<Value> {
        match self.fetcher.fetch_descriptor(url).await {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                engine_warn!("Failed to fetch {}: {}", url, err);
                None
            }
        }
    }

    async fn persist(
        &self,
        session: &mut CrawlSession,
        resource: NewResource,
    ) -> Result<VersionChange, StoreError> {
        let store = Arc::clone(self.store);
        let (resource, change) = blocking(move || {
            let change = store.upsert_resource(&resource)?;
            Ok((resource, change))
        })
        .await?;
        if change == VersionChange::Superseded {
            engine_info!("New version of {} {}", resource.classification.kind, resource.url);
        }
        session.stats.record_node(resource.accessible, change);
        self.sink.emit(EngineEvent::NodeVisited {
            server_url: session.server_url.clone(),
            url: resource.url,
            kind: resource.classification.kind,
            accessible: resource.accessible,
            change,
        });
        Ok(change)
    }
}

impl Frame {
    fn child_of(url: String, parent: &str) -> Self {
        Self {
            url: node_key(&url).to_string(),
            parent_url: Some(parent.to_string()),
        }
    }
}
