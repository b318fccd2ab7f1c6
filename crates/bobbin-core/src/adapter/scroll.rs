//! Lazy cursor over an unbounded search result.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::Result;
use crate::ports::{DocumentStore, Hit, SearchPage};

/// Walks every hit of a scrolling search, one store page at a time.
///
/// At most one page is buffered. The cursor is released once an empty page
/// comes back; a `Scroll` dropped early leaves its cursor to the store's
/// keep-alive. Not restartable.
pub struct Scroll {
    store: Arc<dyn DocumentStore>,
    keep_alive: Duration,
    buffer: VecDeque<Hit>,
    scroll_id: Option<String>,
    done: bool,
}

impl Scroll {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        keep_alive: Duration,
        first: SearchPage,
    ) -> Self {
        Self {
            store,
            keep_alive,
            buffer: first.hits.into(),
            scroll_id: first.scroll_id,
            done: false,
        }
    }

    /// Next hit, fetching a new page when the buffer runs dry.
    pub async fn next(&mut self) -> Result<Option<Hit>> {
        if self.buffer.is_empty() && !self.fill().await? {
            return Ok(None);
        }
        Ok(self.buffer.pop_front())
    }

    /// Everything buffered, or the next page; `None` once exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Hit>>> {
        if self.buffer.is_empty() && !self.fill().await? {
            return Ok(None);
        }
        Ok(Some(self.buffer.drain(..).collect()))
    }

    async fn fill(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        let Some(scroll_id) = self.scroll_id.clone() else {
            self.done = true;
            return Ok(false);
        };

        let page = self.store.scroll(&scroll_id, self.keep_alive).await?;
        if page.hits.is_empty() {
            self.done = true;
            self.release(&scroll_id).await;
            return Ok(false);
        }

        if let Some(next) = page.scroll_id {
            self.scroll_id = Some(next);
        }
        self.buffer.extend(page.hits);
        Ok(true)
    }

    async fn release(&self, scroll_id: &str) {
        if let Err(err) = self.store.clear_scroll(scroll_id).await {
            warn!(%scroll_id, error = %err, "failed to clear scroll cursor");
        }
    }
}
