//! Scroll cursor over a clause query's full result set.

use alias_mapper_repository::{Endpoint, SearchError, SearchNodeClient};
use alias_mapper_shared::{ClauseQuery, Hit};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    NotStarted,
    Open { token: String },
    Exhausted { trailing_token: Option<String> },
}

/// Lazy, finite sequence of hit pages for one query.
///
/// The first call opens the scroll, later calls follow the continuation
/// token, and the sequence ends only when the service signals exhaustion.
/// A page whose hits were all dropped while parsing yields an empty batch
/// and the scroll carries on.
/// A failed fetch leaves the cursor untouched, so the same page can be
/// requested again from another node. [`restart`](Self::restart) begins
/// again from the first page when the server-side context is lost.
#[derive(Debug)]
pub struct ScrollCursor {
    query: ClauseQuery,
    page_size: usize,
    state: CursorState,
    pages: usize,
    restarts: u32,
}

impl ScrollCursor {
    pub fn new(query: ClauseQuery, page_size: usize) -> Self {
        Self {
            query,
            page_size,
            state: CursorState::NotStarted,
            pages: 0,
            restarts: 0,
        }
    }

    /// Fetch the next page from `endpoint`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(hits))` - The next page; empty when none of its hits parsed
    /// * `Ok(None)` - The result set is exhausted
    /// * `Err(SearchError)` - The fetch failed; the cursor did not advance
    pub async fn next_page(
        &mut self,
        client: &dyn SearchNodeClient,
        endpoint: &Endpoint,
    ) -> Result<Option<Vec<Hit>>, SearchError> {
        let page = match &self.state {
            CursorState::NotStarted => client.search(endpoint, &self.query, self.page_size).await?,
            CursorState::Open { token } => {
                client.scroll(endpoint, &self.query.entity_id, token).await?
            }
            CursorState::Exhausted { .. } => return Ok(None),
        };

        self.pages += 1;
        self.state = match page.next_token() {
            Some(token) => CursorState::Open {
                token: token.to_string(),
            },
            None => CursorState::Exhausted {
                trailing_token: page.token().map(str::to_string),
            },
        };

        if page.hits.is_empty() && self.is_exhausted() {
            Ok(None)
        } else {
            Ok(Some(page.hits))
        }
    }

    /// Forget the current position and start over from the first page.
    pub fn restart(&mut self) {
        self.state = CursorState::NotStarted;
        self.pages = 0;
        self.restarts += 1;
    }

    /// Times the cursor was restarted over its lifetime.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Token of the server-side context still held by this cursor, if any.
    pub fn open_token(&self) -> Option<&str> {
        match &self.state {
            CursorState::Open { token } => Some(token),
            CursorState::Exhausted { trailing_token } => trailing_token.as_deref(),
            CursorState::NotStarted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted { .. })
    }

    /// Pages fetched since the cursor was opened or restarted.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn query(&self) -> &ClauseQuery {
        &self.query
    }
}
