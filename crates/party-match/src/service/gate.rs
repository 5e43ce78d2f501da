//! Block list fetching for the social gate.

use party_types::UserId;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::domain::BlockReason;
use crate::service::PartyMatch;

impl PartyMatch {
    /// Fetches and caches `user_id`'s block list unless already cached.
    ///
    /// A failed fetch is not cached; the user counts as blocking nobody
    /// until a later fetch succeeds.
    pub(crate) async fn prefetch_blocked(&mut self, user_id: &UserId) {
        if self.gate.has_list(user_id) {
            return;
        }

        let mut blocked = Vec::new();
        let mut cursor = None;
        for _ in 0..self.config.blocked_max_pages {
            let page = match self
                .deps
                .social
                .list_blocked(user_id, self.config.blocked_page_size, cursor)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        party_id = %self.party_id,
                        user_id = %user_id,
                        error = %e,
                        "Blocked list fetch failed"
                    );
                    return;
                }
            };

            let last = page.users.is_empty() || page.cursor.is_none();
            blocked.extend(page.users);
            if last {
                break;
            }
            cursor = page.cursor;
        }

        debug!(party_id = %self.party_id, user_id = %user_id, blocked = blocked.len(), "Blocked list cached");
        self.gate.store_list(user_id.clone(), blocked);
    }

    /// Checks `candidate` against everyone relevant to the party, rebuilding
    /// the gate first if it is stale.
    pub(crate) async fn check_unblocked(&mut self, candidate: &UserId) -> Result<(), BlockReason> {
        let relevant: HashSet<UserId> = self.relevant_users();

        if self.gate.is_dirty() {
            for user in self.gate.missing(&relevant) {
                self.prefetch_blocked(&user).await;
            }
        }
        self.gate.ensure_fresh(&relevant);
        self.prefetch_blocked(candidate).await;

        self.gate.check(candidate, &relevant)
    }
}
