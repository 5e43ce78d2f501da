use serde_json::json;
use tracing::{debug, warn};

use crate::ports::{ExitReason, Notification, SUBJECT_EXPIRED_INVITATION};
use crate::service::PartyMatch;

impl PartyMatch {
    /// Counts ticks spent empty since creation. Returns an exit reason once
    /// the initial join window has run out.
    pub(crate) fn check_initial_join_window(&mut self) -> Option<ExitReason> {
        if self.ever_joined || !self.ledger.is_empty() {
            return None;
        }

        self.empty_ticks += 1;
        if self.empty_ticks >= self.config.initial_join_ticks {
            debug!(
                party_id = %self.party_id,
                ticks = self.empty_ticks,
                "Nobody joined within the initial join window"
            );
            return Some(ExitReason::NeverJoined);
        }
        None
    }

    /// Removes expired invitations and tells the invitee and every member.
    ///
    /// Notification failures are logged and otherwise ignored.
    pub(crate) async fn sweep_expired_invitations(&mut self) {
        if !self.config.invitations_expire() {
            return;
        }

        let expired = self.registry.sweep_expired(self.now());
        if expired.is_empty() {
            return;
        }
        self.gate.invalidate();

        let members = self.ledger.presences();
        for user_id in expired {
            debug!(party_id = %self.party_id, user_id = %user_id, "Invitation expired");
            let content = json!({
                "party_id": self.party_id.to_string(),
                "member_id": user_id,
            });

            if !members.is_empty() {
                let batch = members
                    .iter()
                    .map(|p| {
                        Notification::party(
                            p.user_id.clone(),
                            SUBJECT_EXPIRED_INVITATION,
                            content.clone(),
                        )
                    })
                    .collect();
                if let Err(e) = self.deps.notifier.send_all(batch).await {
                    warn!(party_id = %self.party_id, error = %e, "Expired invitation notice to party failed");
                }
            }

            let notice = Notification::party(user_id.clone(), SUBJECT_EXPIRED_INVITATION, content);
            if let Err(e) = self.deps.notifier.send(notice).await {
                warn!(party_id = %self.party_id, user_id = %user_id, error = %e, "Expired invitation notice to invitee failed");
            }
        }
    }
}
