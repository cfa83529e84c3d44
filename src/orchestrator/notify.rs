//! Direct-message reports to workspace admins.

use tracing::{info, warn};

use crate::slack::gateway::ChatGateway;

use super::context::WorkspaceContext;

/// DM `text` to every admin. Delivery failures are logged and skipped.
///
/// Returns the number of admins reached.
pub async fn notify_admins(gateway: &dyn ChatGateway, ctx: &WorkspaceContext, text: &str) -> usize {
    let mut delivered = 0;
    for admin in &ctx.config.admins {
        match gateway.send_dm(admin, text).await {
            Ok(()) => delivered += 1,
            Err(err) => warn!(team_id = %ctx.team_id, user_id = %admin, %err, "admin notice failed"),
        }
    }
    if ctx.config.admins.is_empty() {
        warn!(team_id = %ctx.team_id, "no admins to notify");
    } else {
        info!(team_id = %ctx.team_id, delivered, "admins notified");
    }
    delivered
}
