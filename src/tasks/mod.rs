pub mod live_sync;

pub use live_sync::{LiveSyncController, SyncConfig};

use crate::authority::PollAuthority;
use crate::error::AuthorityError;
use crate::models::{PollMessage, PollSnapshot};
use crate::store::PollStore;
use log::{debug, warn};
use std::sync::Arc;

/// Fetches the whole poll behind `message` and swaps it into the store.
///
/// `epoch` must be read from the store before the work that led to this
/// refetch began. Returns `Ok(None)` when the entry was torn down in the
/// meantime and the fetched state was dropped.
pub async fn refetch(
    authority: &dyn PollAuthority,
    store: &PollStore,
    user_id: &str,
    message: &PollMessage,
    epoch: u64,
) -> Result<Option<Arc<PollSnapshot>>, AuthorityError> {
    let payload = authority.get_poll(&message.message_id).await?;
    if payload.poll.id != message.poll_id {
        warn!(
            "Message {} returned poll {}, expected {}",
            message.message_id, payload.poll.id, message.poll_id
        );
    }

    let snapshot = PollSnapshot::from_payload(user_id, payload);
    let applied = store.replace_if_current(&message.poll_id, epoch, snapshot);
    if applied.is_none() {
        debug!("Poll {} was closed while refetching", message.poll_id);
    }
    Ok(applied)
}
