use crate::authority::{CreatePollRequest, NewPollOption, PollAuthority};
use crate::error::ActionError;
use crate::models::PollMessage;
use crate::voting::{PollDraft, can_create};
use log::{error, info};

/// Validates `draft` and, only if it passes, asks the authority to post it
/// as a poll message in `channel_id`.
pub async fn create_poll(
    authority: &dyn PollAuthority,
    channel_id: &str,
    draft: &PollDraft,
) -> Result<PollMessage, ActionError> {
    can_create(draft)?;

    let request = CreatePollRequest {
        question: draft.question.trim().to_string(),
        options: draft
            .trimmed_options()
            .into_iter()
            .map(|option| NewPollOption { option })
            .collect(),
        channel_id: channel_id.to_string(),
        is_multi_choice: draft.is_multi_choice,
        is_anonymous: draft.is_anonymous,
    };

    match authority.create_poll(request).await {
        Ok(created) => {
            info!(
                "Poll created successfully: poll_id={}, channel_id={}",
                created.poll_id, channel_id
            );
            Ok(PollMessage {
                message_id: created.message_id,
                poll_id: created.poll_id,
            })
        }
        Err(e) => {
            error!("Error creating poll in {}: {}", channel_id, e);
            Err(e.into())
        }
    }
}
