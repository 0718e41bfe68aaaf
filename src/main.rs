use chat_polls::authority::InMemoryAuthority;
use chat_polls::voting::DraftSelection;
use chat_polls::{Config, LiveSyncController, PollDraft, PollSession, PollStore, ViewMode};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

// Gives the change feed time to reach the other session
const SYNC_GRACE: Duration = Duration::from_millis(200);

fn session(authority: &Arc<InMemoryAuthority>, user_id: &str, config: &Config) -> PollSession {
    let client = Arc::new(authority.client(user_id).with_latency(Duration::from_millis(20)));
    let store = PollStore::new();
    let sync = LiveSyncController::spawn(
        client.clone(),
        store.clone(),
        user_id.to_string(),
        authority.changes(),
        config.sync(),
    );
    PollSession::new(user_id, &config.channel_id, client, store).with_live_sync(sync)
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let authority = InMemoryAuthority::new(config.notification_buffer);
    let me = session(&authority, &config.user_id, &config);
    let teammate = session(&authority, "teammate", &config);

    // --- Single-choice poll ---
    let draft = PollDraft::new("Best season?").with_options(["Summer", "Winter"]);
    let message = me.attempt_create(&draft).await?;
    let opened = me.open(&message).await?;
    teammate.open(&message).await?;

    let _watch = teammate.subscribe(&message.poll_id, |snapshot| {
        info!(
            "teammate sees {} vote(s) on \"{}\"",
            snapshot.poll.total_votes, snapshot.poll.question
        );
    });

    let summer = opened.poll.options[0].id.clone();
    me.attempt_vote(&message, vec![summer.clone()]).await?;

    // Voting twice is refused before anything is sent
    if let Err(why) = me.attempt_vote(&message, vec![summer]).await {
        warn!("Second vote refused: {}", why);
    }

    tokio::time::sleep(SYNC_GRACE).await;
    if let Some(view) = teammate.view(&message.poll_id) {
        info!("{} ({:?})", view.question(), view.mode());
        for option in view.options() {
            info!("  {}: {}", option.text, option.percentage_label);
        }
        info!("  {}", view.total_votes_label());
    }

    // --- Multi-choice poll, previewed before submitting ---
    let draft = PollDraft::new("Which snacks for Friday?")
        .with_options(["Chips", "Fruit", "Cookies"])
        .multi_choice(true);
    let message = teammate.attempt_create(&draft).await?;
    let opened = teammate.open(&message).await?;
    me.open(&message).await?;

    let mut selection = DraftSelection::new();
    selection.toggle(&opened.poll.options[0].id);
    selection.toggle(&opened.poll.options[2].id);
    for option in selection.preview(&opened.poll).options {
        info!("  preview {}: {}", option.option_text, option.percentage_label());
    }
    teammate
        .attempt_vote(&message, selection.option_ids(&opened.poll))
        .await?;
    me.attempt_vote(&message, vec![opened.poll.options[2].id.clone()])
        .await?;

    tokio::time::sleep(SYNC_GRACE).await;
    if let Some(view) = me.view(&message.poll_id) {
        if view.mode() == ViewMode::Results {
            for option in view.options() {
                info!("  {}: {} ({} votes)", option.text, option.percentage_label, option.votes);
            }
        }
        if view.shows_voters() {
            for entry in me.voter_breakdown(&message).await? {
                let text = view.snapshot().poll.option_text(&entry.option_id);
                info!("  {} <- {:?}", text, entry.voters);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    info!("Running poll demo as {} in #{}", config.user_id, config.channel_id);

    if let Err(why) = run(config).await {
        error!("Demo failed: {}", why);
    }
}
