//! End-to-end bump flow over the in-memory platform and store

use std::sync::Arc;
use std::time::Duration;

use exobump::bot::Bot;
use exobump::commands::{Command, Interaction, Reply};
use exobump::config::BotConfig;
use exobump::persistence::{FlushOutcome, InMemoryStore, PersistenceSync};
use exobump::platform::{InMemoryPlatform, OutboundMessage};
use exobump::state::BotState;
use exobump::types::{ChannelId, CommunityId, MemberId};

struct Harness {
    bot: Bot,
    platform: Arc<InMemoryPlatform>,
    store: Arc<InMemoryStore>,
    sync: PersistenceSync,
}

fn harness(config: BotConfig) -> Harness {
    let state = Arc::new(BotState::new());
    let platform = Arc::new(InMemoryPlatform::new());
    let store = Arc::new(InMemoryStore::new());
    let sync = PersistenceSync::new(Arc::clone(&state), store.clone(), config.autosave_interval);
    let bot = Bot::new(config, state, platform.clone()).unwrap();
    Harness {
        bot,
        platform,
        store,
        sync,
    }
}

fn interaction(community: &str, actor: &str, admin: bool, command: Command) -> Interaction {
    Interaction {
        community_id: CommunityId::from(community),
        actor_id: MemberId::from(actor),
        actor_is_admin: admin,
        command,
    }
}

async fn subscribe(h: &Harness, community: &str) {
    let channel = format!("{}-bumps", community);
    h.platform.add_community(community, &community.to_uppercase());
    h.platform.add_channel(community, channel.as_str());
    let reply = h
        .bot
        .dispatch(interaction(
            community,
            &format!("{}-admin", community),
            true,
            Command::BumpSetChannel {
                channel: ChannelId::from(channel),
            },
        ))
        .await;
    assert!(matches!(reply, Reply::Updated { .. }));
}

#[tokio::test]
async fn test_bump_reaches_every_subscriber_and_persists() {
    let h = harness(BotConfig::default());
    for community in ["a", "b", "c"] {
        subscribe(&h, community).await;
    }

    let reply = h.bot.dispatch(interaction("a", "alice", false, Command::Bump)).await;
    let outcome = match reply {
        Reply::Bumped(outcome) => outcome,
        other => panic!("unexpected reply: {:?}", other),
    };
    assert_eq!(outcome.delivery.succeeded, 3);
    assert_eq!(outcome.delivery.failed, 0);
    assert_eq!(outcome.total_bumps, 1);

    let announcements = h
        .platform
        .sent()
        .into_iter()
        .filter(|(_, message)| matches!(message, OutboundMessage::Announcement(_)))
        .count();
    assert_eq!(announcements, 3);

    // Same community again is on cooldown
    let reply = h.bot.dispatch(interaction("a", "bob", false, Command::Bump)).await;
    assert!(matches!(reply, Reply::Declined { .. }));

    assert_eq!(
        h.sync.flush_if_dirty().await.unwrap(),
        FlushOutcome::Flushed {
            communities: 3,
            members: 1
        }
    );
    assert_eq!(h.store.commits(), 1);
    assert_eq!(h.sync.flush_if_dirty().await.unwrap(), FlushOutcome::Clean);

    // A fresh process sees the same data
    let restored = Arc::new(BotState::new());
    let sync = PersistenceSync::new(
        Arc::clone(&restored),
        h.store.clone(),
        Duration::from_secs(300),
    );
    assert_eq!(sync.hydrate().await, 3);
    let a = restored.get(&CommunityId::from("a")).await.unwrap();
    assert_eq!(a.bumps.total, 1);
    assert_eq!(a.ad_views, 1);
    assert_eq!(a.members[&MemberId::from("alice")].bump_count, 1);
    assert!(!restored.dirty().is_dirty());
}

#[tokio::test]
async fn test_failed_recipient_does_not_block_others() {
    let h = harness(BotConfig::default());
    for community in ["a", "b", "c"] {
        subscribe(&h, community).await;
    }
    h.platform.fail_channel("b-bumps");

    let reply = h.bot.dispatch(interaction("c", "carol", false, Command::Bump)).await;
    let Reply::Bumped(outcome) = reply else {
        panic!("bump did not complete");
    };
    assert_eq!(outcome.delivery.succeeded, 2);
    assert_eq!(outcome.delivery.failed, 1);

    let b = h.bot.state().get(&CommunityId::from("b")).await.unwrap();
    assert_eq!(b.ad_views, 0);
}

#[tokio::test]
async fn test_concurrent_bumps_from_many_communities() {
    let config = BotConfig {
        max_concurrent_bumps: 2,
        ..BotConfig::default()
    };
    let h = Arc::new(harness(config));
    let names: Vec<String> = (0..6).map(|i| format!("g{}", i)).collect();
    for name in &names {
        subscribe(&h, name).await;
    }

    let mut tasks = Vec::new();
    for name in names.clone() {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            let actor = format!("{}-member", name);
            h.bot
                .dispatch(interaction(&name, &actor, false, Command::Bump))
                .await
        }));
    }
    for task in tasks {
        let reply = task.await.unwrap();
        assert!(matches!(reply, Reply::Bumped(_) | Reply::Queued { .. }));
    }
    h.bot.wait_idle().await;

    let stats = h.bot.queue_stats();
    assert_eq!(stats.completed, 6);
    assert_eq!(stats.in_flight, 0);
    for name in &names {
        let record = h.bot.state().get(&CommunityId::from(name.as_str())).await.unwrap();
        assert_eq!(record.bumps.total, 1);
        assert_eq!(record.ad_views, 6);
    }
}

#[tokio::test]
async fn test_reminder_fires_after_cooldown() {
    let config = BotConfig {
        bump_cooldown: Duration::from_millis(100),
        ..BotConfig::default()
    };
    let h = harness(config);
    subscribe(&h, "a").await;
    h.bot
        .dispatch(interaction("a", "alice", false, Command::PingConfig))
        .await;

    let reply = h.bot.dispatch(interaction("a", "alice", false, Command::Bump)).await;
    let Reply::Bumped(outcome) = reply else {
        panic!("bump did not complete");
    };
    assert!(outcome.reminder_at.is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let reminders: Vec<_> = h
        .platform
        .sent()
        .into_iter()
        .filter(|(_, message)| matches!(message, OutboundMessage::Reminder { .. }))
        .collect();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].0, ChannelId::from("a-bumps"));
    assert_eq!(h.bot.reminders().fired_count(), 1);
}
