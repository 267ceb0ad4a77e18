//! End-to-end chat handling on the in-process host.

mod common;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use common::{eventually, harness, harness_with};
use tincture_chat::{
    ChatEvent, ChatOutcome, ChatPlayer, ChatSettings, FormatEvent, IdentityProvider,
    ListenerPriority, MetaStore, ProviderError,
};
use tincture_scheduler::{current_context, CapabilityProfile, EntityId, ThreadContext, Threading};
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

fn regionized() -> Threading {
    Threading::Regionized { regions: 3 }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_global_host_formats_and_delivers_to_everyone() {
    let h = harness(Threading::Single, ChatSettings::default());
    assert_eq!(h.pipeline.scheduler().profile(), CapabilityProfile::GlobalOnly);

    let alice = h.join("Alice", 0);
    let bob = h.join("Bob", 0);
    h.meta.set_prefix(alice.id(), "&c[Admin] ");

    let outcome = h.chat(&alice, "hi").await;
    let expected = "§c[Admin] Alice§7: §fhi".to_string();
    assert_eq!(
        outcome,
        ChatOutcome::Dispatched {
            recipients: 2,
            text: expected.clone()
        }
    );

    eventually("both inboxes", || alice.inbox().len() == 1 && bob.inbox().len() == 1).await;
    assert_eq!(alice.inbox().messages(), vec![expected.clone()]);
    assert_eq!(bob.inbox().messages(), vec![expected]);

    eventually("console line", || !h.console_lines().is_empty()).await;
    assert_eq!(h.console_lines(), vec!["[Admin] Alice: hi"]);

    for (_, context) in h.deliveries.lock().iter() {
        assert_eq!(*context, Some(ThreadContext::Global));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_regionized_delivery_runs_on_each_recipient_region() {
    let seen_on: Arc<Mutex<Option<ThreadContext>>> = Arc::default();
    let listener_context = seen_on.clone();
    let h = harness(regionized(), ChatSettings::default());
    h.pipeline
        .hooks()
        .register(ListenerPriority::Normal, move |_: &mut FormatEvent| {
            *listener_context.lock() = current_context();
        });
    assert_eq!(h.pipeline.scheduler().profile(), CapabilityProfile::RegionAware);

    let alice = h.join("Alice", 0);
    let bob = h.join("Bob", 1);
    let carol = h.join("Carol", 2);

    let outcome = h.chat(&bob, "hello").await;
    assert!(matches!(outcome, ChatOutcome::Dispatched { recipients: 3, .. }));
    assert_eq!(*seen_on.lock(), Some(ThreadContext::Async));

    eventually("three deliveries", || h.deliveries.lock().len() == 3).await;
    let deliveries = h.deliveries.lock().clone();
    for (player, region) in [(alice.id(), 0), (bob.id(), 1), (carol.id(), 2)] {
        assert!(
            deliveries.contains(&(player, Some(ThreadContext::Region(region)))),
            "delivery to region {} missing: {:?}",
            region,
            deliveries
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delivery_follows_migrated_recipient() {
    let h = harness(regionized(), ChatSettings::default());
    let alice = h.join("Alice", 0);
    let bob = h.join("Bob", 1);
    h.host.move_entity(bob.id(), 2);

    h.chat(&alice, "moved?").await;
    eventually("bob's delivery", || !bob.inbox().is_empty()).await;
    assert!(h
        .deliveries
        .lock()
        .contains(&(bob.id(), Some(ThreadContext::Region(2)))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancelled_message_reaches_nobody() {
    for threading in [Threading::Single, regionized()] {
        let h = harness(threading, ChatSettings::default());
        h.pipeline
            .hooks()
            .register(ListenerPriority::High, |e: &mut FormatEvent| {
                if e.message().contains("secret") {
                    e.set_cancelled(true);
                }
            });
        let alice = h.join("Alice", 0);
        let bob = h.join("Bob", 1);

        assert_eq!(h.chat(&alice, "a secret plan").await, ChatOutcome::Cancelled);
        sleep(Duration::from_millis(150)).await;
        assert!(alice.inbox().is_empty());
        assert!(bob.inbox().is_empty());
        assert!(h.console_lines().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listeners_can_rewrite_every_field() {
    let h = harness(Threading::Single, ChatSettings::default());
    h.pipeline
        .hooks()
        .register(ListenerPriority::Normal, |e: &mut FormatEvent| {
            let shouted = e.message().to_uppercase();
            e.set_message(shouted);
            e.set_prefix("[Hooked] ");
            e.set_suffix(" <3");
            e.set_format("{prefix}{player}{suffix} >> {message}");
        });
    let alice = h.join("Alice", 0);

    let outcome = h.chat(&alice, "quiet").await;
    assert_eq!(
        outcome,
        ChatOutcome::Dispatched {
            recipients: 1,
            text: "[Hooked] Alice <3 >> QUIET".into()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_recipient_is_skipped() {
    let h = harness(regionized(), ChatSettings::default());
    let alice = h.join("Alice", 0);
    let bob = h.join("Bob", 1);
    let carol = h.join("Carol", 2);

    let mut event = ChatEvent::new(alice.id(), "who is here", h.roster.online());
    h.leave(&carol);
    let ticket = h.pipeline.handle_chat(&mut event).expect("event accepted");

    assert!(matches!(ticket.outcome().await, ChatOutcome::Dispatched { recipients: 2, .. }));
    eventually("two deliveries", || alice.inbox().len() == 1 && bob.inbox().len() == 1).await;
    assert!(carol.inbox().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_recipient_retired_after_scheduling_is_skipped() {
    let h = harness(regionized(), ChatSettings::default());
    let alice = h.join("Alice", 0);
    let bob = h.join("Bob", 1);
    let carol = h.join("Carol", 2);
    let marker = h.host.spawn_entity(2);
    let scheduler = h.pipeline.scheduler().clone();

    // Hold region 2 so Carol's delivery queues behind this task.
    let parked = Arc::new(AtomicBool::new(false));
    let (release, released) = oneshot::channel::<()>();
    let parked_flag = parked.clone();
    scheduler.run_for_entity(
        marker,
        Box::new(move || {
            parked_flag.store(true, Ordering::SeqCst);
            let _ = released.blocking_recv();
        }),
    );
    eventually("region 2 parked", || parked.load(Ordering::SeqCst)).await;

    let outcome = h.chat(&alice, "still here?").await;
    let text = match outcome {
        ChatOutcome::Dispatched { recipients: 3, text } => text,
        other => panic!("unexpected outcome {:?}", other),
    };

    // Only the entity retires; the roster still knows Carol.
    assert!(h.host.retire_entity(carol.id()));
    let _ = release.send(());

    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = drained.clone();
    scheduler.run_for_entity(
        marker,
        Box::new(move || drained_flag.store(true, Ordering::SeqCst)),
    );
    eventually("region 2 drained", || drained.load(Ordering::SeqCst)).await;

    eventually("other deliveries", || alice.inbox().len() == 1 && bob.inbox().len() == 1).await;
    assert_eq!(bob.inbox().messages(), vec![text]);
    eventually("console line", || h.console_lines().len() == 1).await;
    assert_eq!(h.console_lines(), vec!["Alice: still here?"]);

    assert!(carol.inbox().is_empty());
    assert!(h.deliveries.lock().iter().all(|(id, _)| *id != carol.id()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offline_sender_drops_the_event() {
    for threading in [Threading::Single, regionized()] {
        let h = harness(threading, ChatSettings::default());
        let alice = h.join("Alice", 0);
        let bob = h.join("Bob", 1);

        let mut event = ChatEvent::new(alice.id(), "gone", h.roster.online());
        h.leave(&alice);
        let ticket = h.pipeline.handle_chat(&mut event).expect("event accepted");

        assert_eq!(ticket.outcome().await, ChatOutcome::SenderUnavailable);
        sleep(Duration::from_millis(100)).await;
        assert!(bob.inbox().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_pipeline_and_vanilla_override() {
    let disabled = harness(
        Threading::Single,
        ChatSettings {
            enabled: false,
            ..Default::default()
        },
    );
    let alice = disabled.join("Alice", 0);
    let mut event = ChatEvent::new(alice.id(), "hi", disabled.roster.online());
    assert!(disabled.pipeline.handle_chat(&mut event).is_none());
    assert!(!event.is_cancelled());

    let passthrough = harness(
        Threading::Single,
        ChatSettings {
            override_vanilla_chat: false,
            ..Default::default()
        },
    );
    let bob = passthrough.join("Bob", 0);
    let mut event = ChatEvent::new(bob.id(), "hi", passthrough.roster.online());
    let ticket = passthrough.pipeline.handle_chat(&mut event).expect("event accepted");
    assert!(!event.is_cancelled());
    assert!(matches!(ticket.outcome().await, ChatOutcome::Dispatched { .. }));

    let mut already = ChatEvent::new(bob.id(), "hi", passthrough.roster.online());
    already.set_cancelled(true);
    assert!(passthrough.pipeline.handle_chat(&mut already).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_color_permissions_gate_only_the_body() {
    let settings = ChatSettings {
        format: "&e{player}: {message}".into(),
        ..Default::default()
    };
    let h = harness(Threading::Single, settings);
    let guest = h.join("Guest", 0);
    let artist = h.join("Artist", 0);
    artist.grant("tincture.color");
    let admin = h.join("Admin", 0);
    admin.grant("*");

    let message = "&aok <hex,00ff00>go</hex>";
    let text_of = |outcome: ChatOutcome| match outcome {
        ChatOutcome::Dispatched { text, .. } => text,
        other => panic!("unexpected outcome {:?}", other),
    };

    assert_eq!(text_of(h.chat(&guest, message).await), "§eGuest: ok go");
    assert_eq!(text_of(h.chat(&artist, message).await), "§eArtist: §aok go");
    let green = "§x§0§0§f§f§0§0";
    assert_eq!(
        text_of(h.chat(&admin, message).await),
        format!("§eAdmin: §aok {green}g{green}o")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provider_priority_and_public_lookups() {
    let groups = Arc::new(MetaStore::new("groups"));
    let settings = ChatSettings {
        provider_priority: vec!["groups".into(), "meta".into()],
        format: "{prefix}{displayname}{suffix}: {message} @{world}".into(),
        ..Default::default()
    };
    let h = harness_with(Threading::Single, settings, |builder| {
        builder.provider(groups.clone() as Arc<dyn IdentityProvider>)
    });
    let alice = h.join("Alice", 0);
    alice.set_world(Some("overworld".into()));
    alice.set_display_name(Some("Queen Alice".into()));
    groups.set_prefix(alice.id(), "  ");
    h.meta.set_prefix(alice.id(), "[VIP] ");
    groups.set_suffix(alice.id(), " [G]");
    h.meta.set_suffix(alice.id(), " [M]");

    assert_eq!(h.pipeline.prefix(alice.id()), "[VIP] ");
    assert_eq!(h.pipeline.suffix(alice.id()), " [G]");
    assert_eq!(
        h.pipeline.format_message(alice.id(), "%player_name% here").as_deref(),
        Some("[VIP] Queen Alice [G]: Alice here @overworld")
    );
    assert!(h
        .pipeline
        .format_message(EntityId::new(), "x")
        .is_none());
}

/// Answers nothing and counts how often it is asked.
#[derive(Default)]
struct CountingProvider {
    lookups: AtomicUsize,
}

impl IdentityProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_available(&self) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn prefix(&self, _player: EntityId) -> Result<Option<String>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some("[Never] ".into()))
    }

    fn suffix(&self, _player: EntityId) -> Result<Option<String>, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(" [Never]".into()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lower_priority_provider_not_consulted_once_answered() {
    let counting = Arc::new(CountingProvider::default());
    let settings = ChatSettings {
        provider_priority: vec!["meta".into(), "counting".into()],
        format: "{prefix}{player}{suffix}: {message}".into(),
        ..Default::default()
    };
    let h = harness_with(Threading::Single, settings, |builder| {
        builder.provider(counting.clone() as Arc<dyn IdentityProvider>)
    });
    let alice = h.join("Alice", 0);
    h.meta.set_prefix(alice.id(), "[Admin] ");
    h.meta.set_suffix(alice.id(), " *");

    assert_eq!(
        h.chat(&alice, "hi").await,
        ChatOutcome::Dispatched {
            recipients: 1,
            text: "[Admin] Alice *: hi".into()
        }
    );
    assert_eq!(counting.lookups.load(Ordering::SeqCst), 0);

    // Without a meta entry the chain falls through to the second provider.
    let bob = h.join("Bob", 0);
    assert_eq!(h.pipeline.prefix(bob.id()), "[Never] ");
    assert!(counting.lookups.load(Ordering::SeqCst) > 0);
}
