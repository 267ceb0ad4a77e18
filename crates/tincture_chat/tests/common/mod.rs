//! Shared fixtures for pipeline integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use tincture_chat::{
    ChatEvent, ChatOutcome, ChatPipeline, ChatPipelineBuilder, ChatPlayer, ChatSettings,
    IdentityProvider, MessageSink, MetaStore, PlayerDirectory, Roster, RosterPlayer,
};
use tincture_scheduler::{create_scheduler, current_context, EntityId, LocalHost, ThreadContext, Threading};
use tokio::time::{sleep, timeout, Duration};

/// Where each delivery ran.
pub type DeliveryLog = Arc<Mutex<Vec<(EntityId, Option<ThreadContext>)>>>;

/// A player that records the context of every delivery.
struct StubPlayer {
    inner: Arc<RosterPlayer>,
    log: DeliveryLog,
}

impl ChatPlayer for StubPlayer {
    fn id(&self) -> EntityId {
        self.inner.id()
    }

    fn name(&self) -> String {
        self.inner.name()
    }

    fn display_name(&self) -> String {
        self.inner.display_name()
    }

    fn world(&self) -> Option<String> {
        self.inner.world()
    }

    fn has_permission(&self, node: &str) -> bool {
        self.inner.has_permission(node)
    }

    fn send_message(&self, text: &str) {
        self.log.lock().push((self.inner.id(), current_context()));
        self.inner.send_message(text);
    }
}

/// [`Roster`] wrapper whose players log their delivery contexts.
pub struct StubDirectory {
    pub roster: Arc<Roster>,
    pub log: DeliveryLog,
}

impl PlayerDirectory for StubDirectory {
    fn player(&self, id: EntityId) -> Option<Arc<dyn ChatPlayer>> {
        let inner = self.roster.get(id)?;
        Some(Arc::new(StubPlayer {
            inner,
            log: self.log.clone(),
        }))
    }

    fn console(&self) -> Arc<dyn MessageSink> {
        self.roster.console()
    }
}

pub struct Harness {
    pub host: LocalHost,
    pub roster: Arc<Roster>,
    pub meta: Arc<MetaStore>,
    pub deliveries: DeliveryLog,
    pub pipeline: ChatPipeline,
}

pub fn harness(threading: Threading, settings: ChatSettings) -> Harness {
    harness_with(threading, settings, |builder| builder)
}

pub fn harness_with<F>(threading: Threading, settings: ChatSettings, customize: F) -> Harness
where
    F: FnOnce(ChatPipelineBuilder) -> ChatPipelineBuilder,
{
    let host = LocalHost::builder()
        .threading(threading)
        .build()
        .expect("host should start");
    let scheduler = create_scheduler(Arc::new(host.clone()));
    let roster = Arc::new(Roster::new());
    let meta = Arc::new(MetaStore::new("meta"));
    let deliveries = DeliveryLog::default();
    let directory = Arc::new(StubDirectory {
        roster: roster.clone(),
        log: deliveries.clone(),
    });

    let builder = ChatPipeline::builder(settings, scheduler, directory)
        .provider(meta.clone() as Arc<dyn IdentityProvider>);
    let pipeline = customize(builder).build().expect("settings should be valid");

    Harness {
        host,
        roster,
        meta,
        deliveries,
        pipeline,
    }
}

impl Harness {
    /// Spawns the entity in `region` and puts the player online. A stale
    /// session with the same name is retired.
    pub fn join(&self, name: &str, region: usize) -> Arc<RosterPlayer> {
        let id = self.host.spawn_entity(region);
        let (player, replaced) = self.roster.join_replacing(RosterPlayer::new(id, name));
        if let Some(previous) = replaced {
            self.host.retire_entity(previous.id());
        }
        player
    }

    /// Takes the player offline and retires its entity.
    pub fn leave(&self, player: &RosterPlayer) {
        self.roster.leave(player.id());
        self.host.retire_entity(player.id());
    }

    /// Chats to everyone online and waits for the outcome.
    pub async fn chat(&self, sender: &RosterPlayer, message: &str) -> ChatOutcome {
        let mut event = ChatEvent::new(sender.id(), message, self.roster.online());
        let ticket = self
            .pipeline
            .handle_chat(&mut event)
            .expect("pipeline should accept the event");
        timeout(Duration::from_secs(2), ticket.outcome())
            .await
            .expect("timed out waiting for the chat outcome")
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.roster.console_sink().log().messages()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.host.shutdown();
    }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let polled = timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {}", what);
}
