//! One tick loop per execution context.
//!
//! A loop owns a queue of pending jobs keyed by (due tick, arrival order),
//! so jobs due on the same tick run in the order they were scheduled. Each
//! tick runs everything due; commands arriving between ticks only enqueue.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};
use tracing::{debug, trace};

use super::task::TaskState;
use super::{enter_context, run_guarded, Job, Shared, ThreadContext};
use crate::ticks::TICK;

/// Messages from the host and its schedulers to one tick loop.
pub(crate) enum Command {
    Schedule {
        delay_ticks: u64,
        job: Job,
        state: Arc<TaskState>,
    },
    Stop,
}

struct Pending {
    job: Job,
    state: Arc<TaskState>,
}

struct TickLoop {
    context: ThreadContext,
    shared: Arc<Shared>,
    tick: u64,
    seq: u64,
    pending: BTreeMap<(u64, u64), Pending>,
}

/// Starts the named thread for `context`, marked with that context for
/// [`current_context`](super::current_context).
pub(crate) fn spawn(
    context: ThreadContext,
    commands: Receiver<Command>,
    shared: Arc<Shared>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("tincture-{}", context))
        .spawn(move || {
            let _context = enter_context(context);
            TickLoop {
                context,
                shared,
                tick: 0,
                seq: 0,
                pending: BTreeMap::new(),
            }
            .run(commands)
        })
}

impl TickLoop {
    fn run(mut self, commands: Receiver<Command>) {
        debug!("⏱️ Tick loop {} started", self.context);
        let ticker = channel::tick(TICK);

        loop {
            channel::select! {
                recv(commands) -> command => match command {
                    Ok(Command::Schedule { delay_ticks, job, state }) => {
                        self.enqueue(delay_ticks, Pending { job, state })
                    }
                    Ok(Command::Stop) | Err(_) => break,
                },
                recv(ticker) -> _ => {
                    self.tick += 1;
                    self.run_due();
                }
            }
        }

        for pending in self.pending.values() {
            pending.state.abandon();
        }
        debug!(
            "Tick loop {} stopped at tick {}, {} task(s) discarded",
            self.context,
            self.tick,
            self.pending.len()
        );
    }

    /// Anything below one tick runs on the next tick.
    fn enqueue(&mut self, delay_ticks: u64, pending: Pending) {
        let due = self.tick.saturating_add(delay_ticks.max(1));
        self.seq += 1;
        self.pending.insert((due, self.seq), pending);
    }

    fn run_due(&mut self) {
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > self.tick {
                break;
            }
            let pending = entry.remove();
            self.execute(pending);
        }
    }

    /// Runs one due job. Entity jobs check ownership first: a retired entity
    /// gets its retired callback, a migrated one is forwarded to its owner.
    fn execute(&mut self, Pending { job, state }: Pending) {
        if state.is_cancelled() {
            return;
        }

        match job {
            Job::Once(task) => {
                if state.begin() {
                    run_guarded(self.context, task);
                    state.finish();
                }
            }
            Job::Repeating { task, period } => {
                if !state.begin() {
                    return;
                }
                let run = task.clone();
                run_guarded(self.context, move || run());
                if state.finish() {
                    self.enqueue(period, Pending {
                        job: Job::Repeating { task, period },
                        state,
                    });
                }
            }
            Job::Entity {
                entity,
                task,
                retired,
            } => match self.shared.owner_of(entity) {
                None => {
                    state.abandon();
                    trace!("Entity {} gone before task ran on {}", entity, self.context);
                    if let Some(retired) = retired {
                        run_guarded(self.context, retired);
                    }
                }
                Some(owner) if owner != self.context => {
                    trace!("Entity {} moved to {}, forwarding task", entity, owner);
                    let job = Job::Entity {
                        entity,
                        task,
                        retired,
                    };
                    if let Err((_, e)) = self.shared.submit(owner, 0, job, state.clone()) {
                        state.abandon();
                        debug!("Could not forward task for entity {}: {}", entity, e);
                    }
                }
                Some(_) => {
                    if state.begin() {
                        run_guarded(self.context, task);
                        state.finish();
                    }
                }
            },
        }
    }
}
