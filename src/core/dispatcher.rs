use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::conversation::{Command, ConversationStateMachine, Outcome};

/// A message as received from the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: i64,
    pub text: String,
    pub payload: Option<String>,
}

/// Routes inbound messages to the state machine.
///
/// Messages of one user run one at a time under a keyed mutex; different
/// users run concurrently. Cancelling the shutdown token abandons handling
/// that has not committed yet.
pub struct Dispatcher {
    machine: Arc<ConversationStateMachine>,
    locks: DashMap<i64, Arc<Mutex<()>>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(machine: Arc<ConversationStateMachine>, shutdown: CancellationToken) -> Self {
        Self {
            machine,
            locks: DashMap::new(),
            shutdown,
        }
    }

    pub fn machine(&self) -> &Arc<ConversationStateMachine> {
        &self.machine
    }

    /// Number of users with a message in flight
    pub fn active_users(&self) -> usize {
        self.locks.len()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Handle `message` on its own task
    pub fn spawn(self: &Arc<Self>, message: InboundMessage) -> JoinHandle<Option<Outcome>> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.dispatch(message).await })
    }

    /// Handle one message; `None` if it was abandoned because of shutdown
    pub async fn dispatch(&self, message: InboundMessage) -> Option<Outcome> {
        let user_id = message.user_id;
        let span = tracing::info_span!("message", user_id, request_id = %Uuid::new_v4());

        async move {
            let command = Command::parse(&message.text, message.payload.as_deref());
            let lock = self.lock_for(user_id);

            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutting down, dropping message from user {}", user_id);
                    None
                }
                outcome = async {
                    let _guard = lock.lock().await;
                    self.machine.handle(user_id, &command).await
                } => Some(outcome),
            };

            drop(lock);
            self.release(user_id);
            outcome
        }
        .instrument(span)
        .await
    }

    fn lock_for(&self, user_id: i64) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(user_id).or_default().value())
    }

    /// Forget the user's lock once nobody else holds it
    fn release(&self, user_id: i64) {
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
