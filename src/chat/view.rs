use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use n0_future::{task::AbortOnDropHandle, StreamExt as _};
use tokio::sync::{broadcast, watch, Mutex as TokioMutex};

use super::{ChatEvent, Message, MessageLog, TxnStatus};
use crate::{
    contract::{ContractHandle, HandleMode},
    error::{describe, ChatError, Result},
    ledger::{MessageStream, Receipt},
};

const EVENT_CAPACITY: usize = 256;

/// State shared with the background listener and history tasks.
#[derive(Default)]
struct ViewState {
    /// Bumped on every handle change; a history fetch from an older
    /// generation is stale.
    generation: u64,
    /// Bumped whenever the listener is replaced.
    subscription: u64,
    contract: Option<Address>,
    log: MessageLog,
    draft: String,
}

/// The handle currently attached, and the tasks working on its behalf.
struct Attachment {
    handle: ContractHandle,
    listener: Option<AbortOnDropHandle<()>>,
    _history: Option<AbortOnDropHandle<()>>,
}

/// Owns the visible message sequence and the submission state machine.
///
/// Attach a [`ContractHandle`] and the view loads the history once, listens
/// for `NewMessage` events, and can submit the draft as a transaction. All
/// background work is tied to the attached handle and stops when it is
/// replaced or when the view is dropped.
pub struct ChatView {
    state: Arc<Mutex<ViewState>>,
    attachment: TokioMutex<Option<Attachment>>,
    status: watch::Sender<TxnStatus>,
    events: broadcast::Sender<ChatEvent>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Default::default(),
            attachment: TokioMutex::new(None),
            status: watch::Sender::new(TxnStatus::Idle),
            events,
        }
    }

    /// Messages observed so far, `None` while nothing is known yet.
    pub fn messages(&self) -> Option<Vec<Message>> {
        let state = self.state.lock().expect("poisoned");
        state.log.messages().map(<[Message]>::to_vec)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().expect("poisoned").log.is_loaded()
    }

    pub fn status(&self) -> TxnStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<TxnStatus> {
        self.status.subscribe()
    }

    /// Receive every [`ChatEvent`] published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn draft(&self) -> String {
        self.state.lock().expect("poisoned").draft.clone()
    }

    /// Replace the draft. Refused while a submission is running, the draft
    /// is cleared once it finishes.
    pub fn set_draft(&self, text: impl Into<String>) -> Result<()> {
        if !self.status.borrow().is_idle() {
            return Err(ChatError::SubmissionInProgress);
        }
        self.state.lock().expect("poisoned").draft = text.into();
        Ok(())
    }

    pub async fn handle(&self) -> Option<ContractHandle> {
        self.attachment
            .lock()
            .await
            .as_ref()
            .map(|attachment| attachment.handle.clone())
    }

    /// Follow a new handle.
    ///
    /// Re-attaching the current handle does nothing. Otherwise any
    /// outstanding history fetch is dropped. When the new handle sees the same
    /// events the running listener is kept, so notifications it has not
    /// yielded yet still land; otherwise it is replaced, and the log is reset
    /// if the contract changed. A new listener is registered before this
    /// returns, history is fetched in the background if it has not loaded yet.
    pub async fn attach(&self, handle: Option<ContractHandle>) {
        let mut attachment = self.attachment.lock().await;
        let current = attachment.as_ref().map(|a| a.handle.id());
        if current == handle.as_ref().map(ContractHandle::id) {
            return;
        }
        let previous = attachment.take();

        let Some(handle) = handle else {
            let mut state = self.state.lock().expect("poisoned");
            state.generation += 1;
            state.subscription += 1;
            drop(previous);
            tracing::info!("contract handle gone, chat view detached");
            return;
        };

        let kept = previous
            .filter(|previous| previous.handle.listens_like(&handle))
            .and_then(|previous| previous.listener);

        let (generation, subscription, loaded) = {
            let mut state = self.state.lock().expect("poisoned");
            state.generation += 1;
            if kept.is_none() {
                state.subscription += 1;
            }
            if state.contract != Some(handle.address()) {
                if state.contract.is_some() {
                    tracing::info!("contract changed to {}, resetting messages", handle.address());
                }
                state.contract = Some(handle.address());
                state.log = MessageLog::default();
            }
            (state.generation, state.subscription, state.log.is_loaded())
        };

        let listener = match kept {
            Some(listener) => Some(listener),
            None => match handle.subscribe().await {
                Ok(stream) => Some(self.spawn_listener(stream, subscription)),
                Err(e) => {
                    tracing::warn!("failed to subscribe to NewMessage: {e:#}");
                    self.emit(ChatEvent::Errored {
                        message: describe(&e),
                    });
                    None
                }
            },
        };
        let history = (!loaded).then(|| self.spawn_history(handle.clone(), generation));

        tracing::info!("chat view attached to {}", handle.id());
        *attachment = Some(Attachment {
            handle,
            listener,
            _history: history,
        });
    }

    /// Spawns a background task appending every `NewMessage` to the log.
    fn spawn_listener(&self, mut stream: MessageStream, subscription: u64) -> AbortOnDropHandle<()> {
        let state = self.state.clone();
        let events = self.events.clone();
        AbortOnDropHandle::new(n0_future::task::spawn(async move {
            while let Some(event) = stream.next().await {
                let block_number = event.block_number;
                let message = Message::from(event);
                {
                    let mut state = state.lock().expect("poisoned");
                    if state.subscription != subscription {
                        return;
                    }
                    state.log.push(message.clone(), block_number);
                }
                tracing::debug!("new message from {}", message.address);
                let _ = events.send(ChatEvent::MessageReceived { message });
            }
            tracing::info!("NewMessage subscription ended");
            let _ = events.send(ChatEvent::Disconnected);
        }))
    }

    /// Spawns the one-off history fetch. Its result is dropped if the view has
    /// moved on to another handle in the meantime.
    fn spawn_history(&self, handle: ContractHandle, generation: u64) -> AbortOnDropHandle<()> {
        let state = self.state.clone();
        let events = self.events.clone();
        AbortOnDropHandle::new(n0_future::task::spawn(async move {
            let history = match handle.get_messages().await {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!("{e}");
                    let _ = events.send(ChatEvent::Errored {
                        message: e.to_string(),
                    });
                    return;
                }
            };
            let read_at = history.block_number;
            let history = history.messages.into_iter().map(Message::from).collect();
            let loaded = {
                let mut state = state.lock().expect("poisoned");
                if state.generation != generation {
                    tracing::debug!("discarding history fetched by stale {}", handle.id());
                    return;
                }
                state.log.load(history, read_at).map(<[Message]>::to_vec)
            };
            if let Some(messages) = loaded {
                tracing::info!("loaded {} messages", messages.len());
                let _ = events.send(ChatEvent::MessagesLoaded { messages });
            }
        }))
    }

    /// Submit the draft as a `sendMessage` transaction.
    ///
    /// Without a read-write handle, or while another submission runs, this
    /// fails straight away: nothing is written, the status does not move and
    /// the draft is kept. Otherwise the status goes through
    /// `PendingConfirmation` and `PendingInclusion` back to `Idle`, and the
    /// draft is cleared, whatever the outcome. The message itself shows up
    /// through the subscription, not here.
    pub async fn submit(&self) -> Result<Receipt> {
        let handle = self.handle().await.ok_or(ChatError::NoHandle)?;
        if handle.mode() != HandleMode::ReadWrite {
            return Err(ChatError::ReadOnly);
        }
        let claimed = self.status.send_if_modified(|status| {
            if status.is_idle() {
                *status = TxnStatus::PendingConfirmation;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ChatError::SubmissionInProgress);
        }
        let _submission = Submission { view: self };
        self.emit(ChatEvent::StatusChanged {
            status: TxnStatus::PendingConfirmation,
        });

        let content = self.draft();
        let result = self.send(&handle, &content).await;
        match &result {
            Ok(receipt) => tracing::info!(
                "message included in block {} ({})",
                receipt.block_number,
                receipt.tx_hash
            ),
            Err(e) => {
                tracing::warn!("Transaction failed with error: {e}");
                self.emit(ChatEvent::Errored {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Put `content` in the draft and submit it.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<Receipt> {
        self.set_draft(content)?;
        self.submit().await
    }

    async fn send(&self, handle: &ContractHandle, content: &str) -> Result<Receipt> {
        let pending = handle.send_message(content).await?;
        let hash = pending.tx_hash();
        tracing::debug!("transaction {hash} broadcast");
        self.set_status(TxnStatus::PendingInclusion);
        pending
            .wait()
            .await
            .map_err(|e| ChatError::InclusionFailed {
                hash,
                reason: describe(&e),
            })
    }

    fn set_status(&self, status: TxnStatus) {
        if self.status.send_replace(status) != status {
            self.emit(ChatEvent::StatusChanged { status });
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No receivers is fine, nobody is rendering.
        let _ = self.events.send(event);
    }
}

/// Resets the submission state when a submit finishes, including when its
/// future is dropped halfway.
struct Submission<'a> {
    view: &'a ChatView,
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.view.state.lock().expect("poisoned").draft.clear();
        self.view.set_status(TxnStatus::Idle);
    }
}
