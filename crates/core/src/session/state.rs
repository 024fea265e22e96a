use std::fmt::{self, Debug};

use little_chat_actor::{Actor, Message};
use little_chat_model::{ModelMessage, ModelProviderError, ModelRequest};
use tokio::sync::oneshot;

use super::{RunningStream, SessionSnapshot, SessionState};
use crate::conversation::Message as ChatMessage;
use crate::model_client::{FragmentFuture, ModelClientResponse};
use crate::store::StreamTicket;

impl SessionState {
    pub(super) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            chats: self.store.chats().to_vec(),
            active_id: self.store.active_id().map(ToOwned::to_owned),
            streaming: self.store.is_streaming(),
        }
    }

    fn send_message(&mut self, text: String, handle: &Actor<Self>) {
        self.store.set_input(text);
        let Some(submission) = self.store.submit() else {
            if !self.store.is_streaming() {
                // Nothing has started, so the session is still idle.
                self.notify_idle();
            }
            return;
        };

        let request = self.build_model_request(&submission.history);
        let ticket = submission.ticket;
        debug!(
            "streaming reply {} into chat {}",
            ticket.seq(),
            ticket.chat_id()
        );

        let model_client = self.model_client.clone();
        let handle = handle.clone();
        let task = tokio::spawn({
            let ticket = ticket.clone();
            async move {
                let on_fragment = {
                    let handle = handle.clone();
                    let ticket = ticket.clone();
                    move |fragment| -> FragmentFuture {
                        let (ack_tx, ack_rx) = oneshot::channel();
                        let sent = handle.send(FragmentReceived {
                            ticket: ticket.clone(),
                            fragment,
                            ack_tx,
                        });
                        Box::pin(async move {
                            // Don't pull the next fragment before this one
                            // has been applied.
                            if sent.is_ok() {
                                ack_rx.await.ok();
                            }
                        })
                    }
                };
                let result = model_client.send_request(request, on_fragment).await;
                handle.send(StreamFinished { ticket, result }).ok();
            }
        });
        self.running_stream = Some(RunningStream { ticket, task });
    }

    fn build_model_request(&self, history: &[ChatMessage]) -> ModelRequest {
        let system = self.system_prompt.iter().cloned().map(ModelMessage::System);
        ModelRequest {
            messages: system
                .chain(history.iter().map(ChatMessage::to_model_message))
                .collect(),
        }
    }

    fn apply_fragment(&mut self, ticket: &StreamTicket, fragment: &str) {
        let Some(message) = self.store.apply_fragment(ticket, fragment) else {
            return;
        };
        if let Some(on_fragment) = &self.on_fragment {
            on_fragment(ticket.chat_id(), message);
        }
    }

    fn finish_stream(
        &mut self,
        ticket: StreamTicket,
        result: Result<ModelClientResponse, Box<dyn ModelProviderError>>,
    ) {
        match &result {
            Ok(resp) => debug!(
                "reply {} finished after {} fragments, {} bytes ({:?})",
                ticket.seq(),
                resp.fragment_count,
                resp.transcript.len(),
                resp.finish_reason
            ),
            Err(err) => error!(
                "reply {} for chat {} failed: {err}",
                ticket.seq(),
                ticket.chat_id()
            ),
        }

        let current = match result {
            Ok(_) => self.store.complete_stream(&ticket),
            Err(_) => self.store.fail_stream(&ticket),
        };
        if !current {
            trace!("reply {} was already abandoned", ticket.seq());
            return;
        }
        self.running_stream = None;
        self.notify_idle();
    }

    /// Stops the stream task if the store no longer tracks its ticket.
    fn reap_abandoned_stream(&mut self) {
        let current = self.store.stream_ticket();
        let Some(stream) = self
            .running_stream
            .take_if(|stream| current != Some(&stream.ticket))
        else {
            return;
        };
        debug!("stopping abandoned reply {}", stream.ticket.seq());
        stream.task.abort();
        self.notify_idle();
    }

    fn notify_idle(&self) {
        if let Some(on_idle) = &self.on_idle {
            on_idle();
        }
    }
}

#[derive(Debug)]
pub struct CreateChat;

impl Message<SessionState> for CreateChat {
    #[inline]
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.store.create_chat();
    }
}

#[derive(Debug)]
pub struct RenameChat {
    pub id: String,
    pub name: String,
}

impl Message<SessionState> for RenameChat {
    #[inline]
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.store.rename_chat(&self.id, &self.name);
    }
}

#[derive(Debug)]
pub struct DeleteChat(pub String);

impl Message<SessionState> for DeleteChat {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        if state.store.delete_chat(&self.0) {
            state.reap_abandoned_stream();
        }
    }
}

#[derive(Debug)]
pub struct ClearAll;

impl Message<SessionState> for ClearAll {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.store.clear_all();
        state.reap_abandoned_stream();
    }
}

#[derive(Debug)]
pub struct SelectChat(pub String);

impl Message<SessionState> for SelectChat {
    #[inline]
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        if !state.store.set_active(&self.0) {
            debug!("no chat with id {}", self.0);
        }
    }
}

#[derive(Debug)]
pub struct SendMessage(pub String);

impl Message<SessionState> for SendMessage {
    #[inline]
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.send_message(self.0, handle);
    }
}

#[derive(Debug)]
struct FragmentReceived {
    ticket: StreamTicket,
    fragment: String,
    ack_tx: oneshot::Sender<()>,
}

impl Message<SessionState> for FragmentReceived {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.apply_fragment(&self.ticket, &self.fragment);
        self.ack_tx.send(()).ok();
    }
}

struct StreamFinished {
    ticket: StreamTicket,
    result: Result<ModelClientResponse, Box<dyn ModelProviderError>>,
}

impl Debug for StreamFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamFinished")
            .field("ticket", &self.ticket)
            .field("ok", &self.result.is_ok())
            .finish_non_exhaustive()
    }
}

impl Message<SessionState> for StreamFinished {
    #[inline]
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.finish_stream(self.ticket, self.result);
    }
}
