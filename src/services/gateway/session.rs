use crate::api::protocol::{Command, Event};
use crate::config::WsConfig;
use crate::domain::{Channel, Contact, Conversation, Direction, MsgOut, MsgUser};
use crate::error::Result;
use crate::services::chat::ChatService;
use crate::services::gateway::Metrics;
use crate::services::gateway::registry::{ClientHandle, ClientRegistry};
use crate::services::store::Store;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;
use uuid::Uuid;

/// One live WebSocket connection. Unbound until a `start_chat` command
/// attaches it to a conversation; destroyed with the socket.
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) channel: Channel,
    pub(crate) contact: Option<Contact>,
    pub(crate) chats: ChatService,
    pub(crate) store: Store,
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) config: WsConfig,
    pub(crate) events_tx: mpsc::Sender<Event>,
    pub(crate) metrics: Metrics,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self, socket, events_rx, shutdown_rx),
        fields(channel = %self.channel.uuid, ws.session_id = %self.id)
    )]
    pub(crate) async fn run(
        mut self,
        socket: WebSocket,
        events_rx: mpsc::Receiver<Event>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!("WebSocket connected");

        let (ws_sink, mut ws_stream) = socket.split();
        let (stop_tx, stop_rx) = watch::channel(false);

        let writer = tokio::spawn(
            write_loop(
                ws_sink,
                events_rx,
                stop_rx,
                shutdown_rx.clone(),
                Duration::from_secs(self.config.ping_interval_secs),
            )
            .instrument(tracing::info_span!("session_writer", ws.session_id = %self.id)),
        );

        let read_timeout = Duration::from_secs(self.config.read_timeout_secs);

        loop {
            // The writer observes the same shutdown signal and sends the
            // close frame; the read loop just has to stop consuming.
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = tokio::time::timeout(read_timeout, ws_stream.next()) => {
                    let continue_loop = match msg {
                        Err(_) => {
                            tracing::warn!("Read deadline exceeded, closing WebSocket");
                            false
                        }
                        Ok(frame) => self.on_frame(frame).await,
                    };

                    if !continue_loop { break; }
                }
            }
        }

        self.unbind().await;

        // the session is only fully closed once the write loop has drained
        let _ = stop_tx.send(true);
        let _ = writer.await;

        tracing::info!("WebSocket disconnected");
    }

    async fn on_frame(&mut self, frame: Option<std::result::Result<WsMessage, axum::Error>>) -> bool {
        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                match serde_json::from_str::<Command>(text.as_str()) {
                    Ok(cmd) => {
                        self.metrics.commands_total.add(1, &[KeyValue::new("command", cmd.type_name())]);
                        if let Err(e) = self.on_command(cmd).await {
                            tracing::error!(error = %e, "Error handling command");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Unable to decode command");
                    }
                }
                true
            }
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                tracing::debug!("Heartbeat frame received");
                true
            }
            Some(Ok(WsMessage::Binary(_))) => {
                tracing::warn!("Unexpected binary frame dropped");
                true
            }
            Some(Ok(WsMessage::Close(_)) | Err(_)) | None => false,
        }
    }

    async fn on_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::StartChat { chat_id } => self.on_start_chat(chat_id).await?,

            Command::SendMsg { text, attachments } => {
                let Some(contact) = &self.contact else {
                    tracing::debug!("Chat not started, command ignored");
                    return Ok(());
                };
                if text.is_empty() && attachments.is_empty() {
                    tracing::debug!("Msg is empty, command ignored");
                    return Ok(());
                }

                self.chats.create_msg(&self.channel, contact, &text, &attachments).await?;
            }

            Command::GetHistory { before } => {
                let Some(contact) = self.contact.clone() else {
                    tracing::debug!("Chat not started, command ignored");
                    return Ok(());
                };

                let msgs = self.chats.history(&contact, before).await?;
                let mut history = Vec::with_capacity(msgs.len());
                for msg in msgs {
                    history.push(match msg.direction {
                        Direction::In => Event::msg_in(msg.id, msg.text, msg.created_on),
                        Direction::Out => {
                            let user = self.author_of(msg.created_by_id).await;
                            Event::msg_out(MsgOut {
                                id: msg.id,
                                text: msg.text,
                                attachments: msg.attachments,
                                origin: msg.origin,
                                user,
                                time: msg.created_on,
                            })
                        }
                    });
                }

                self.send(Event::history(history)).await;
            }

            Command::SetEmail { email } => {
                let Some(contact) = self.contact.clone() else {
                    tracing::debug!("Chat not started, command ignored");
                    return Ok(());
                };

                self.chats.set_email(&contact, &email).await?;
                if let Some(c) = self.contact.as_mut() {
                    c.email = email;
                }
            }

            Command::AckChat { msg_id } => {
                let Some(contact) = &self.contact else {
                    tracing::debug!("Chat not started, command ignored");
                    return Ok(());
                };

                self.chats.confirm_delivery(&self.channel, contact, msg_id).await?;
            }
        }

        Ok(())
    }

    async fn on_start_chat(&mut self, chat_id: Option<crate::domain::ChatId>) -> Result<()> {
        if self.contact.is_some() {
            tracing::debug!("Chat already started, command ignored");
            return Ok(());
        }

        let (contact, is_new) = self.chats.start_chat(&self.channel, chat_id).await?;
        let conversation = Conversation::new(self.channel.uuid, contact.chat_id.clone());

        // register before flipping readiness, so a message dispatched the
        // moment the conversation turns ready always finds this session
        self.registry.register(
            conversation,
            ClientHandle { session_id: self.id, events: self.events_tx.clone() },
        );
        self.chats.chat_opened(&self.channel, &contact.chat_id).await;

        let event = if is_new {
            Event::chat_started(contact.chat_id.clone())
        } else {
            Event::chat_resumed(contact.chat_id.clone(), contact.email.clone())
        };
        self.contact = Some(contact);
        self.send(event).await;

        Ok(())
    }

    /// Resolves the authoring user of an outbound message through the
    /// lookup cache; lookup failures degrade to an anonymous message.
    async fn author_of(&self, user_id: Option<crate::domain::UserId>) -> Option<MsgUser> {
        let id = user_id?;
        match self.store.user(id).await {
            Ok(user) => Some(MsgUser { id: user.id, name: user.name(), avatar: user.avatar }),
            Err(e) => {
                tracing::error!(error = %e, user_id = %id, "Error fetching user");
                None
            }
        }
    }

    async fn send(&self, event: Event) {
        if self.events_tx.send(event).await.is_err() {
            tracing::warn!("Write loop gone, event dropped");
        }
    }

    async fn unbind(&mut self) {
        if let Some(contact) = self.contact.take() {
            let conversation = Conversation::new(self.channel.uuid, contact.chat_id.clone());
            self.registry.unregister(&conversation, self.id);
            self.chats.chat_closed(&self.channel, &contact.chat_id).await;
        }
    }
}

/// The only writer to the socket: outbound events from a bounded channel
/// plus the keepalive timer. Runs until told to stop, the channel closes,
/// or a write fails.
async fn write_loop(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut events_rx: mpsc::Receiver<Event>,
    mut stop_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
    ping_every: Duration,
) {
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);

    loop {
        if *shutdown_rx.borrow() {
            let _ = sink
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "Server shutting down".into(),
                })))
                .await;
            break;
        }

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {}

            _ = stop_rx.changed() => {
                if *stop_rx.borrow() { break; }
            }

            maybe = events_rx.recv() => {
                match maybe {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sink.send(WsMessage::Text(json.into())).await.is_err() { break; }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Unable to encode event");
                        }
                    },
                    None => break,
                }
            }

            _ = ping.tick() => {
                if sink.send(WsMessage::Ping(Vec::new().into())).await.is_err() { break; }
            }
        }
    }

    let _ = sink.close().await;
}
