use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::message::Message;
use super::processing::{ProcessingState, ProcessingTracker};
use super::state::{ConversationRoom, SessionState};
use super::transcript::Transcript;
use crate::api::{Diary, DiaryService};
use crate::app::{Screen, SessionHost};
use crate::audio::{AudioPlayback, NoPlayback};
use crate::config::ConversationConfig;
use crate::error::SessionError;
use crate::recording::VoiceRecorder;
use crate::socket::{describe_error, Channel, ChannelEvent, ChannelEvents, ClientEvent, Connector, ServerEvent};

/// One conversation in one room, from connect to diary.
///
/// Channel events and user actions are applied one at a time through
/// `&mut self`; callers either drive [`ConversationSession::run`] or
/// interleave [`ConversationSession::next_event`] with their own input.
pub struct ConversationSession {
    room: ConversationRoom,
    state: SessionState,
    connector: Connector,
    channel: Option<Channel>,
    events: Option<ChannelEvents>,
    transcript: Transcript,
    processing: ProcessingTracker,
    recorder: Option<VoiceRecorder>,
    playback: Arc<dyn AudioPlayback>,
    diary_service: Arc<dyn DiaryService>,
    host: Arc<dyn SessionHost>,
    diary: Option<Diary>,
}

impl ConversationSession {
    pub fn new(
        room: ConversationRoom,
        connector: Connector,
        diary_service: Arc<dyn DiaryService>,
        host: Arc<dyn SessionHost>,
        config: &ConversationConfig,
    ) -> Self {
        Self {
            room,
            state: SessionState::Disconnected,
            connector,
            channel: None,
            events: None,
            transcript: Transcript::new(config.dedup_window()),
            processing: ProcessingTracker::new(config.processing_watchdog()),
            recorder: None,
            playback: Arc::new(NoPlayback),
            diary_service,
            host,
            diary: None,
        }
    }

    pub fn with_recorder(mut self, recorder: VoiceRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_playback(mut self, playback: Arc<dyn AudioPlayback>) -> Self {
        self.playback = playback;
        self
    }

    pub fn room(&self) -> &ConversationRoom {
        &self.room
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn processing(&self) -> &ProcessingState {
        self.processing.state()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(Channel::is_connected)
    }

    /// True while a channel is open, connected or not
    pub fn has_channel(&self) -> bool {
        self.events.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(VoiceRecorder::is_recording)
    }

    /// Diary produced when the session ended normally
    pub fn diary(&self) -> Option<&Diary> {
        self.diary.as_ref()
    }

    /// Open a fresh channel for the room. Returns immediately; progress arrives as events.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(self.invalid("connect"));
        }

        // Never carry a handle over from an earlier attempt
        self.close_channel().await;

        info!("Starting conversation in room {}", self.room.room_id);
        let (channel, events) = self.connector.connect();
        self.channel = Some(channel);
        self.events = Some(events);
        self.state = SessionState::Connecting;
        self.host.connection_changed(false);

        Ok(())
    }

    /// Explicit retry after the connection budget ran out
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        self.start().await
    }

    /// Dispatch events until the session ends or the channel is gone
    pub async fn run(&mut self) -> SessionState {
        while self.state != SessionState::Ended {
            match self.next_event().await {
                Some(event) => self.handle_event(event).await,
                None => break,
            }
        }
        self.state
    }

    /// Wait for the next channel event. `None` once no channel is open.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            let deadline = self.processing.watchdog_deadline();
            let events = self.events.as_mut()?;

            let Some(deadline) = deadline else {
                return events.recv().await;
            };

            tokio::select! {
                event = events.recv() => return event,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            if self.processing.expire(Instant::now()) {
                self.host.processing_changed(self.processing.state());
            }
        }
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected { transport } => {
                info!("Channel up via {} for room {}", transport, self.room.room_id);
                self.host.connection_changed(true);

                if self.state == SessionState::Ended {
                    return;
                }

                // Rooms do not survive a reconnect on the server side
                let joined = match &self.channel {
                    Some(channel) => channel.join_room(self.room.room_id),
                    None => Err(SessionError::NotConnected),
                };
                match joined {
                    Ok(()) => {
                        if self.state == SessionState::Connecting {
                            self.state = SessionState::Joined;
                        }
                    }
                    Err(e) => self.host.alert(&e),
                }
            }
            ChannelEvent::Disconnected { reason } => {
                warn!("Room {} lost its channel: {}", self.room.room_id, reason);
                self.host.connection_changed(false);
            }
            ChannelEvent::ConnectFailed { attempts, reason } => {
                error!("Room {} could not connect: {}", self.room.room_id, reason);
                self.host.connection_changed(false);
                self.host.alert(&SessionError::Connection { attempts, reason });
                self.close_channel().await;

                if matches!(
                    self.state,
                    SessionState::Connecting | SessionState::Joined | SessionState::Active
                ) {
                    self.state = SessionState::Disconnected;
                }
            }
            ChannelEvent::Server(event) => self.handle_server_event(event).await,
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Message(message) => {
                if self.state == SessionState::Ended {
                    return;
                }
                self.mark_active();

                let applied = self.transcript.apply_incoming(message);
                debug!("Applied incoming message: {:?}", applied);
                self.host.transcript_updated(self.transcript.messages());

                if applied.should_play() {
                    self.play(applied.index()).await;
                }
            }
            ServerEvent::Processing(status) => {
                let state = self.processing.apply(status);
                self.host.processing_changed(state);
            }
            ServerEvent::SessionTimeout(_) => {
                info!("Server ended room {} after silence", self.room.room_id);
                if self.state.accepts_input() {
                    // Already alerted; the user retries from Finalizing
                    if let Err(e) = self.finalize().await {
                        debug!("Diary after session timeout failed: {}", e);
                    }
                } else {
                    debug!("Ignoring session timeout while {}", self.state);
                }
            }
            ServerEvent::Error(payload) => {
                let error = SessionError::Server(describe_error(&payload));
                error!("{}", error);
                self.host.alert(&error);
            }
            ServerEvent::JoinedRoom(_) => {
                info!("Joined room {}", self.room.room_id);
            }
        }
    }

    /// Send typed text. Blank input is ignored without touching the network.
    pub fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        self.ensure_ready("send a message")?;
        let event = ClientEvent::SendMessage {
            room_id: self.room.room_id,
            text: text.to_string(),
        };

        // Echo goes in before the emit is queued
        self.transcript.push_local(Message::user_text(text, Utc::now()));
        if let Err(e) = self.emit(&event) {
            self.transcript.pop_local();
            return Err(e);
        }

        self.mark_active();
        self.host.transcript_updated(self.transcript.messages());
        Ok(())
    }

    /// Send a recorded utterance. The transcript comes back from the server.
    pub fn send_voice_message(&mut self, audio_base64: String) -> Result<(), SessionError> {
        self.ensure_ready("send a voice message")?;
        debug!("Sending {} bytes of voice audio", audio_base64.len());

        self.emit(&ClientEvent::SendVoiceMessage {
            room_id: self.room.room_id,
            audio_data: audio_base64,
        })?;

        self.mark_active();
        Ok(())
    }

    /// Returns `Ok(false)` if a recording was already running
    pub async fn start_recording(&mut self) -> Result<bool, SessionError> {
        if !self.state.accepts_input() {
            return Err(self.invalid("record"));
        }

        let recorder = self
            .recorder
            .as_mut()
            .ok_or_else(|| SessionError::Recording("no audio capture available".to_string()))?;

        recorder.start_recording().await.map_err(|e| {
            let error = SessionError::Recording(format!("{:#}", e));
            self.host.alert(&error);
            error
        })
    }

    /// Stop recording and send the clip. Returns `Ok(false)` if nothing was recording.
    pub async fn stop_recording(&mut self) -> Result<bool, SessionError> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(false);
        };

        let clip = match recorder.stop_recording().await {
            Ok(Some(clip)) => clip,
            Ok(None) => return Ok(false),
            Err(e) => return Err(self.recording_failed(e)),
        };

        let audio = clip
            .into_base64()
            .await
            .map_err(|e| self.recording_failed(e))?;

        self.send_voice_message(audio).map(|()| true)
    }

    /// The user confirmed they want to end the conversation
    pub async fn end_conversation(&mut self) -> Result<Diary, SessionError> {
        match self.state {
            SessionState::Joined | SessionState::Active | SessionState::Finalizing => self.finalize().await,
            _ => Err(self.invalid("end the conversation")),
        }
    }

    /// Try diary creation again after a failure
    pub async fn retry_finalize(&mut self) -> Result<Diary, SessionError> {
        if self.state != SessionState::Finalizing {
            return Err(self.invalid("retry the diary"));
        }
        self.finalize().await
    }

    /// Leave without a diary; the channel is closed exactly once
    pub async fn leave(&mut self) {
        if self.transcript.is_empty() {
            info!("Leaving room {}", self.room.room_id);
        } else {
            info!(
                "Leaving room {} without a diary ({} messages)",
                self.room.room_id,
                self.transcript.len()
            );
        }
        self.discard_recording().await;
        self.close_channel().await;
        self.state = SessionState::Ended;
        self.host.connection_changed(false);
    }

    async fn finalize(&mut self) -> Result<Diary, SessionError> {
        self.state = SessionState::Finalizing;
        self.discard_recording().await;

        info!("Finalizing room {} with {} messages", self.room.room_id, self.transcript.len());
        match self.diary_service.create_diary(self.room.room_id).await {
            Ok(diary) => {
                info!("Diary {} ready for room {}", diary.id, self.room.room_id);
                self.diary = Some(diary.clone());
                self.state = SessionState::Ended;
                self.host.diary_ready(diary.clone());
                self.host.navigate(Screen::Diary);

                self.close_channel().await;
                self.host.connection_changed(false);
                Ok(diary)
            }
            Err(e) => {
                let error = SessionError::Finalization(format!("{:#}", e));
                error!("{}", error);
                self.host.alert(&error);
                Err(error)
            }
        }
    }

    async fn play(&mut self, index: usize) {
        let Some(message) = self.messages().get(index) else {
            return;
        };
        let Some(audio) = message.audio_data.clone() else {
            return;
        };
        let id = message.id.clone();

        if let Err(e) = self.playback.play(&id, &audio).await {
            let error = SessionError::Playback(format!("{:#}", e));
            warn!("{}", error);
            self.host.alert(&error);
        }
    }

    fn ensure_ready(&self, action: &'static str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Joined | SessionState::Active if self.is_connected() => Ok(()),
            SessionState::Joined
            | SessionState::Active
            | SessionState::Disconnected
            | SessionState::Connecting => Err(SessionError::NotConnected),
            _ => Err(self.invalid(action)),
        }
    }

    fn emit(&self, event: &ClientEvent) -> Result<(), SessionError> {
        match &self.channel {
            Some(channel) => channel.emit(event),
            None => Err(SessionError::NotConnected),
        }
    }

    fn mark_active(&mut self) {
        if self.state == SessionState::Joined {
            self.state = SessionState::Active;
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }

    fn recording_failed(&self, e: anyhow::Error) -> SessionError {
        let error = SessionError::Recording(format!("{:#}", e));
        self.host.alert(&error);
        error
    }

    /// Release the microphone, dropping whatever was captured
    async fn discard_recording(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };

        match recorder.stop_recording().await {
            Ok(Some(clip)) => {
                if let Err(e) = tokio::fs::remove_file(clip.path()).await {
                    warn!("Failed to delete discarded recording: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to stop recording: {:#}", e),
        }
    }

    async fn close_channel(&mut self) {
        self.events = None;
        if let Some(channel) = self.channel.take() {
            channel.disconnect().await;
        }
    }
}
