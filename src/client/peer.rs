use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{AnswerMessage, ClientEvent, IceCandidateMessage, OfferMessage};

/// Public STUN servers used when the application configures none
pub const DEFAULT_ICE_SERVERS: [&str; 3] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to use {0} was denied")]
    PermissionDenied(String),
    #[error("{0} is not available")]
    DeviceUnavailable(String),
    #[error("peer connection error: {0}")]
    Backend(String),
    #[error("peer connection is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Inputs driving [`PeerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// An offer or answer is being negotiated
    Negotiate,
    IceConnected,
    IceDisconnected,
    IceFailed,
    Close,
}

impl PeerState {
    /// Next state after `event`. Disconnected, failed and closed peers are
    /// done; reconnecting means building a new connection.
    pub fn on(self, event: PeerEvent) -> PeerState {
        use PeerEvent::*;
        use PeerState::*;
        match (self, event) {
            (Closed, _) => Closed,
            (_, Close) => Closed,
            (Disconnected | Failed, _) => self,
            (_, IceFailed) => Failed,
            (New, Negotiate) => Connecting,
            (New | Connecting, IceConnected) => Connected,
            (Connected, IceDisconnected) => Disconnected,
            (Connecting, IceDisconnected) => Failed,
            _ => self,
        }
    }

    /// Whether local resources must be released in this state
    pub fn is_finished(self) -> bool {
        matches!(self, PeerState::Disconnected | PeerState::Failed | PeerState::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    live: bool,
    enabled: bool,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, source: TrackSource) -> Self {
        Self { id: id.into(), kind, source, live: true, enabled: true }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// A disabled track stays attached but sends silence or black frames
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn stop(&mut self) {
        if self.live {
            debug!("Stopping {:?} track {}", self.source, self.id);
            self.live = false;
        }
    }
}

/// The platform's peer connection
pub trait PeerBackend: Send + Sync {
    fn add_track(&self, track: &MediaTrack) -> Result<(), MediaError>;

    fn create_offer(&self) -> BoxFuture<'_, Result<Value, MediaError>>;

    fn create_answer(&self) -> BoxFuture<'_, Result<Value, MediaError>>;

    fn set_local_description<'a>(&'a self, description: &'a Value) -> BoxFuture<'a, Result<(), MediaError>>;

    fn set_remote_description<'a>(&'a self, description: &'a Value) -> BoxFuture<'a, Result<(), MediaError>>;

    fn add_ice_candidate<'a>(&'a self, candidate: &'a Value) -> BoxFuture<'a, Result<(), MediaError>>;

    /// Swap the track on the existing video sender without renegotiating
    fn replace_video_track<'a>(&'a self, track: &'a MediaTrack) -> BoxFuture<'a, Result<(), MediaError>>;

    fn close(&self);
}

/// Capture devices of the local participant
pub trait MediaSource: Send + Sync {
    fn user_media(&self) -> BoxFuture<'_, Result<Vec<MediaTrack>, MediaError>>;

    fn display_media(&self) -> BoxFuture<'_, Result<MediaTrack, MediaError>>;
}

/// Outbound half of the signaling relay
pub trait SignalSink: Send + Sync {
    fn send(&self, event: ClientEvent);
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub room_id: String,
    pub user_id: String,
    pub ice_servers: Vec<String>,
}

impl PeerConfig {
    pub fn new(room_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
            ice_servers: DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One WebRTC connection to the remote participant of a room.
///
/// Negotiation output goes out through the [`SignalSink`] only. Remote ICE
/// candidates that arrive before the remote description are queued and
/// applied once it is set.
pub struct PeerConnection<B: PeerBackend> {
    config: PeerConfig,
    backend: B,
    signals: Arc<dyn SignalSink>,
    state: PeerState,
    local_tracks: Vec<MediaTrack>,
    screen_track: Option<MediaTrack>,
    remote_tracks: Vec<MediaTrack>,
    has_remote_description: bool,
    pending_candidates: Vec<Value>,
    released: bool,
}

impl<B: PeerBackend> PeerConnection<B> {
    /// Acquire the camera and microphone, then create the connection with
    /// them. A refused capture creates nothing.
    pub async fn open(
        config: PeerConfig,
        backend: B,
        signals: Arc<dyn SignalSink>,
        media: &dyn MediaSource,
    ) -> Result<Self, MediaError> {
        let local_tracks = media.user_media().await?;
        Self::new(config, backend, signals, local_tracks)
    }

    /// Create the connection and attach every local track. If a track cannot
    /// be attached, the backend is closed and every local track is stopped.
    pub fn new(
        config: PeerConfig,
        backend: B,
        signals: Arc<dyn SignalSink>,
        mut local_tracks: Vec<MediaTrack>,
    ) -> Result<Self, MediaError> {
        let attached = local_tracks.iter().try_for_each(|track| {
            backend.add_track(track).inspect_err(|e| {
                warn!("Failed to attach {:?} track {}: {}", track.source, track.id, e);
            })
        });
        if let Err(e) = attached {
            for track in &mut local_tracks {
                track.stop();
            }
            backend.close();
            return Err(e);
        }
        info!(
            "Peer connection for room {} created with {} local tracks",
            config.room_id,
            local_tracks.len()
        );
        Ok(Self {
            config,
            backend,
            signals,
            state: PeerState::New,
            local_tracks,
            screen_track: None,
            remote_tracks: Vec::new(),
            has_remote_description: false,
            pending_candidates: Vec::new(),
            released: false,
        })
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn local_tracks(&self) -> &[MediaTrack] {
        &self.local_tracks
    }

    pub fn remote_tracks(&self) -> &[MediaTrack] {
        &self.remote_tracks
    }

    pub fn screen_track(&self) -> Option<&MediaTrack> {
        self.screen_track.as_ref()
    }

    pub fn is_sharing_screen(&self) -> bool {
        self.screen_track.is_some()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_open(&self) -> Result<(), MediaError> {
        if self.state.is_finished() {
            return Err(MediaError::Closed);
        }
        Ok(())
    }

    /// Create an offer and send it to the room
    pub async fn start_offer(&mut self) -> Result<(), MediaError> {
        self.ensure_open()?;
        self.transition(PeerEvent::Negotiate);
        let offer = self.backend.create_offer().await?;
        self.backend.set_local_description(&offer).await?;
        self.signals.send(ClientEvent::Offer(OfferMessage {
            room_id: Some(self.config.room_id.clone()),
            user_id: Some(self.config.user_id.clone()),
            offer,
        }));
        Ok(())
    }

    /// Accept a remote offer and answer it
    pub async fn handle_offer(&mut self, offer: Value) -> Result<(), MediaError> {
        self.ensure_open()?;
        self.transition(PeerEvent::Negotiate);
        self.apply_remote_description(&offer).await?;
        let answer = self.backend.create_answer().await?;
        self.backend.set_local_description(&answer).await?;
        self.signals.send(ClientEvent::Answer(AnswerMessage {
            room_id: Some(self.config.room_id.clone()),
            user_id: Some(self.config.user_id.clone()),
            answer,
        }));
        Ok(())
    }

    pub async fn handle_answer(&mut self, answer: Value) -> Result<(), MediaError> {
        self.ensure_open()?;
        self.apply_remote_description(&answer).await
    }

    /// Apply a remote candidate, or queue it until the remote description is
    /// known. A candidate the backend refuses is logged and skipped.
    pub async fn handle_remote_candidate(&mut self, candidate: Value) -> Result<(), MediaError> {
        self.ensure_open()?;
        if !self.has_remote_description {
            debug!("Queueing ICE candidate until the remote description is set");
            self.pending_candidates.push(candidate);
            return Ok(());
        }
        if let Err(e) = self.backend.add_ice_candidate(&candidate).await {
            warn!("Failed to add ICE candidate: {}", e);
        }
        Ok(())
    }

    async fn apply_remote_description(&mut self, description: &Value) -> Result<(), MediaError> {
        self.backend.set_remote_description(description).await?;
        self.has_remote_description = true;

        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("Flushing {} queued ICE candidates", pending.len());
        }
        for candidate in pending {
            if let Err(e) = self.backend.add_ice_candidate(&candidate).await {
                warn!("Failed to add queued ICE candidate: {}", e);
            }
        }
        Ok(())
    }

    /// A local candidate was gathered
    pub fn on_local_candidate(&self, candidate: Value) {
        if self.state.is_finished() {
            return;
        }
        self.signals.send(ClientEvent::IceCandidate(IceCandidateMessage {
            room_id: Some(self.config.room_id.clone()),
            user_id: Some(self.config.user_id.clone()),
            candidate,
        }));
    }

    /// A remote track arrived; the renderer picks it up from
    /// [`PeerConnection::remote_tracks`].
    pub fn on_remote_track(&mut self, track: MediaTrack) {
        info!("Remote {:?} track {} received", track.kind, track.id);
        self.remote_tracks.push(track);
    }

    /// ICE connection state reported by the backend
    pub fn on_connection_state(&mut self, event: PeerEvent) -> PeerState {
        self.transition(event)
    }

    /// Mute or unmute the microphone. Tracks stay attached, nothing is
    /// renegotiated.
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.set_enabled(TrackKind::Audio, enabled);
    }

    /// Turn the camera off or back on without renegotiating
    pub fn set_video_enabled(&mut self, enabled: bool) {
        self.set_enabled(TrackKind::Video, enabled);
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.kind_enabled(TrackKind::Audio)
    }

    pub fn is_video_enabled(&self) -> bool {
        self.kind_enabled(TrackKind::Video)
    }

    fn set_enabled(&mut self, kind: TrackKind, enabled: bool) {
        for track in self.local_tracks.iter_mut().filter(|t| t.kind == kind) {
            track.set_enabled(enabled);
        }
        info!(
            "{:?} {} in room {}",
            kind,
            if enabled { "enabled" } else { "disabled" },
            self.config.room_id
        );
    }

    fn kind_enabled(&self, kind: TrackKind) -> bool {
        self.local_tracks.iter().filter(|t| t.kind == kind).all(MediaTrack::is_enabled)
    }

    /// Replace the outgoing camera track with a captured screen. A refused
    /// capture leaves the connection and its tracks untouched.
    pub async fn start_screen_share(&mut self, media: &dyn MediaSource) -> Result<(), MediaError> {
        self.ensure_open()?;
        if self.screen_track.is_some() {
            return Ok(());
        }
        let mut screen = media.display_media().await?;
        if let Err(e) = self.backend.replace_video_track(&screen).await {
            screen.stop();
            return Err(e);
        }
        info!("Screen sharing started in room {}", self.config.room_id);
        self.screen_track = Some(screen);
        Ok(())
    }

    /// Put the camera back on the video sender and stop the screen capture
    pub async fn stop_screen_share(&mut self) -> Result<(), MediaError> {
        let Some(mut screen) = self.screen_track.take() else {
            return Ok(());
        };
        screen.stop();
        if self.state.is_finished() {
            return Ok(());
        }
        let camera = self
            .local_tracks
            .iter()
            .find(|t| t.kind == TrackKind::Video && t.is_live())
            .cloned();
        if let Some(camera) = camera {
            self.backend.replace_video_track(&camera).await?;
        }
        info!("Screen sharing stopped in room {}", self.config.room_id);
        Ok(())
    }

    /// The shared screen track ended outside the application
    pub async fn on_screen_track_ended(&mut self) -> Result<(), MediaError> {
        self.stop_screen_share().await
    }

    /// Stop every local track and release the connection. Safe to call again.
    pub fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.transition(PeerEvent::Close);
    }

    fn transition(&mut self, event: PeerEvent) -> PeerState {
        let next = self.state.on(event);
        if next != self.state {
            debug!("Peer in room {}: {:?} -> {:?}", self.config.room_id, self.state, next);
            self.state = next;
        }
        if next.is_finished() {
            self.release();
        }
        next
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for track in &mut self.local_tracks {
            track.stop();
        }
        if let Some(screen) = &mut self.screen_track {
            screen.stop();
        }
        self.pending_candidates.clear();
        self.backend.close();
        info!("Peer connection for room {} released ({:?})", self.config.room_id, self.state);
    }
}

impl<B: PeerBackend> Drop for PeerConnection<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        calls: Arc<Mutex<Vec<String>>>,
        refuse_replace: bool,
        refuse_track: Option<&'static str>,
    }

    impl FakeBackend {
        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PeerBackend for FakeBackend {
        fn add_track(&self, track: &MediaTrack) -> Result<(), MediaError> {
            if self.refuse_track == Some(track.id.as_str()) {
                return Err(MediaError::DeviceUnavailable(track.id.clone()));
            }
            self.log(format!("add_track {}", track.id));
            Ok(())
        }

        fn create_offer(&self) -> BoxFuture<'_, Result<Value, MediaError>> {
            Box::pin(async { Ok(json!({"type": "offer", "sdp": "o"})) })
        }

        fn create_answer(&self) -> BoxFuture<'_, Result<Value, MediaError>> {
            Box::pin(async { Ok(json!({"type": "answer", "sdp": "a"})) })
        }

        fn set_local_description<'a>(&'a self, d: &'a Value) -> BoxFuture<'a, Result<(), MediaError>> {
            Box::pin(async move {
                self.log(format!("local {}", d["type"].as_str().unwrap_or_default()));
                Ok(())
            })
        }

        fn set_remote_description<'a>(&'a self, d: &'a Value) -> BoxFuture<'a, Result<(), MediaError>> {
            Box::pin(async move {
                self.log(format!("remote {}", d["type"].as_str().unwrap_or_default()));
                Ok(())
            })
        }

        fn add_ice_candidate<'a>(&'a self, c: &'a Value) -> BoxFuture<'a, Result<(), MediaError>> {
            Box::pin(async move {
                self.log(format!("candidate {}", c["candidate"].as_str().unwrap_or_default()));
                Ok(())
            })
        }

        fn replace_video_track<'a>(&'a self, track: &'a MediaTrack) -> BoxFuture<'a, Result<(), MediaError>> {
            Box::pin(async move {
                if self.refuse_replace {
                    return Err(MediaError::Backend("no video sender".into()));
                }
                self.log(format!("replace {}", track.id));
                Ok(())
            })
        }

        fn close(&self) {
            self.log("close");
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ClientEvent>>);

    impl SignalSink for RecordingSink {
        fn send(&self, event: ClientEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        deny_screen: bool,
        deny_camera: bool,
    }

    impl MediaSource for FakeMedia {
        fn user_media(&self) -> BoxFuture<'_, Result<Vec<MediaTrack>, MediaError>> {
            let deny = self.deny_camera;
            Box::pin(async move {
                if deny {
                    return Err(MediaError::PermissionDenied("camera".into()));
                }
                Ok(camera_and_mic())
            })
        }

        fn display_media(&self) -> BoxFuture<'_, Result<MediaTrack, MediaError>> {
            let deny = self.deny_screen;
            Box::pin(async move {
                if deny {
                    return Err(MediaError::PermissionDenied("screen".into()));
                }
                Ok(MediaTrack::new("screen", TrackKind::Video, TrackSource::Screen))
            })
        }
    }

    fn camera_and_mic() -> Vec<MediaTrack> {
        vec![
            MediaTrack::new("mic", TrackKind::Audio, TrackSource::Microphone),
            MediaTrack::new("cam", TrackKind::Video, TrackSource::Camera),
        ]
    }

    fn peer(backend: FakeBackend) -> (PeerConnection<FakeBackend>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let conn = PeerConnection::new(PeerConfig::new("S1", "ua"), backend, sink.clone(), camera_and_mic()).unwrap();
        (conn, sink)
    }

    #[test]
    fn transitions_follow_connection_lifecycle() {
        use PeerEvent::*;
        let state = PeerState::New.on(Negotiate).on(IceConnected);
        assert_eq!(state, PeerState::Connected);
        assert_eq!(state.on(IceDisconnected), PeerState::Disconnected);
        assert_eq!(PeerState::Connecting.on(IceFailed), PeerState::Failed);
        assert_eq!(PeerState::Failed.on(IceConnected), PeerState::Failed);
        assert_eq!(PeerState::Closed.on(Negotiate), PeerState::Closed);
        assert_eq!(PeerState::Disconnected.on(Close), PeerState::Closed);
    }

    #[test]
    fn default_config_uses_public_stun() {
        let config = PeerConfig::new("S1", "ua");
        assert_eq!(config.ice_servers.len(), 3);
        assert!(config.ice_servers.iter().all(|s| s.starts_with("stun:")));
    }

    #[tokio::test]
    async fn open_attaches_captured_devices() {
        let sink = Arc::new(RecordingSink::default());
        let conn = PeerConnection::open(PeerConfig::new("S1", "ua"), FakeBackend::default(), sink, &FakeMedia::default())
            .await
            .unwrap();
        assert_eq!(conn.backend().calls(), vec!["add_track mic", "add_track cam"]);
        assert_eq!(conn.state(), PeerState::New);

        let sink = Arc::new(RecordingSink::default());
        let denied = FakeMedia { deny_camera: true, ..Default::default() };
        let result = PeerConnection::open(PeerConfig::new("S1", "ua"), FakeBackend::default(), sink, &denied).await;
        assert_eq!(result.err(), Some(MediaError::PermissionDenied("camera".into())));
    }

    #[test]
    fn failed_track_attach_closes_the_backend() {
        let backend = FakeBackend { refuse_track: Some("cam"), ..Default::default() };
        let calls = backend.calls.clone();
        let sink = Arc::new(RecordingSink::default());
        let result = PeerConnection::new(PeerConfig::new("S1", "ua"), backend, sink, camera_and_mic());

        assert_eq!(result.err(), Some(MediaError::DeviceUnavailable("cam".into())));
        assert_eq!(*calls.lock().unwrap(), vec!["add_track mic", "close"]);
    }

    #[tokio::test]
    async fn mute_and_camera_off_keep_the_connection() {
        let (mut conn, _sink) = peer(FakeBackend::default());
        conn.on_connection_state(PeerEvent::IceConnected);
        let before = conn.backend().calls();

        conn.set_audio_enabled(false);
        assert!(!conn.is_audio_enabled());
        assert!(conn.is_video_enabled());

        conn.set_video_enabled(false);
        assert!(!conn.is_video_enabled());

        assert_eq!(conn.state(), PeerState::Connected);
        assert_eq!(conn.backend().calls(), before);
        assert!(conn.local_tracks().iter().all(|t| t.is_live() && !t.is_enabled()));

        conn.set_audio_enabled(true);
        conn.set_video_enabled(true);
        assert!(conn.is_audio_enabled() && conn.is_video_enabled());
        assert_eq!(conn.backend().calls(), before);
    }

    #[tokio::test]
    async fn offer_is_sent_through_the_relay() {
        let (mut conn, sink) = peer(FakeBackend::default());
        conn.start_offer().await.unwrap();

        assert_eq!(conn.state(), PeerState::Connecting);
        let sent = sink.0.lock().unwrap();
        match sent.as_slice() {
            [ClientEvent::Offer(o)] => {
                assert_eq!(o.room_id.as_deref(), Some("S1"));
                assert_eq!(o.offer["type"], "offer");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            conn.backend().calls(),
            vec!["add_track mic", "add_track cam", "local offer"]
        );
    }

    #[tokio::test]
    async fn early_candidates_wait_for_remote_description() {
        let (mut conn, sink) = peer(FakeBackend::default());
        conn.handle_remote_candidate(json!({"candidate": "c1"})).await.unwrap();
        conn.handle_remote_candidate(json!({"candidate": "c2"})).await.unwrap();
        assert_eq!(conn.pending_candidates(), 2);

        conn.handle_offer(json!({"type": "offer"})).await.unwrap();
        assert_eq!(conn.pending_candidates(), 0);
        assert_eq!(
            conn.backend().calls()[2..],
            ["remote offer", "candidate c1", "candidate c2", "local answer"]
        );
        assert!(matches!(sink.0.lock().unwrap().as_slice(), [ClientEvent::Answer(_)]));

        conn.handle_remote_candidate(json!({"candidate": "c3"})).await.unwrap();
        assert_eq!(conn.backend().calls().last().map(String::as_str), Some("candidate c3"));
    }

    #[tokio::test]
    async fn screen_share_swaps_track_and_restores_camera() {
        let (mut conn, _sink) = peer(FakeBackend::default());
        conn.on_connection_state(PeerEvent::IceConnected);

        conn.start_screen_share(&FakeMedia::default()).await.unwrap();
        assert!(conn.is_sharing_screen());
        assert_eq!(conn.state(), PeerState::Connected);

        conn.on_screen_track_ended().await.unwrap();
        assert!(!conn.is_sharing_screen());
        let calls = conn.backend().calls();
        assert_eq!(calls[calls.len() - 2..], ["replace screen", "replace cam"]);
        assert_eq!(conn.state(), PeerState::Connected);
    }

    #[tokio::test]
    async fn denied_screen_share_leaves_connection_intact() {
        let (mut conn, _sink) = peer(FakeBackend::default());
        let err = conn.start_screen_share(&FakeMedia { deny_screen: true, ..Default::default() }).await.unwrap_err();
        assert_eq!(err, MediaError::PermissionDenied("screen".into()));
        assert!(!conn.is_sharing_screen());
        assert!(conn.local_tracks().iter().all(MediaTrack::is_live));

        let (mut conn, _sink) = peer(FakeBackend { refuse_replace: true, ..Default::default() });
        assert!(conn.start_screen_share(&FakeMedia::default()).await.is_err());
        assert!(conn.screen_track().is_none());
    }

    #[tokio::test]
    async fn failure_releases_local_resources() {
        let (mut conn, _sink) = peer(FakeBackend::default());
        conn.start_screen_share(&FakeMedia::default()).await.unwrap();
        conn.handle_remote_candidate(json!({"candidate": "late"})).await.unwrap();

        assert_eq!(conn.on_connection_state(PeerEvent::IceFailed), PeerState::Failed);
        assert!(conn.local_tracks().iter().all(|t| !t.is_live()));
        assert!(!conn.screen_track().unwrap().is_live());
        assert_eq!(conn.pending_candidates(), 0);
        assert_eq!(conn.start_offer().await, Err(MediaError::Closed));
    }

    #[test]
    fn close_is_idempotent() {
        let (mut conn, sink) = peer(FakeBackend::default());
        conn.close();
        conn.close();
        conn.on_connection_state(PeerEvent::IceDisconnected);

        assert_eq!(conn.state(), PeerState::Closed);
        let closes = conn.backend().calls().iter().filter(|c| *c == "close").count();
        assert_eq!(closes, 1);

        conn.on_local_candidate(json!({"candidate": "x"}));
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
