//! External collaborators the tools talk to
//!
//! Each concern is a trait so that the network-backed implementations can be
//! swapped for mocks in tests or for offline stand-ins.

pub mod elevenlabs;
pub mod sheet_music;
pub mod speech;
pub mod tracks;
pub mod video;
pub mod voices;

use crate::attachments::AttachmentUploader;
use elevenlabs::ElevenLabsClient;
use sheet_music::{SheetMusicService, UnconfiguredSheetMusic};
use speech::{NullPlayer, PremiumSpeech, SilentSpeech, SpeechPlayer, SpeechSynthesizer};
use tracks::{InMemoryTrackStore, TrackStore};
use video::{VideoService, YouTubeClient};
use voices::VoiceCloner;

/// The set of services available to tools during one session
pub struct Services {
    pub speech: Box<dyn SpeechSynthesizer>,
    pub premium_speech: Box<dyn PremiumSpeech>,
    pub voice_cloner: Box<dyn VoiceCloner>,
    pub tracks: Box<dyn TrackStore>,
    pub video: Box<dyn VideoService>,
    pub sheet_music: Box<dyn SheetMusicService>,
    pub player: Box<dyn SpeechPlayer>,
    pub uploader: Option<Box<dyn AttachmentUploader>>,
}

impl Default for Services {
    /// Offline baseline speech, live premium services that only run once a key is set
    fn default() -> Self {
        Self {
            speech: Box::new(SilentSpeech),
            premium_speech: Box::new(ElevenLabsClient::default()),
            voice_cloner: Box::new(ElevenLabsClient::default()),
            tracks: Box::new(InMemoryTrackStore::default()),
            video: Box::new(YouTubeClient::default()),
            sheet_music: Box::new(UnconfiguredSheetMusic),
            player: Box::new(NullPlayer),
            uploader: None,
        }
    }
}

impl Services {
    pub fn with_speech(mut self, speech: impl SpeechSynthesizer + 'static) -> Self {
        self.speech = Box::new(speech);
        self
    }

    pub fn with_premium_speech(mut self, premium: impl PremiumSpeech + 'static) -> Self {
        self.premium_speech = Box::new(premium);
        self
    }

    pub fn with_voice_cloner(mut self, cloner: impl VoiceCloner + 'static) -> Self {
        self.voice_cloner = Box::new(cloner);
        self
    }

    pub fn with_tracks(mut self, tracks: impl TrackStore + 'static) -> Self {
        self.tracks = Box::new(tracks);
        self
    }

    pub fn with_video(mut self, video: impl VideoService + 'static) -> Self {
        self.video = Box::new(video);
        self
    }

    pub fn with_sheet_music(mut self, sheet_music: impl SheetMusicService + 'static) -> Self {
        self.sheet_music = Box::new(sheet_music);
        self
    }

    pub fn with_player(mut self, player: impl SpeechPlayer + 'static) -> Self {
        self.player = Box::new(player);
        self
    }

    pub fn with_uploader(mut self, uploader: impl AttachmentUploader + 'static) -> Self {
        self.uploader = Some(Box::new(uploader));
        self
    }
}
