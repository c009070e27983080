//! End-to-end performance tests on a simulated fish
//!
//! Mock motors and the simulated output keep real-time semantics, so these
//! run with paused tokio time.

use async_trait::async_trait;
use fish_common::{ItemType, PlaylistStore, QueueItem};
use fish_player::audio::{PcmFormat, SimulatedOutput};
use fish_player::device::{FishDevice, SimulatedProbes};
use fish_player::motor::{MotorCommand, MotorState};
use fish_player::show::{ContentPicker, ContentSource, CycleStage, PerformanceCycle, Performer};
use fish_player::speech::SpeechSynthesizer;
use fish_player::Error;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);

/// 44-byte header plus two silent mono frames at 44.1 kHz
const SILENT_WAV: [u8; 48] = [
    0x52, 0x49, 0x46, 0x46, 0x28, 0x00, 0x00, 0x00, 0x57, 0x41, 0x56, 0x45, 0x66, 0x6d, 0x74, 0x20,
    0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x44, 0xac, 0x00, 0x00, 0x88, 0x58, 0x01, 0x00,
    0x02, 0x00, 0x10, 0x00, 0x64, 0x61, 0x74, 0x61, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Ten silent MPEG-1 Layer III frames (128 kbit/s, 44.1 kHz, mono)
fn silent_mp3() -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..10 {
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0xC4]);
        data.resize(data.len() + 413, 0);
    }
    data
}

struct Fixture {
    _sounds: TempDir,
    _data: TempDir,
    performer: Performer,
    probes: SimulatedProbes,
    output: SimulatedOutput,
}

fn fixture() -> Fixture {
    let sounds = TempDir::new().unwrap();
    std::fs::write(sounds.path().join("test.wav"), SILENT_WAV).unwrap();
    let data = TempDir::new().unwrap();

    let (device, probes, output) = FishDevice::simulated_default();
    let store = Arc::new(PlaylistStore::init(data.path()));
    let performer = Performer::new(device, store, sounds.path()).with_retention(HOUR);

    Fixture {
        _sounds: sounds,
        _data: data,
        performer,
        probes,
        output,
    }
}

/// One second of a loud 22.05 kHz mono square wave
fn loud_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..22050 {
            let sample: i16 = if (i / 50) % 2 == 0 { 10_000 } else { -10_000 };
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[derive(Default)]
struct FakeSpeech {
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> fish_player::Result<Vec<u8>> {
        self.requests.lock().unwrap().push(text.to_string());
        Ok(loud_wav())
    }
}

#[tokio::test(start_paused = true)]
async fn test_play_silent_file_records_song_and_rests_mouth() {
    let f = fixture();

    f.performer.play_sound_file("test.wav").await.unwrap();

    let played = f.performer.store().played_items().unwrap();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].name, "test.wav");
    assert_eq!(played[0].item_type, ItemType::Song);

    assert_eq!(f.probes.head.state(), MotorState::Stopped);
    assert_eq!(f.probes.head.count(MotorCommand::Forward), 0);

    let records = f.output.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].format, PcmFormat::output());
    assert!(records[0].started && records[0].closed);
    assert_eq!(f.output.active_players(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_play_mp3_file() {
    let f = fixture();
    std::fs::write(f.performer.sound_dir().join("blub.mp3"), silent_mp3()).unwrap();

    f.performer.play_sound_file("blub.mp3").await.unwrap();

    let played = f.performer.store().played_items().unwrap();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].name, "blub.mp3");

    let records = f.output.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].format, PcmFormat::output());
    assert!(records[0].bytes > 0);
    assert!(records[0].started && records[0].closed);
    assert_eq!(f.probes.head.count(MotorCommand::Forward), 0);
    assert_eq!(f.probes.head.state(), MotorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_extension() {
    let f = fixture();
    std::fs::write(f.performer.sound_dir().join("song.ogg"), b"OggS").unwrap();

    let err = f.performer.play_sound_file("song.ogg").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)), "got {:?}", err);
    assert!(f.output.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_is_io_error_but_still_recorded() {
    let f = fixture();

    let err = f.performer.play_sound_file("gone.wav").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)), "got {:?}", err);
    assert!(err.to_string().contains("gone.wav"));

    let played = f.performer.store().played_items().unwrap();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].name, "gone.wav");
}

#[tokio::test(start_paused = true)]
async fn test_path_outside_sound_dir_rejected() {
    let f = fixture();

    let err = f.performer.play_sound_file("../test.wav").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    assert!(f.performer.store().played_items().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_say_animates_mouth() {
    let f = fixture();
    let speech = Arc::new(FakeSpeech::default());
    let performer = f.performer.with_speech(speech.clone());

    performer.say("Hallo").await.unwrap();

    assert_eq!(*speech.requests.lock().unwrap(), vec!["Hallo".to_string()]);

    let head = f.probes.head.commands();
    assert_eq!(head.first(), Some(&MotorCommand::Forward));
    assert_eq!(
        &head[head.len() - 2..],
        &[MotorCommand::Reverse, MotorCommand::Stop]
    );
    assert_eq!(f.probes.head.state(), MotorState::Stopped);
    assert_eq!(f.probes.body.state(), MotorState::Stopped);

    let records = f.output.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].format, PcmFormat::output());
    assert_eq!(records[0].bytes, 44100 * 4);
}

#[tokio::test(start_paused = true)]
async fn test_say_without_speech_only_logs() {
    let f = fixture();

    f.performer.say("Hallo").await.unwrap();
    f.performer.say("   ").await.unwrap();

    assert!(f.output.records().is_empty());
    assert!(f.probes.head.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_prefers_queue() {
    let f = fixture();
    let store = Arc::clone(f.performer.store());
    store.add_to_queue(QueueItem::song("test.wav")).unwrap();

    let picker = ContentPicker::new(Vec::new(), f.performer.sound_dir(), HOUR).with_seed(5);
    let cycle = PerformanceCycle::new(Arc::new(f.performer), picker);

    let report = cycle.run().await;

    assert_eq!(
        report.stages,
        vec![
            CycleStage::RaisingBody,
            CycleStage::PlayingContent,
            CycleStage::StoppingBody,
            CycleStage::RaisingTail,
            CycleStage::StoppingTail,
            CycleStage::Idle,
        ]
    );
    assert_eq!(report.content, ContentSource::Queue(QueueItem::song("test.wav")));
    assert_eq!(report.content_error, None);
    assert_eq!(report.motor_errors, 0);

    // The extra stop is the animation cleanup after the song
    assert_eq!(
        f.probes.body.commands(),
        vec![
            MotorCommand::Forward,
            MotorCommand::Stop,
            MotorCommand::Stop,
            MotorCommand::Reverse,
            MotorCommand::Stop,
        ]
    );
    assert!(store.queue_items().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_finishes_after_content_failure() {
    let f = fixture();
    let store = Arc::clone(f.performer.store());
    store.add_to_queue(QueueItem::song("missing.wav")).unwrap();

    let picker = ContentPicker::new(Vec::new(), f.performer.sound_dir(), HOUR);
    let cycle = PerformanceCycle::new(Arc::new(f.performer), picker);

    let report = cycle.run().await;

    assert_eq!(report.stages.len(), 6);
    assert_eq!(report.stages.last(), Some(&CycleStage::Idle));
    assert!(report.content_error.is_some());
    assert_eq!(f.probes.body.count(MotorCommand::Stop), 2);
    assert_eq!(f.probes.body.state(), MotorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_motor_failure_is_counted() {
    let f = fixture();
    f.probes.body.fail_next(1);

    let empty = TempDir::new().unwrap();
    let picker = ContentPicker::new(Vec::new(), empty.path(), HOUR).with_seed(9);
    let cycle = PerformanceCycle::new(Arc::new(f.performer), picker);

    let report = cycle.run().await;

    assert_eq!(report.content, ContentSource::Nothing);
    assert_eq!(report.motor_errors, 1);
    assert_eq!(report.stages.last(), Some(&CycleStage::Idle));
    assert_eq!(f.probes.body.state(), MotorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_speaks_picked_phrase() {
    let f = fixture();
    let speech = Arc::new(FakeSpeech::default());
    let performer = f.performer.with_speech(speech.clone());
    let store = Arc::clone(performer.store());

    let empty = TempDir::new().unwrap();
    let phrases = vec![fish_common::config::PhraseConfig::new("Einfach mal machen!", 50)];
    let cycle = PerformanceCycle::new(
        Arc::new(performer),
        ContentPicker::new(phrases, empty.path(), HOUR).with_seed(1),
    );

    // Songs are unavailable, so a Song draw performs nothing; run until the coin picks speech
    let mut spoken = false;
    for _ in 0..16 {
        if cycle.run().await.content == ContentSource::Phrase("Einfach mal machen!".into()) {
            spoken = true;
            break;
        }
    }

    assert!(spoken);
    assert!(!speech.requests.lock().unwrap().is_empty());
    let played = store.played_items().unwrap();
    assert!(played.iter().any(|p| p.item_type == ItemType::Text));
}
