//! One scheduled show
//!
//! ```text
//! RaisingBody -> PlayingContent -> StoppingBody -> RaisingTail -> StoppingTail -> Idle
//! ```
//!
//! Each motor stage takes the device lock only for its own command. Stages are
//! separated by a one second pause. Content comes from the queue first and
//! otherwise from a coin flip between a phrase and a song. A failing stage is
//! logged and the cycle carries on, so the fish always ends at rest.

use crate::device::Actuators;
use crate::error::MotorError;
use crate::show::performer::Performer;
use crate::show::picker::ContentPicker;
use fish_common::{ItemType, QueueItem};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Pause between physical stages
pub const STAGE_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    RaisingBody,
    PlayingContent,
    StoppingBody,
    RaisingTail,
    StoppingTail,
    Idle,
}

impl CycleStage {
    /// Following stage; `Idle` is terminal
    pub fn next(self) -> Self {
        match self {
            CycleStage::RaisingBody => CycleStage::PlayingContent,
            CycleStage::PlayingContent => CycleStage::StoppingBody,
            CycleStage::StoppingBody => CycleStage::RaisingTail,
            CycleStage::RaisingTail => CycleStage::StoppingTail,
            CycleStage::StoppingTail | CycleStage::Idle => CycleStage::Idle,
        }
    }
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::RaisingBody => "raising body",
            CycleStage::PlayingContent => "playing content",
            CycleStage::StoppingBody => "stopping body",
            CycleStage::RaisingTail => "raising tail",
            CycleStage::StoppingTail => "stopping tail",
            CycleStage::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Where a cycle's content came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Queue(QueueItem),
    Phrase(String),
    Song(String),
    /// Random choice found nothing to perform
    Nothing,
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Stages in the order they ran, ending with `Idle`
    pub stages: Vec<CycleStage>,
    pub content: ContentSource,
    /// Error message of a failed content playback
    pub content_error: Option<String>,
    pub motor_errors: usize,
}

/// Runs performance cycles on one fish
pub struct PerformanceCycle {
    performer: Arc<Performer>,
    picker: Mutex<ContentPicker>,
    stage_pause: Duration,
}

impl PerformanceCycle {
    pub fn new(performer: Arc<Performer>, picker: ContentPicker) -> Self {
        Self {
            performer,
            picker: Mutex::new(picker),
            stage_pause: STAGE_PAUSE,
        }
    }

    /// Run one full cycle
    #[instrument(skip(self))]
    pub async fn run(&self) -> CycleReport {
        let mut report = CycleReport {
            stages: Vec::new(),
            content: ContentSource::Nothing,
            content_error: None,
            motor_errors: 0,
        };

        let mut stage = CycleStage::RaisingBody;
        loop {
            report.stages.push(stage);
            info!(%stage, "Cycle stage");

            match stage {
                CycleStage::RaisingBody => {
                    self.motor_stage(stage, Actuators::raise_body, &mut report).await;
                }
                CycleStage::PlayingContent => {
                    let (content, result) = self.play_content().await;
                    report.content = content;
                    if let Err(e) = result {
                        error!("Content playback failed: {}", e);
                        report.content_error = Some(e.to_string());
                    }
                }
                CycleStage::StoppingBody | CycleStage::StoppingTail => {
                    self.motor_stage(stage, Actuators::stop_body, &mut report).await;
                }
                CycleStage::RaisingTail => {
                    self.motor_stage(stage, Actuators::raise_tail, &mut report).await;
                }
                CycleStage::Idle => break,
            }

            stage = stage.next();
            if stage != CycleStage::Idle {
                tokio::time::sleep(self.stage_pause).await;
            }
        }

        info!(content = ?report.content, "Cycle finished");
        report
    }

    async fn motor_stage(
        &self,
        stage: CycleStage,
        command: fn(&mut Actuators) -> Result<(), MotorError>,
        report: &mut CycleReport,
    ) {
        let mut actuators = self.performer.device().lock().await;
        if let Err(e) = command(&mut *actuators) {
            warn!(%stage, "Motor command failed: {}", e);
            report.motor_errors += 1;
        }
    }

    async fn play_content(&self) -> (ContentSource, crate::error::Result<()>) {
        let store = self.performer.store();

        match store.next_queue_item() {
            Ok(Some(item)) => {
                info!(name = %item.name, item_type = %item.item_type, "Playing queued item");
                let result = match item.item_type {
                    ItemType::Song => self.performer.play_sound_file(&item.name).await,
                    ItemType::Text => self.performer.say(&item.name).await,
                };
                return (ContentSource::Queue(item), result);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to check the queue: {}", e),
        }

        // The picker lock is released before playback starts
        let pick = {
            let mut picker = self.picker.lock().await;
            match picker.pick_kind() {
                ItemType::Text => picker.pick_phrase(store).map(ContentSource::Phrase),
                ItemType::Song => picker.pick_song(store).map(ContentSource::Song),
            }
        };

        match pick {
            Some(ContentSource::Phrase(text)) => {
                let result = self.performer.say(&text).await;
                (ContentSource::Phrase(text), result)
            }
            Some(ContentSource::Song(name)) => {
                let result = self.performer.play_sound_file(&name).await;
                (ContentSource::Song(name), result)
            }
            _ => (ContentSource::Nothing, Ok(())),
        }
    }
}
