//! Content selection for a performance
//!
//! Phrases are drawn by weight, songs uniformly from the sound directory.
//! Anything played within the retention window is skipped, unless that would
//! leave nothing to choose from, in which case the full list is used again.

use crate::audio::decoder::AudioKind;
use chrono::{DateTime, Local};
use fish_common::config::PhraseConfig;
use fish_common::{ItemType, PlayedItem, PlaylistStore};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Picks what the fish performs when nothing is queued
pub struct ContentPicker {
    rng: StdRng,
    phrases: Vec<PhraseConfig>,
    sound_dir: PathBuf,
    retention: Duration,
}

impl ContentPicker {
    pub fn new(phrases: Vec<PhraseConfig>, sound_dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            phrases,
            sound_dir: sound_dir.into(),
            retention,
        }
    }

    /// Deterministic draws, for tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Fair coin between speech and song
    pub fn pick_kind(&mut self) -> ItemType {
        if self.rng.gen_bool(0.5) {
            ItemType::Text
        } else {
            ItemType::Song
        }
    }

    /// Weighted phrase draw at the current local time
    pub fn pick_phrase(&mut self, store: &PlaylistStore) -> Option<String> {
        self.pick_phrase_at(store, &Local::now())
    }

    /// Weighted phrase draw; the chosen phrase is recorded as played
    pub fn pick_phrase_at(&mut self, store: &PlaylistStore, now: &DateTime<Local>) -> Option<String> {
        let base: Vec<u32> = self.phrases.iter().map(|p| p.weight_at(now)).collect();

        let recent = recent_names(store, ItemType::Text, self.retention);
        let mut weights: Vec<u32> = self
            .phrases
            .iter()
            .zip(&base)
            .map(|(phrase, &w)| if recent.contains(&phrase.text) { 0 } else { w })
            .collect();

        if weights.iter().all(|&w| w == 0) {
            info!("All phrases were said recently, using the full phrase list");
            weights = base;
        }

        let index = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => {
                info!("No phrase is eligible right now");
                return None;
            }
        };

        let text = self.phrases[index].text.clone();
        if let Err(e) = store.add_played_item(PlayedItem::now(&text, ItemType::Text), self.retention) {
            warn!("Failed to record spoken phrase: {}", e);
        }
        debug!(phrase = %text, "Picked phrase");
        Some(text)
    }

    /// Uniform draw over sound files not played recently
    pub fn pick_song(&mut self, store: &PlaylistStore) -> Option<String> {
        let songs = match list_songs(&self.sound_dir) {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Failed to read sound directory {}: {}", self.sound_dir.display(), e);
                return None;
            }
        };

        if songs.is_empty() {
            info!("No .wav or .mp3 files to sing");
            return None;
        }

        let recent = recent_names(store, ItemType::Song, self.retention);
        let mut available: Vec<&String> = songs.iter().filter(|s| !recent.contains(*s)).collect();
        if available.is_empty() {
            info!("All songs were played recently, using the full song list");
            available = songs.iter().collect();
        }

        let song = available[self.rng.gen_range(0..available.len())].clone();
        debug!(song = %song, "Picked song");
        Some(song)
    }
}

fn recent_names(store: &PlaylistStore, item_type: ItemType, within: Duration) -> HashSet<String> {
    store.recently_played(item_type, within).unwrap_or_else(|e| {
        warn!("Failed to read played items: {}", e);
        HashSet::new()
    })
}

/// Audio file names in `dir`, sorted
fn list_songs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut songs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if AudioKind::from_path(&path).is_none() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            songs.push(name.to_string());
        }
    }
    songs.sort();
    Ok(songs)
}
