use crate::scene::SoundDefinition;
use std::collections::{HashMap, VecDeque};

/// Playback request handed to the host, which owns the actual audio device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub handle: u64,
    pub entity: String,
    pub sound: String,
    pub source: String,
    pub start: f64,
    pub end: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct ActivePlayback {
    ends_at: Option<f64>,
}

/// Bookkeeping for sound blocks: which sounds were triggered, which are still
/// playing, and when a play-until-done wait may resume.
pub struct AudioManager {
    enabled: bool,
    capacity: usize,
    triggers: VecDeque<String>,
    requests: Vec<PlaybackRequest>,
    active: HashMap<u64, ActivePlayback>,
    next_handle: u64,
}

impl AudioManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: true,
            capacity: capacity.max(1),
            triggers: VecDeque::new(),
            requests: Vec::new(),
            active: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
        self.requests.clear();
        self.active.clear();
    }

    pub fn recent_triggers(&self) -> impl ExactSizeIterator<Item = &String> {
        self.triggers.iter()
    }

    /// Starts a playback and returns its handle plus the simulation time at which it
    /// ends, when the trimmed duration is known.
    pub fn play(&mut self, entity: &str, sound: &SoundDefinition, now: f64) -> (u64, Option<f64>) {
        let handle = self.next_handle;
        self.next_handle += 1;
        let ends_at = sound.playback_duration().map(|duration| now + duration);
        self.push_trigger(format!("play:{}:{}", entity, sound.id));
        if self.enabled {
            self.requests.push(PlaybackRequest {
                handle,
                entity: entity.to_string(),
                sound: sound.id.clone(),
                source: sound.source.clone(),
                start: sound.trim_start.unwrap_or(0.0),
                end: sound.trim_end,
            });
        }
        self.active.insert(handle, ActivePlayback { ends_at });
        (handle, ends_at)
    }

    /// Marks a playback finished; used when the host reports the end of a sound
    /// whose duration was unknown.
    pub fn complete(&mut self, handle: u64) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn is_playing(&self, handle: u64) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drops playbacks whose known end time has passed.
    pub fn prune(&mut self, now: f64) {
        self.active.retain(|_, playback| playback.ends_at.map_or(true, |end| end > now));
    }

    pub fn stop_all(&mut self) -> Vec<u64> {
        self.push_trigger(String::from("stop_all"));
        let mut stopped: Vec<u64> = self.active.drain().map(|(handle, _)| handle).collect();
        stopped.sort_unstable();
        stopped
    }

    pub fn take_requests(&mut self) -> Vec<PlaybackRequest> {
        std::mem::take(&mut self.requests)
    }

    fn push_trigger(&mut self, trigger: String) {
        if self.triggers.len() == self.capacity {
            self.triggers.pop_front();
        }
        self.triggers.push_back(trigger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(duration: Option<f64>) -> SoundDefinition {
        SoundDefinition {
            id: "pop".into(),
            name: "Pop".into(),
            source: "sounds/pop.wav".into(),
            duration,
            trim_start: Some(0.25),
            trim_end: Some(1.0),
        }
    }

    #[test]
    fn trimmed_duration_sets_end_time() {
        let mut audio = AudioManager::new(4);
        let (handle, ends_at) = audio.play("cat", &sound(Some(2.0)), 10.0);
        assert_eq!(ends_at, Some(10.75));
        audio.prune(10.5);
        assert!(audio.is_playing(handle));
        audio.prune(10.75);
        assert!(!audio.is_playing(handle));
    }

    #[test]
    fn unknown_duration_waits_for_completion() {
        let mut audio = AudioManager::new(4);
        let (handle, ends_at) = audio.play("cat", &sound(None), 0.0);
        assert!(ends_at.is_none());
        audio.prune(1_000.0);
        assert!(audio.is_playing(handle));
        assert!(audio.complete(handle));
        assert_eq!(audio.take_requests().len(), 1);
    }

    #[test]
    fn muted_audio_still_tracks_playbacks() {
        let mut audio = AudioManager::new(4);
        audio.set_enabled(false);
        let (first, _) = audio.play("cat", &sound(None), 0.0);
        audio.play("dog", &sound(Some(1.0)), 0.0);
        assert!(audio.take_requests().is_empty());
        assert_eq!(audio.active_count(), 2);
        audio.prune(5.0);
        assert_eq!(audio.active_count(), 1);
        assert!(audio.is_playing(first));
        assert_eq!(audio.stop_all(), vec![first]);
        assert_eq!(audio.active_count(), 0);
    }

    #[test]
    fn trigger_history_is_bounded() {
        let mut audio = AudioManager::new(2);
        for _ in 0..3 {
            audio.play("cat", &sound(Some(1.0)), 0.0);
        }
        assert_eq!(audio.recent_triggers().len(), 2);
    }
}
