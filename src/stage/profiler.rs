use bevy_ecs::prelude::Resource;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseTiming {
    pub name: &'static str,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Default)]
struct PhaseAccumulator {
    last_ms: f32,
    total_ms: f32,
    max_ms: f32,
    samples: u64,
}

/// Wall-clock cost of each game-loop phase and physics system.
#[derive(Resource, Default)]
pub struct PhaseProfiler {
    phases: BTreeMap<&'static str, PhaseAccumulator>,
}

impl PhaseProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&mut self, name: &'static str) -> PhaseScope<'_> {
        PhaseScope { name, profiler: self, start: Instant::now() }
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let duration = elapsed.as_secs_f32() * 1000.0;
        let entry = self.phases.entry(name).or_default();
        entry.last_ms = duration;
        entry.max_ms = entry.max_ms.max(duration);
        entry.total_ms += duration;
        entry.samples += 1;
    }

    pub fn reset(&mut self) {
        self.phases.clear();
    }

    /// Timings ordered by phase name.
    pub fn timings(&self) -> Vec<PhaseTiming> {
        self.phases
            .iter()
            .map(|(&name, phase)| PhaseTiming {
                name,
                last_ms: phase.last_ms,
                average_ms: if phase.samples == 0 { 0.0 } else { phase.total_ms / phase.samples as f32 },
                max_ms: phase.max_ms,
                samples: phase.samples,
            })
            .collect()
    }
}

pub struct PhaseScope<'a> {
    name: &'static str,
    profiler: &'a mut PhaseProfiler,
    start: Instant,
}

impl<'a> Drop for PhaseScope<'a> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.profiler.record(self.name, elapsed);
    }
}
