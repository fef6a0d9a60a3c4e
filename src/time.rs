use std::time::Duration;

/// Simulation clock advanced by the game loop, not by wall time, so that runs are
/// reproducible.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    elapsed: f64,
    delta: f64,
    frame: u64,
    timer_origin: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, delta: Duration) {
        self.delta = delta.as_secs_f64();
        self.elapsed += self.delta;
        self.frame += 1;
    }

    pub fn delta_seconds(&self) -> f64 {
        self.delta
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds since the last timer reset, as read by the `timer` block.
    pub fn timer(&self) -> f64 {
        self.elapsed - self.timer_origin
    }

    pub fn reset_timer(&mut self) {
        self.timer_origin = self.elapsed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
