//! Frame pacing bookkeeping for the display loop.
//!
//! The scenes advance a fixed step per displayed frame, so the clock never
//! feeds a delta into the simulation. It counts frames, measures the frame
//! rate and carries the pause switch.

use std::time::{Duration, Instant};

/// Frame counter with periodic FPS measurement.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    /// Frames displayed since start.
    frames: u64,
    /// Frames the simulation advanced (excludes paused frames).
    steps: u64,
    fps: f32,
    fps_frames: u64,
    fps_since: Instant,
    fps_interval: Duration,
    paused: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            frames: 0,
            steps: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_since: now,
            fps_interval: Duration::from_secs(2),
            paused: false,
        }
    }

    /// How often the frame rate is recomputed.
    pub fn with_fps_interval(mut self, interval: Duration) -> Self {
        self.fps_interval = interval;
        self
    }

    /// Register a displayed frame.
    ///
    /// Returns `true` when the simulation should advance this frame, i.e.
    /// when not paused.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> bool {
        self.frames += 1;

        let window = now.duration_since(self.fps_since);
        if window >= self.fps_interval {
            self.fps = (self.frames - self.fps_frames) as f32 / window.as_secs_f32();
            self.fps_frames = self.frames;
            self.fps_since = now;
            log::debug!("{:.1} fps over {} frames", self.fps, self.frames);
        }

        if self.paused {
            return false;
        }
        self.steps += 1;
        true
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Last measured frame rate; 0 until the first interval has elapsed.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Flip the pause switch and return the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frames(), 0);
        assert_eq!(clock.fps(), 0.0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn test_pause_stops_steps_not_frames() {
        let mut clock = FrameClock::new();
        assert!(clock.tick());
        assert!(clock.toggle_pause());
        assert!(!clock.tick());
        assert!(!clock.tick());
        assert!(!clock.toggle_pause());
        assert!(clock.tick());

        assert_eq!(clock.frames(), 4);
        assert_eq!(clock.steps(), 2);
    }

    #[test]
    fn test_fps_measured_per_interval() {
        let mut clock = FrameClock::new().with_fps_interval(Duration::from_secs(1));
        let start = clock.fps_since;
        for i in 1..=59 {
            clock.tick_at(start + Duration::from_millis(i * 16));
        }
        assert_eq!(clock.fps(), 0.0, "interval not reached yet");

        clock.tick_at(start + Duration::from_secs(1));
        assert!((clock.fps() - 60.0).abs() < 1e-3);
    }
}
