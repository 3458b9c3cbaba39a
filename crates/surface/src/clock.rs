use std::time::{Duration, Instant};

/// Per-frame timing snapshot handed to the uniform bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds elapsed while the surface was playing.
    pub seconds: f32,
    /// Seconds since the previous playing tick.
    pub delta: f32,
    /// Frames drawn since the active program was installed.
    pub frame: u32,
}

/// Monotonic frame clock owned by the surface manager.
///
/// Elapsed time accumulates only while playback is enabled, so a paused
/// backdrop holds a stable image. Reset whenever a new program installs
/// so a shader swap does not inherit stale timing.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    elapsed: Duration,
    last_tick: Option<Instant>,
    frame: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.last_tick = None;
        self.frame = 0;
    }

    /// Advances the clock and returns the sample for this frame.
    ///
    /// While paused the sample is frozen: no elapsed accumulation, zero
    /// delta, and the frame counter holds. `now` still replaces the
    /// last-tick anchor so resuming does not produce a catch-up jump.
    pub fn tick(&mut self, now: Instant, playing: bool) -> TimeSample {
        let delta = if playing {
            self.last_tick
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };
        self.last_tick = Some(now);

        if playing {
            self.elapsed += delta;
            let sample = TimeSample {
                seconds: self.elapsed.as_secs_f32(),
                delta: delta.as_secs_f32(),
                frame: self.frame,
            };
            self.frame = self.frame.saturating_add(1);
            sample
        } else {
            TimeSample {
                seconds: self.elapsed.as_secs_f32(),
                delta: 0.0,
                frame: self.frame,
            }
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            elapsed: Duration::ZERO,
            last_tick: None,
            frame: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_zero_delta() {
        let mut clock = FrameClock::new();
        let sample = clock.tick(Instant::now(), true);
        assert_eq!(sample.seconds, 0.0);
        assert_eq!(sample.delta, 0.0);
        assert_eq!(sample.frame, 0);
    }

    #[test]
    fn elapsed_accumulates_between_ticks() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start, true);
        let sample = clock.tick(start + Duration::from_millis(16), true);
        assert!((sample.delta - 0.016).abs() < 1e-4);
        assert!((sample.seconds - 0.016).abs() < 1e-4);
        assert_eq!(sample.frame, 1);
    }

    #[test]
    fn pause_freezes_elapsed_and_frame() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start, true);
        clock.tick(start + Duration::from_millis(16), true);

        let paused = clock.tick(start + Duration::from_secs(5), false);
        assert!((paused.seconds - 0.016).abs() < 1e-4);
        assert_eq!(paused.delta, 0.0);
        assert_eq!(paused.frame, 2);
    }

    #[test]
    fn resume_does_not_jump() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start, true);
        clock.tick(start + Duration::from_secs(10), false);
        let resumed = clock.tick(start + Duration::from_secs(10) + Duration::from_millis(16), true);
        assert!((resumed.delta - 0.016).abs() < 1e-4);
        assert!(resumed.seconds < 1.0);
    }

    #[test]
    fn reset_zeroes_time_and_frame() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start, true);
        clock.tick(start + Duration::from_secs(1), true);
        clock.reset();
        let sample = clock.tick(start + Duration::from_secs(2), true);
        assert_eq!(sample.seconds, 0.0);
        assert_eq!(sample.frame, 0);
    }
}
