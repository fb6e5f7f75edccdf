use std::time::{Duration, Instant};

use serde::Serialize;

/// Coarse phase of a repetition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Arm extended past the upper threshold.
    Up,
    /// Arm flexed past the lower threshold; set together with a count.
    Down,
}

/// One camera frame reduced to the measurements the counter consumes.
#[derive(Debug, Clone, Copy)]
pub struct FrameObservation {
    /// Elbow angle in degrees, normalized to [0, 180].
    pub angle: f32,
    /// Right-hip landmark confidence cleared the visibility threshold.
    pub hip_visible: bool,
    /// Right-knee landmark confidence cleared the visibility threshold.
    pub knee_visible: bool,
    /// Monotonic capture time; only used for debouncing.
    pub timestamp: Instant,
}

/// Counting thresholds.
///
/// The gap between `up_angle` and `down_angle` is the hysteresis band: a
/// frame has to swing all the way across it before a repetition can
/// complete, so jitter around either threshold cannot oscillate the stage.
#[derive(Debug, Clone, Copy)]
pub struct CounterConfig {
    /// Angle above which the arm counts as fully extended (degrees).
    pub up_angle: f32,
    /// Angle below which the arm counts as flexed (degrees).
    pub down_angle: f32,
    /// Minimum time between two accepted repetitions.
    pub debounce: Duration,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            up_angle: 160.0,
            down_angle: 90.0,
            debounce: Duration::from_millis(500),
        }
    }
}

/// Externally visible counter state after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub count: u64,
    pub stage: Option<Stage>,
}

impl Snapshot {
    /// Stage as the wire token: "up", "down", or the literal "none" while
    /// no stage has been established.
    pub fn stage_label(&self) -> &'static str {
        match self.stage {
            None => "none",
            Some(Stage::Up) => "up",
            Some(Stage::Down) => "down",
        }
    }
}

/// Push-up repetition counter.
///
/// Consumes one [`FrameObservation`] at a time and keeps a monotonically
/// non-decreasing repetition count between resets. Frames whose hip or knee
/// landmark was not visible are discarded before any angle logic runs: they
/// never touch the stage, the count, or the debounce clock.
///
/// The debounce window is measured from the last *accepted* repetition. A
/// candidate rejected by the window leaves no trace at all — the stage stays
/// `Up`, so a later frame can still complete the repetition once the window
/// has elapsed, without re-crossing the upper threshold.
#[derive(Debug)]
pub struct RepCounter {
    config: CounterConfig,
    count: u64,
    stage: Option<Stage>,
    last_rep_time: Option<Instant>,
}

impl RepCounter {
    pub fn new(config: CounterConfig) -> Self {
        Self {
            config,
            count: 0,
            stage: None,
            last_rep_time: None,
        }
    }

    /// Feed one frame and return the post-update state.
    pub fn process(&mut self, observation: FrameObservation) -> Snapshot {
        if !observation.hip_visible || !observation.knee_visible {
            return self.snapshot();
        }

        if observation.angle > self.config.up_angle && self.stage != Some(Stage::Up) {
            self.stage = Some(Stage::Up);
        }

        if observation.angle < self.config.down_angle && self.stage == Some(Stage::Up) {
            // First candidate is always eligible; afterwards the elapsed
            // time since the last accepted repetition must clear the window.
            let eligible = match self.last_rep_time {
                Some(last) => observation.timestamp.duration_since(last) > self.config.debounce,
                None => true,
            };
            if eligible {
                self.stage = Some(Stage::Down);
                self.count += 1;
                self.last_rep_time = Some(observation.timestamp);
            }
        }

        self.snapshot()
    }

    /// Restore the initial state unconditionally.
    pub fn reset(&mut self) -> Snapshot {
        self.count = 0;
        self.stage = None;
        self.last_rep_time = None;
        self.snapshot()
    }

    /// Current state, no side effects.
    pub fn status(&self) -> Snapshot {
        self.snapshot()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            count: self.count,
            stage: self.stage,
        }
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(CounterConfig::default())
    }
}
