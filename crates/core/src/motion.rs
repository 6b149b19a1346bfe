//! Reduces raw accelerometer samples into debounced shake events.

use crate::events::MotionSample;
use std::time::Duration;
use tokio::time::Instant;

/// Samples ignored after activation while the sensor settles.
pub const CALIBRATION_SAMPLES: u32 = 3;
/// Minimum spacing between two accepted shakes.
pub const SHAKE_DEBOUNCE: Duration = Duration::from_millis(2000);
/// How long activation waits for a first sample before giving up on the sensor.
pub const FIRST_SAMPLE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MotionAvailability {
    /// Not activated yet.
    #[default]
    Unknown,
    /// Activated, waiting for the first sample.
    AwaitingSample,
    Available,
    /// Permission denied or no samples arrived. Permanent for the session.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    pub intensity: f64,
    pub at: Instant,
}

/// Diagnostic view of the reducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDiagnostics {
    pub availability: MotionAvailability,
    /// Whether samples are currently being honored.
    pub listening: bool,
    pub intensity: f64,
    pub threshold: f64,
    pub sample_count: u32,
    pub last_shake_at: Option<Instant>,
}

impl MotionDiagnostics {
    pub fn detection_enabled(&self) -> bool {
        self.availability == MotionAvailability::Available
    }
}

#[derive(Debug)]
pub struct MotionReducer {
    threshold: f64,
    active: bool,
    availability: MotionAvailability,
    sample_count: u32,
    last: MotionSample,
    last_shake_at: Option<Instant>,
    intensity: f64,
}

impl MotionReducer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            active: false,
            availability: MotionAvailability::Unknown,
            sample_count: 0,
            last: MotionSample::default(),
            last_shake_at: None,
            intensity: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn availability(&self) -> MotionAvailability {
        self.availability
    }

    /// Starts honoring samples and restarts calibration.
    ///
    /// Returns `false` when detection is unavailable for this session.
    pub fn activate(&mut self) -> bool {
        if self.availability == MotionAvailability::Unavailable {
            return false;
        }
        self.sample_count = 0;
        self.active = true;
        if self.availability == MotionAvailability::Unknown {
            self.availability = MotionAvailability::AwaitingSample;
        }
        true
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Disables detection for the rest of the session.
    pub fn mark_unavailable(&mut self) {
        self.active = false;
        self.availability = MotionAvailability::Unavailable;
    }

    /// Called when the first-sample window closes. Returns `true` if that made
    /// detection unavailable.
    pub fn first_sample_overdue(&mut self) -> bool {
        if self.availability == MotionAvailability::AwaitingSample {
            self.mark_unavailable();
            return true;
        }
        false
    }

    /// Feeds one sample. Inactive reducers ignore samples entirely.
    pub fn observe(&mut self, sample: MotionSample, now: Instant) -> Option<ShakeEvent> {
        if !self.active {
            return None;
        }
        if self.availability == MotionAvailability::AwaitingSample {
            self.availability = MotionAvailability::Available;
        }

        self.sample_count = self.sample_count.saturating_add(1);
        if self.sample_count <= CALIBRATION_SAMPLES {
            self.last = sample;
            return None;
        }

        // Y is left out: gravity dominates it.
        let intensity = (sample.x - self.last.x).abs() + (sample.z - self.last.z).abs();
        self.intensity = intensity;
        self.last = sample;

        let settled = self
            .last_shake_at
            .is_none_or(|at| now.duration_since(at) > SHAKE_DEBOUNCE);
        if intensity > self.threshold && settled {
            self.last_shake_at = Some(now);
            return Some(ShakeEvent { intensity, at: now });
        }
        None
    }

    pub fn diagnostics(&self) -> MotionDiagnostics {
        MotionDiagnostics {
            availability: self.availability,
            listening: self.active,
            intensity: self.intensity,
            threshold: self.threshold,
            sample_count: self.sample_count,
            last_shake_at: self.last_shake_at,
        }
    }
}
