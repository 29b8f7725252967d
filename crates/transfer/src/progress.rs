use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Fixed-point scale for per-part fractions (parts per million).
const SLOT_SCALE: u32 = 1_000_000;

/// Callback invoked with each new overall progress value.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Phase of an upload as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Preparing,
    Uploading,
    Finalizing,
    Complete,
}

impl UploadPhase {
    /// First percentage of the phase's band.
    pub fn start_percent(&self) -> u8 {
        match self {
            UploadPhase::Preparing => 0,
            UploadPhase::Uploading => 5,
            UploadPhase::Finalizing => 95,
            UploadPhase::Complete => 100,
        }
    }
}

/// Overall progress on the 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    pub percent: u8,
}

/// Maps the mean part fraction onto the uploading band: `5 + round(mean * 90)`.
pub fn uploading_percent(mean: f64) -> u8 {
    let mean = if mean.is_nan() { 0.0 } else { mean.clamp(0.0, 1.0) };
    5 + (mean * 90.0).round() as u8
}

struct Emitted {
    phase: UploadPhase,
    percent: u8,
}

/// Combines per-part fractional progress into one monotonic percentage.
///
/// Slots are atomics written by their owning part only; reads of the
/// mean may race with writes to other slots. Emission is serialized and
/// never reports a value lower than one already reported.
pub struct ProgressAggregator {
    slots: Vec<AtomicU32>,
    emitted: Mutex<Emitted>,
    callback: Option<ProgressCallback>,
}

impl ProgressAggregator {
    /// Creates an aggregator with one slot per part.
    pub fn new(total_parts: u32) -> Self {
        Self {
            slots: (0..total_parts.max(1)).map(|_| AtomicU32::new(0)).collect(),
            emitted: Mutex::new(Emitted {
                phase: UploadPhase::Preparing,
                percent: 0,
            }),
            callback: None,
        }
    }

    /// One-slot aggregator for single-shot uploads.
    pub fn single_shot() -> Self {
        Self::new(1)
    }

    /// Registers the progress callback.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Moves to `phase`, emitting at least the phase's start percentage.
    pub fn enter_phase(&self, phase: UploadPhase) {
        let mut e = self.emitted.lock().unwrap();
        let percent = e.percent.max(phase.start_percent());
        let changed = e.phase != phase || percent > e.percent;
        e.phase = phase;
        e.percent = percent;
        if changed {
            self.notify(&e);
        }
    }

    /// Records `(bytes_sent, bytes_total)` for a 1-based part number.
    pub fn update_part(&self, part_number: u32, bytes_sent: u64, bytes_total: u64) {
        let Some(slot) = part_number
            .checked_sub(1)
            .and_then(|i| self.slots.get(i as usize))
        else {
            return;
        };

        let fraction = if bytes_total == 0 {
            SLOT_SCALE
        } else {
            let scaled = u128::from(bytes_sent.min(bytes_total)) * u128::from(SLOT_SCALE)
                / u128::from(bytes_total);
            scaled as u32
        };
        slot.store(fraction, Ordering::Relaxed);

        let mut e = self.emitted.lock().unwrap();
        let percent = uploading_percent(self.mean());
        if e.phase == UploadPhase::Uploading && percent > e.percent {
            e.percent = percent;
            self.notify(&e);
        }
    }

    /// Marks a part fully transferred.
    pub fn complete_part(&self, part_number: u32) {
        self.update_part(part_number, 1, 1);
    }

    /// Mean completion over all slots, in `[0, 1]`.
    pub fn mean(&self) -> f64 {
        let sum: u64 = self
            .slots
            .iter()
            .map(|s| u64::from(s.load(Ordering::Relaxed)))
            .sum();
        sum as f64 / (self.slots.len() as f64 * f64::from(SLOT_SCALE))
    }

    /// Last reported progress.
    pub fn snapshot(&self) -> UploadProgress {
        let e = self.emitted.lock().unwrap();
        UploadProgress {
            phase: e.phase,
            percent: e.percent,
        }
    }

    fn notify(&self, e: &Emitted) {
        if let Some(cb) = &self.callback {
            cb(UploadProgress {
                phase: e.phase,
                percent: e.percent,
            });
        }
    }
}
