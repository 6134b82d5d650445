//! Recording sinks for accepted states and spike events.
//!
//! The solver forwards `(time, state)` for the initial state and every
//! accepted step; recorders must not mutate their inputs. A slow recorder
//! extends wall-clock time but never affects integration.

use std::io::Write;

use crate::quantity::Time;

/// Sink consuming accepted simulation states.
pub trait Recorder {
    /// Called with the initial state and after every accepted step.
    fn record(&mut self, t: Time, y: &[f64]);

    /// Called when the neuron model emits a spike.
    fn record_spike(&mut self, _t: Time) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record(&mut self, _t: Time, _y: &[f64]) {}
}

/// Keeps the full trajectory and spike times in memory.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    rows: Vec<(Time, Vec<f64>)>,
    spikes: Vec<Time>,
}

impl TraceRecorder {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(time, state)` rows in acceptance order.
    pub fn rows(&self) -> &[(Time, Vec<f64>)] {
        &self.rows
    }

    /// Recorded spike times.
    pub fn spikes(&self) -> &[Time] {
        &self.spikes
    }
}

impl Recorder for TraceRecorder {
    fn record(&mut self, t: Time, y: &[f64]) {
        self.rows.push((t, y.to_vec()));
    }

    fn record_spike(&mut self, t: Time) {
        self.spikes.push(t);
    }
}

/// Writes `t, y0, y1, ...` rows to any [`Write`] sink.
///
/// Rows closer together than `min_delta` are suppressed, except repeated
/// rows at the same timestamp (which represent a sharp jump in the state
/// and are always kept). Write failures are the caller's concern; they are
/// remembered, not propagated.
pub struct CsvRecorder<W: Write> {
    out: W,
    min_delta: Time,
    last: Option<Time>,
    failed: bool,
}

impl<W: Write> CsvRecorder<W> {
    /// Recorder writing every accepted row.
    pub fn new(out: W) -> Self {
        Self::with_min_delta(out, Time::default())
    }

    /// Recorder suppressing rows closer together than `min_delta`.
    pub fn with_min_delta(out: W, min_delta: Time) -> Self {
        Self {
            out,
            min_delta,
            last: None,
            failed: false,
        }
    }

    /// Whether any write has failed so far.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Consumes the recorder, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Recorder for CsvRecorder<W> {
    fn record(&mut self, t: Time, y: &[f64]) {
        if let Some(last) = self.last {
            if t > last && t < last + self.min_delta {
                return;
            }
        }
        self.last = Some(t);

        let mut row = format!("{}", t.value());
        for v in y {
            row.push_str(", ");
            row.push_str(&v.to_string());
        }
        if writeln!(self.out, "{}", row).is_err() {
            self.failed = true;
        }
    }
}
