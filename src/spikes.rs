//! Input spike-train construction.
//!
//! Helpers for building the spike time lists consumed by synaptic current
//! sources: regular trains, Poisson trains and Gaussian timing jitter.

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::quantity::Time;

/// Spikes at a constant interval in `[t_start, t_end)`.
///
/// Times are generated by index, not accumulation, so a span that is an
/// exact multiple of the interval never yields a stray spike at `t_end`.
pub fn constant_interval(t_start: Time, t_end: Time, interval: Time) -> Vec<Time> {
    if t_end <= t_start {
        return Vec::new();
    }
    let q = (t_end - t_start) / interval;
    let n = if (q - q.round()).abs() < 1e-9 {
        q.round() as usize
    } else {
        q.ceil() as usize
    };
    constant_count(t_start, n, interval)
}

/// `n` spikes at a constant interval starting at `t_offs`.
pub fn constant_count(t_offs: Time, n: usize, interval: Time) -> Vec<Time> {
    (0..n).map(|i| t_offs + interval * i as f64).collect()
}

/// Spikes at a constant frequency (hertz) in `[t_start, t_end)`.
pub fn constant_frequency(t_start: Time, t_end: Time, frequency: f64) -> Vec<Time> {
    constant_interval(t_start, t_end, Time::from_s(1.0 / frequency))
}

/// Homogeneous Poisson spike train with the given rate (hertz) in
/// `[t_start, t_end)`, drawn from exponential inter-spike intervals.
pub fn poisson<R: Rng>(t_start: Time, t_end: Time, rate: f64, rng: &mut R) -> Vec<Time> {
    let mut train = Vec::new();
    if rate <= 0.0 {
        return train;
    }
    let isi = Exp::new(rate).expect("rate is positive");
    let mut t = t_start + Time::from_s(isi.sample(rng));
    while t < t_end {
        train.push(t);
        t += Time::from_s(isi.sample(rng));
    }
    train
}

/// Adds zero-mean Gaussian jitter with standard deviation `sigma` to every
/// spike. The result is re-sorted; jittered times may leave the original
/// interval.
pub fn with_gaussian_jitter<R: Rng>(mut train: Vec<Time>, sigma: Time, rng: &mut R) -> Vec<Time> {
    let dist = Normal::new(0.0, sigma.value()).expect("sigma is finite");
    for t in &mut train {
        *t += Time::from_s(dist.sample(rng));
    }
    train.sort_by(|a, b| a.partial_cmp(b).expect("times are finite"));
    train
}

/// Sorts the train and shifts it so the first spike lands at `t_offs`.
pub fn normalise(train: &mut [Time], t_offs: Time) {
    train.sort_by(|a, b| a.partial_cmp(b).expect("times are finite"));
    if let Some(&first) = train.first() {
        for t in train.iter_mut() {
            *t = *t - first + t_offs;
        }
    }
}
