//! Fixed- and adaptive-stepsize integrators.
//!
//! All integrators are stateless transformers over the solver-owned state:
//! `step` maps `(t, y, h)` to a new state without keeping any copy of it.
//! The adaptive [`DormandPrince`] integrator caches only its suggested next
//! step size between calls.

use crate::coefficients::{A, B_ERR, C, EMBEDDED_ORDER, STAGES};
use crate::system::Dynamics;

/// Result of a single integration step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New state after the step.
    pub y: Vec<f64>,
    /// New time value.
    pub t: f64,
    /// Normalized error estimate (≤ 1.0 for acceptance; 0 for fixed-step
    /// methods).
    pub error: f64,
    /// Suggested step size for the next attempt.
    pub h_next: f64,
    /// Whether the step was accepted. Rejected steps must not be used to
    /// advance the state.
    pub accepted: bool,
}

/// A step function advancing a state vector by a time increment.
///
/// Callers may always impose a step smaller than the integrator's ideal
/// one (clamping to a discontinuity or the end time); the imposed `h` is a
/// hard ceiling, never stretched.
pub trait Integrator {
    /// Advance `y` from `t` by `h` against the system `sys`.
    fn step<S: Dynamics + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], h: f64) -> StepResult;

    /// Candidate step size for the next step. Fixed-step methods echo the
    /// caller-configured step; adaptive methods return their cached
    /// suggestion once one exists.
    fn propose(&self, h_default: f64) -> f64 {
        h_default
    }

    /// Smallest step this integrator is willing to retry with; at or below
    /// this, a rejected step is a fatal underflow. Fixed-step methods never
    /// reject, hence 0.
    fn min_step(&self) -> f64 {
        0.0
    }

    /// Derivative evaluations per call to [`Integrator::step`].
    fn evals_per_step(&self) -> u64;
}

/// y + h * k, elementwise.
fn axpy(y: &[f64], k: &[f64], h: f64) -> Vec<f64> {
    y.iter().zip(k).map(|(yi, ki)| yi + h * ki).collect()
}

/// Euler's method: first order, one derivative evaluation per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl Integrator for Euler {
    fn step<S: Dynamics + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], h: f64) -> StepResult {
        let mut k = vec![0.0; sys.dim()];
        sys.rhs(t, y, &mut k);
        StepResult {
            y: axpy(y, &k, h),
            t: t + h,
            error: 0.0,
            h_next: h,
            accepted: true,
        }
    }

    fn evals_per_step(&self) -> u64 {
        1
    }
}

/// Midpoint method: second-order Runge-Kutta, two evaluations per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Midpoint;

impl Integrator for Midpoint {
    fn step<S: Dynamics + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], h: f64) -> StepResult {
        let n = sys.dim();
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        sys.rhs(t, y, &mut k1);
        sys.rhs(t + 0.5 * h, &axpy(y, &k1, 0.5 * h), &mut k2);
        StepResult {
            y: axpy(y, &k2, h),
            t: t + h,
            error: 0.0,
            h_next: h,
            accepted: true,
        }
    }

    fn evals_per_step(&self) -> u64 {
        2
    }
}

/// Classic fourth-order Runge-Kutta, four evaluations per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn step<S: Dynamics + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], h: f64) -> StepResult {
        let n = sys.dim();
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        sys.rhs(t, y, &mut k1);
        sys.rhs(t + 0.5 * h, &axpy(y, &k1, 0.5 * h), &mut k2);
        sys.rhs(t + 0.5 * h, &axpy(y, &k2, 0.5 * h), &mut k3);
        sys.rhs(t + h, &axpy(y, &k3, h), &mut k4);

        let y_new = y
            .iter()
            .enumerate()
            .map(|(i, yi)| yi + h * (k1[i] + 2.0 * (k2[i] + k3[i]) + k4[i]) / 6.0)
            .collect();

        StepResult {
            y: y_new,
            t: t + h,
            error: 0.0,
            h_next: h,
            accepted: true,
        }
    }

    fn evals_per_step(&self) -> u64 {
        4
    }
}

/// Error tolerance for adaptive step control.
///
/// A component's error is scaled by `atol + rtol * |y|`.
#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    /// Absolute tolerance.
    pub atol: f64,
    /// Relative tolerance.
    pub rtol: f64,
}

impl Tolerances {
    /// Create a tolerance specification.
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            atol: 1e-6,
            rtol: 1e-6,
        }
    }
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/p)
/// where p = 5 for the Dormand-Prince 5(4) pair
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    /// Exponent = 1/(order + 1) for I-controller
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / (EMBEDDED_ORDER as f64 + 1.0),
        }
    }
}

impl StepController {
    /// Compute the step size adjustment factor
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Dormand-Prince 5(4) embedded Runge-Kutta pair with adaptive step-size
/// control.
///
/// One set of stage evaluations yields a 5th-order solution and a 4th-order
/// embedded estimate; the scaled max-norm of their difference decides
/// acceptance.
#[derive(Debug, Clone)]
pub struct DormandPrince {
    tol: Tolerances,
    controller: StepController,
    /// Minimum step size; a rejected step at this floor is a fatal
    /// underflow.
    pub h_min: f64,
    /// Maximum step size.
    pub h_max: f64,
    /// Suggested step size carried between calls. Never caches state.
    h_suggest: Option<f64>,
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self::new(Tolerances::default())
    }
}

impl DormandPrince {
    /// Create a Dormand-Prince integrator with the given tolerances.
    pub fn new(tol: Tolerances) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-9,
            h_max: 10e-3,
            h_suggest: None,
        }
    }

    /// Set minimum and maximum step sizes.
    pub fn with_step_limits(mut self, h_min: f64, h_max: f64) -> Self {
        self.h_min = h_min;
        self.h_max = h_max;
        self
    }

    /// Compute all stages; the FSAL row makes stage 6's trial state the
    /// 5th-order solution, which is returned alongside the stages.
    fn compute_stages<S: Dynamics + ?Sized>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64],
        h: f64,
        k: &mut [Vec<f64>],
    ) -> Vec<f64> {
        let n = sys.dim();
        sys.rhs(t, y, &mut k[0]);

        let mut y_tmp = vec![0.0; n];
        for i in 1..STAGES {
            for m in 0..n {
                let mut sum = 0.0;
                for (j, kj) in k.iter().enumerate().take(i) {
                    sum += A[i][j] * kj[m];
                }
                y_tmp[m] = y[m] + h * sum;
            }
            sys.rhs(t + C[i] * h, &y_tmp, &mut k[i]);
        }

        // Row 6 of A equals B, so the last trial state is y5
        y_tmp
    }

    /// Scaled max-norm error estimate over the stages.
    fn compute_error(&self, y5: &[f64], h: f64, k: &[Vec<f64>]) -> f64 {
        let mut max_err: f64 = 0.0;
        for (m, &y5m) in y5.iter().enumerate() {
            let mut err_m = 0.0;
            for (i, ki) in k.iter().enumerate() {
                err_m += B_ERR[i] * ki[m];
            }
            err_m *= h;
            let scale = self.tol.atol + self.tol.rtol * y5m.abs();
            max_err = max_err.max(err_m.abs() / scale);
        }
        max_err
    }
}

impl Integrator for DormandPrince {
    fn step<S: Dynamics + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], h: f64) -> StepResult {
        let n = sys.dim();
        let mut k = vec![vec![0.0; n]; STAGES];

        let y5 = self.compute_stages(sys, t, y, h, &mut k);
        let error = self.compute_error(&y5, h, &k);
        let accepted = error <= 1.0;

        let factor = self.controller.compute_factor(error);
        let h_next = (h * factor).clamp(self.h_min, self.h_max);
        self.h_suggest = Some(h_next);

        StepResult {
            y: y5,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    fn propose(&self, h_default: f64) -> f64 {
        self.h_suggest.unwrap_or(h_default).min(self.h_max)
    }

    fn min_step(&self) -> f64 {
        self.h_min
    }

    fn evals_per_step(&self) -> u64 {
        STAGES as u64
    }
}
