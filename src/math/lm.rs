//! Bounded Levenberg–Marquardt nonlinear least squares.
//!
//! We minimise `½ Σ r_i(p)²` where `r_i = model_i(p) - observed_i`.
//!
//! Implementation choices:
//! - The Jacobian is never materialised. Each sample contributes its gradient
//!   row to `JᵀJ` and `Jᵀr` directly, so memory stays `O(k²)` even for volumes
//!   with millions of voxels. Accumulation runs on rayon (fold/reduce).
//! - Marquardt diagonal scaling with Nielsen's damping update.
//! - Box bounds are handled by projection: the trial point is clamped into the
//!   box, and parameters sitting on a bound whose gradient points outward are
//!   frozen for the step.
//! - The damped normal equations are solved with nalgebra's Cholesky.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{SolveSummary, Termination};
use crate::error::FitError;

/// Samples per rayon task; below this splitting costs more than it saves.
const MIN_CHUNK: usize = 4096;

/// Starting damping factor (relative to the `JᵀJ` diagonal).
const INITIAL_LAMBDA: f64 = 1e-3;

/// Damping beyond this means no descent step exists at working precision.
const MAX_LAMBDA: f64 = 1e32;

/// Floor for `JᵀJ` diagonal entries used in Marquardt scaling.
const DIAG_FLOOR: f64 = 1e-12;

/// A least-squares problem expressed sample by sample.
pub trait ResidualModel: Sync {
    fn n_params(&self) -> usize;

    fn n_samples(&self) -> usize;

    /// Residual `model - observed` for sample `i`.
    ///
    /// When `grad` is given it must be filled with `∂model/∂p` (length `n_params`).
    fn residual(&self, i: usize, params: &[f64], grad: Option<&mut [f64]>) -> f64;
}

/// Per-parameter box constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, FitError> {
        if lower.len() != upper.len() {
            return Err(FitError::InvalidInput(
                "lower and upper bounds differ in length".to_string(),
            ));
        }
        if lower.iter().zip(&upper).any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi) {
            return Err(FitError::InvalidInput(
                "each lower bound must be <= its upper bound".to_string(),
            ));
        }
        Ok(Self { lower, upper })
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    fn project(&self, p: &mut [f64]) {
        for ((v, &lo), &hi) in p.iter_mut().zip(&self.lower).zip(&self.upper) {
            if *v < lo {
                *v = lo;
            } else if *v > hi {
                *v = hi;
            }
        }
    }

    /// Parameters pinned to a bound by a gradient pointing out of the box.
    fn active_set(&self, p: &[f64], grad: &DVector<f64>) -> Vec<bool> {
        p.iter()
            .enumerate()
            .map(|(j, &v)| {
                (v <= self.lower[j] && grad[j] > 0.0) || (v >= self.upper[j] && grad[j] < 0.0)
            })
            .collect()
    }
}

/// Optimizer budget and tolerances.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Cap on model evaluations; `None` means `200 × (parameters + 1)`.
    pub max_evaluations: Option<usize>,
    /// Relative cost reduction considered converged.
    pub ftol: f64,
    /// Relative step size considered converged.
    pub xtol: f64,
    /// Gradient/residual cosine considered converged (0 disables the test).
    pub gtol: f64,
    /// Wall-clock budget for one solve.
    pub time_budget: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_evaluations: None,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            time_budget: None,
        }
    }
}

impl SolverOptions {
    pub fn evaluation_budget(&self, n_params: usize) -> usize {
        self.max_evaluations.unwrap_or(200 * (n_params + 1)).max(1)
    }
}

/// Optimizer output.
#[derive(Debug, Clone)]
pub struct Solution {
    pub params: Vec<f64>,
    pub summary: SolveSummary,
}

/// Minimise the model's squared residuals starting from `initial`.
pub fn minimize<M: ResidualModel>(
    model: &M,
    initial: &[f64],
    bounds: &Bounds,
    opts: &SolverOptions,
) -> Result<Solution, FitError> {
    let k = model.n_params();
    let n = model.n_samples();
    if initial.len() != k || bounds.len() != k {
        return Err(FitError::InvalidInput(format!(
            "model has {k} parameters, got {} initial values and {} bounds",
            initial.len(),
            bounds.len()
        )));
    }
    if n < k {
        return Err(FitError::InsufficientData {
            available: n,
            required: k,
        });
    }

    let budget = opts.evaluation_budget(k);
    let started = Instant::now();

    let mut p = initial.to_vec();
    bounds.project(&mut p);
    let mut normal = accumulate(model, &p);
    let mut evaluations = 1usize;
    if !normal.cost.is_finite() {
        return Err(FitError::InvalidInput(
            "residuals are not finite at the initial guess".to_string(),
        ));
    }

    let mut lambda = INITIAL_LAMBDA;
    let mut nu = 2.0;
    let mut iterations = 0usize;

    let finish = |p: Vec<f64>, cost: f64, evaluations, iterations, termination| Solution {
        params: p,
        summary: SolveSummary {
            evaluations,
            iterations,
            cost,
            rmse: (2.0 * cost / n as f64).sqrt(),
            termination,
        },
    };

    loop {
        if normal.cost == 0.0 {
            return Ok(finish(p, 0.0, evaluations, iterations, Termination::ExactFit));
        }

        let active = bounds.active_set(&p, &normal.jtr);
        if opts.gtol > 0.0 && gradient_cosine(&normal, &active) <= opts.gtol {
            return Ok(finish(p, normal.cost, evaluations, iterations, Termination::Gradient));
        }

        if evaluations >= budget {
            return Err(FitError::NonConvergence {
                evaluations,
                reason: format!("evaluation budget of {budget} exhausted"),
            });
        }
        if let Some(limit) = opts.time_budget {
            if started.elapsed() >= limit {
                return Err(FitError::NonConvergence {
                    evaluations,
                    reason: format!("time budget of {:.3}s exhausted", limit.as_secs_f64()),
                });
            }
        }
        iterations += 1;

        let Some(delta) = damped_step(&normal, lambda, &active) else {
            lambda *= nu;
            nu *= 2.0;
            if lambda > MAX_LAMBDA {
                return Err(damping_overflow(evaluations));
            }
            continue;
        };

        let mut trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
        bounds.project(&mut trial);
        let step = DVector::from_iterator(k, trial.iter().zip(&p).map(|(t, a)| t - a));

        let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
        if step.norm() <= opts.xtol * (opts.xtol + p_norm) {
            return Ok(finish(p, normal.cost, evaluations, iterations, Termination::Step));
        }

        let trial_cost = cost(model, &trial);
        evaluations += 1;

        // Reduction predicted by the linearised model for the projected step.
        let predicted = -step.dot(&normal.jtr) - 0.5 * step.dot(&(&normal.jtj * &step));

        if trial_cost.is_finite() && predicted > 0.0 && trial_cost < normal.cost {
            let rho = (normal.cost - trial_cost) / predicted;
            let previous = normal.cost;
            p = trial;
            normal = accumulate(model, &p);
            evaluations += 1;

            lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;

            log::trace!(
                "lm iter {iterations}: cost {previous:.6e} -> {:.6e}, lambda {lambda:.3e}",
                normal.cost
            );

            // A small reduction only counts once the step is close to Gauss-Newton.
            if lambda <= 1.0 && previous - normal.cost <= opts.ftol * previous {
                return Ok(finish(p, normal.cost, evaluations, iterations, Termination::Cost));
            }
        } else {
            lambda *= nu;
            nu *= 2.0;
            if lambda > MAX_LAMBDA {
                return Err(damping_overflow(evaluations));
            }
        }
    }
}

fn damping_overflow(evaluations: usize) -> FitError {
    FitError::NonConvergence {
        evaluations,
        reason: "no step reduces the residual (damping overflow)".to_string(),
    }
}

/// `JᵀJ`, `Jᵀr` and `½ Σ r²` at one parameter point.
#[derive(Debug, Clone)]
struct NormalEquations {
    jtj: DMatrix<f64>,
    jtr: DVector<f64>,
    cost: f64,
}

#[derive(Clone)]
struct Accumulator {
    k: usize,
    jtj: Vec<f64>,
    jtr: Vec<f64>,
    sum_sq: f64,
    grad: Vec<f64>,
}

impl Accumulator {
    fn zeros(k: usize) -> Self {
        Self {
            k,
            jtj: vec![0.0; k * k],
            jtr: vec![0.0; k],
            sum_sq: 0.0,
            grad: vec![0.0; k],
        }
    }

    fn add_sample(&mut self, r: f64) {
        let k = self.k;
        self.sum_sq += r * r;
        for a in 0..k {
            let ga = self.grad[a];
            self.jtr[a] += ga * r;
            for b in a..k {
                self.jtj[a * k + b] += ga * self.grad[b];
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.sum_sq += other.sum_sq;
        for (a, b) in self.jtj.iter_mut().zip(&other.jtj) {
            *a += b;
        }
        for (a, b) in self.jtr.iter_mut().zip(&other.jtr) {
            *a += b;
        }
        self
    }
}

fn accumulate<M: ResidualModel>(model: &M, p: &[f64]) -> NormalEquations {
    let k = model.n_params();
    let acc = (0..model.n_samples())
        .into_par_iter()
        .with_min_len(MIN_CHUNK)
        .fold(
            || Accumulator::zeros(k),
            |mut acc, i| {
                let r = model.residual(i, p, Some(acc.grad.as_mut_slice()));
                acc.add_sample(r);
                acc
            },
        )
        .reduce(|| Accumulator::zeros(k), Accumulator::merge);

    let mut jtj = DMatrix::<f64>::zeros(k, k);
    for a in 0..k {
        for b in a..k {
            let v = acc.jtj[a * k + b];
            jtj[(a, b)] = v;
            jtj[(b, a)] = v;
        }
    }
    NormalEquations {
        jtj,
        jtr: DVector::from_vec(acc.jtr),
        cost: 0.5 * acc.sum_sq,
    }
}

fn cost<M: ResidualModel>(model: &M, p: &[f64]) -> f64 {
    let sum_sq: f64 = (0..model.n_samples())
        .into_par_iter()
        .with_min_len(MIN_CHUNK)
        .map(|i| {
            let r = model.residual(i, p, None);
            r * r
        })
        .sum();
    0.5 * sum_sq
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` with frozen parameters held at zero.
fn damped_step(normal: &NormalEquations, lambda: f64, active: &[bool]) -> Option<DVector<f64>> {
    let k = normal.jtr.len();
    let mut a = normal.jtj.clone();
    let mut rhs = -normal.jtr.clone();
    for j in 0..k {
        if active[j] {
            for i in 0..k {
                a[(i, j)] = 0.0;
                a[(j, i)] = 0.0;
            }
            a[(j, j)] = 1.0;
            rhs[j] = 0.0;
        } else {
            a[(j, j)] += lambda * normal.jtj[(j, j)].max(DIAG_FLOOR);
        }
    }
    let delta = a.cholesky()?.solve(&rhs);
    if delta.iter().all(|v| v.is_finite()) {
        Some(delta)
    } else {
        None
    }
}

/// Largest cosine between the residual vector and a free Jacobian column.
fn gradient_cosine(normal: &NormalEquations, active: &[bool]) -> f64 {
    let r_norm = (2.0 * normal.cost).sqrt();
    if r_norm == 0.0 {
        return 0.0;
    }
    (0..normal.jtr.len())
        .filter(|&j| !active[j])
        .map(|j| {
            let col = normal.jtj[(j, j)].sqrt();
            if col == 0.0 {
                0.0
            } else {
                normal.jtr[j].abs() / (col * r_norm)
            }
        })
        .fold(0.0, f64::max)
}
