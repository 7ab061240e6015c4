//! Bracketing root search over an intercept adjustment
//!
//! Alternates false-position and bisection steps inside a sign-changing
//! bracket, so a linear error is solved in one step while the bracket still
//! at least halves every second evaluation on step-shaped responses.

use serde::{Deserialize, Serialize};

use crate::core::config::CalibrationConfig;
use crate::core::error::Result;

/// Single-capability evaluation: `target - simulated` at a trial adjustment
///
/// Implementations must leave no structural mutation behind; only flags
/// and per-person decision fields may change between calls.
pub trait Evaluator {
    fn evaluate(&mut self, trial: f64) -> Result<f64>;
}

/// Adapts a plain function into an [`Evaluator`]
pub struct FnEvaluator<F>(pub F);

impl<F> Evaluator for FnEvaluator<F>
where
    F: FnMut(f64) -> f64,
{
    fn evaluate(&mut self, trial: f64) -> Result<f64> {
        Ok((self.0)(trial))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    pub lower: f64,
    pub upper: f64,
    pub start: f64,
    pub tol_arg: f64,
    pub tol_fun: f64,
    pub max_iterations: u32,
}

impl SearchSettings {
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            lower: config.lower,
            upper: config.upper,
            start: config.start,
            tol_arg: config.tol_arg,
            tol_fun: config.tol_fun,
            max_iterations: config.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Adjustment to commit
    pub value: f64,
    /// Error observed at `value`
    pub error: f64,
    pub iterations: u32,
    pub converged: bool,
}

struct Counted<'e, E: ?Sized> {
    evaluator: &'e mut E,
    calls: u32,
}

impl<E: Evaluator + ?Sized> Counted<'_, E> {
    fn eval(&mut self, x: f64) -> Result<f64> {
        self.calls += 1;
        self.evaluator.evaluate(x)
    }
}

fn same_sign(a: f64, b: f64) -> bool {
    (a > 0.0) == (b > 0.0)
}

/// Find the adjustment where the evaluator's error crosses zero
///
/// Failure to converge is not an error: the last trial is returned with
/// `converged == false`.
pub fn search<E: Evaluator + ?Sized>(settings: &SearchSettings, evaluator: &mut E) -> Result<SearchOutcome> {
    let mut ev = Counted { evaluator, calls: 0 };
    let done = |value: f64, error: f64, calls: u32, converged: bool| SearchOutcome {
        value,
        error,
        iterations: calls,
        converged,
    };

    let f_start = ev.eval(settings.start)?;
    if f_start.abs() < settings.tol_fun {
        return Ok(done(settings.start, f_start, ev.calls, true));
    }

    // Establish a bracket around the start value
    let mut candidates = vec![(settings.start, f_start)];
    let mut bracket = None;
    for end in [settings.lower, settings.upper] {
        if end == settings.start {
            continue;
        }
        let f_end = ev.eval(end)?;
        if f_end.abs() < settings.tol_fun {
            return Ok(done(end, f_end, ev.calls, true));
        }
        candidates.push((end, f_end));
        if !same_sign(f_start, f_end) {
            bracket = Some(if end < settings.start {
                ((end, f_end), (settings.start, f_start))
            } else {
                ((settings.start, f_start), (end, f_end))
            });
            break;
        }
    }

    let Some(((mut a, mut fa), (mut b, mut fb))) = bracket else {
        let (value, error) = candidates
            .into_iter()
            .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
            .unwrap_or((settings.start, f_start));
        tracing::warn!(
            "Calibration search: no sign change in [{}, {}], using {} (error {:.5})",
            settings.lower,
            settings.upper,
            value,
            error
        );
        return Ok(done(value, error, ev.calls, false));
    };

    let mut last = (settings.start, f_start);
    let mut step = 0u32;
    while ev.calls < settings.max_iterations {
        step += 1;
        let secant = (a * fb - b * fa) / (fb - fa);
        let x = if step % 2 == 1 && secant.is_finite() && secant > a && secant < b {
            secant
        } else {
            0.5 * (a + b)
        };

        let fx = ev.eval(x)?;
        if fx.abs() < settings.tol_fun || (x - last.0).abs() < settings.tol_arg || (b - a) < settings.tol_arg {
            return Ok(done(x, fx, ev.calls, true));
        }

        if same_sign(fx, fa) {
            a = x;
            fa = fx;
        } else {
            b = x;
            fb = fx;
        }
        last = (x, fx);
    }

    tracing::warn!(
        "Calibration search did not converge in {} evaluations; using {} (error {:.5})",
        ev.calls,
        last.0,
        last.1
    );
    Ok(done(last.0, last.1, ev.calls, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SearchSettings {
        SearchSettings {
            lower: -10.0,
            upper: 10.0,
            start: 0.0,
            tol_arg: 1e-9,
            tol_fun: 1e-6,
            max_iterations: 100,
        }
    }

    #[test]
    fn test_linear_error_converges() {
        let (target, a, b) = (3.0, 2.0, -1.0);
        let mut eval = FnEvaluator(|x: f64| target - (a * x + b));
        let out = search(&settings(), &mut eval).unwrap();
        assert!(out.converged);
        assert!((out.value - (target - b) / a).abs() < 1e-6);
    }

    #[test]
    fn test_start_already_converged() {
        let mut eval = FnEvaluator(|x: f64| -x);
        let out = search(&settings(), &mut eval).unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_nonlinear_monotone_error() {
        let mut eval = FnEvaluator(|x: f64| 0.6 - 1.0 / (1.0 + (-x).exp()));
        let out = search(&settings(), &mut eval).unwrap();
        assert!(out.converged);
        assert!(out.error.abs() < 1e-6);
    }

    #[test]
    fn test_no_bracket_is_not_converged() {
        let mut eval = FnEvaluator(|x: f64| 5.0 + x * x);
        let out = search(&settings(), &mut eval).unwrap();
        assert!(!out.converged);
        assert_eq!(out.value, 0.0);
    }

    #[test]
    fn test_budget_exhaustion_returns_last_trial() {
        let mut s = settings();
        s.max_iterations = 4;
        s.tol_fun = 1e-15;
        let mut eval = FnEvaluator(|x: f64| 0.3 - x.powi(3));
        let out = search(&s, &mut eval).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 4);
    }
}
