//! Holt's damped-trend exponential smoothing.
//!
//! ```text
//! one-step:  ŷ_t     = l_{t-1} + φ b_{t-1}
//! level:     l_t     = α y_t + (1 - α)(l_{t-1} + φ b_{t-1})
//! trend:     b_t     = β (l_t - l_{t-1}) + (1 - β) φ b_{t-1}
//! forecast:  ŷ_{n+h} = l_n + (φ + φ² + … + φ^h) b_n
//! ```
//!
//! α and β are fixed by configuration. The initial level l₀, initial trend b₀
//! and damping φ are estimated by minimizing the in-sample one-step SSE:
//! - for a fixed φ every one-step forecast is affine in (l₀, b₀), so the best
//!   (l₀, b₀) solve a 2×2 normal-equation system exactly
//! - φ is searched on [damping_min, damping_max] with a coarse grid followed by
//!   golden-section refinement
//!
//! The search is deterministic: the same series always yields the same fit.

use super::{checked_history, ForecastResult, Forecaster};
use crate::config::ForecastConfig;
use crate::domain::FinancialTimeSeries;
use crate::error::{ensure_finite, ValuationError};

const DAMPING_GRID_STEPS: usize = 16;
const GOLDEN_TOLERANCE: f64 = 1e-8;
const GOLDEN_MAX_ITERATIONS: usize = 100;
/// Relative determinant below which the initial-state system is singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Estimated damped-trend model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampedTrendFit {
    pub smoothing_level: f64,
    pub smoothing_trend: f64,
    pub damping: f64,
    pub initial_level: f64,
    pub initial_trend: f64,
    /// Level after the last observation.
    pub level: f64,
    /// Trend after the last observation.
    pub trend: f64,
    /// In-sample sum of squared one-step errors.
    pub sse: f64,
}

impl DampedTrendFit {
    /// Forecast `h` years after the last observation (h >= 1).
    pub fn forecast(&self, h: usize) -> f64 {
        let mut damp_sum = 0.0;
        let mut power = 1.0;
        for _ in 0..h {
            power *= self.damping;
            damp_sum += power;
        }
        self.level + damp_sum * self.trend
    }
}

/// `c + p·l₀ + q·b₀`
#[derive(Debug, Clone, Copy)]
struct Affine {
    c: f64,
    p: f64,
    q: f64,
}

impl Affine {
    fn plus(self, o: Self) -> Self {
        Self {
            c: self.c + o.c,
            p: self.p + o.p,
            q: self.q + o.q,
        }
    }

    fn minus(self, o: Self) -> Self {
        Self {
            c: self.c - o.c,
            p: self.p - o.p,
            q: self.q - o.q,
        }
    }

    fn scale(self, k: f64) -> Self {
        Self {
            c: self.c * k,
            p: self.p * k,
            q: self.q * k,
        }
    }

    fn shift(self, k: f64) -> Self {
        Self { c: self.c + k, ..self }
    }
}

/// Candidate fit for one damping value.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    damping: f64,
    initial_level: f64,
    initial_trend: f64,
    sse: f64,
}

/// Damped-trend exponential smoothing forecaster.
#[derive(Debug, Clone)]
pub struct TrendForecaster {
    alpha: f64,
    beta: f64,
    damping_min: f64,
    damping_max: f64,
    horizon: usize,
}

impl TrendForecaster {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            alpha: config.smoothing_level,
            beta: config.smoothing_trend,
            damping_min: config.damping_min,
            damping_max: config.damping_max,
            horizon: config.horizon,
        }
    }

    /// Estimate l₀, b₀ and φ for values given oldest first.
    pub fn fit(&self, values: &[f64]) -> Result<DampedTrendFit, ValuationError> {
        if values.len() < 2 {
            return Err(ValuationError::InvalidParameters(format!(
                "damped trend fit needs at least 2 points, got {}",
                values.len()
            )));
        }

        let best = self.search_damping(values);
        let (level, trend) = self.run(values, best.damping, best.initial_level, best.initial_trend);

        Ok(DampedTrendFit {
            smoothing_level: self.alpha,
            smoothing_trend: self.beta,
            damping: best.damping,
            initial_level: best.initial_level,
            initial_trend: best.initial_trend,
            level,
            trend,
            sse: best.sse,
        })
    }

    /// One-step forecasts as affine functions of (l₀, b₀).
    fn one_step_terms(&self, values: &[f64], phi: f64) -> Vec<Affine> {
        let (alpha, beta) = (self.alpha, self.beta);
        let mut level = Affine { c: 0.0, p: 1.0, q: 0.0 };
        let mut trend = Affine { c: 0.0, p: 0.0, q: 1.0 };
        let mut terms = Vec::with_capacity(values.len());

        for &y in values {
            let fcast = level.plus(trend.scale(phi));
            terms.push(fcast);
            let next_level = fcast.scale(1.0 - alpha).shift(alpha * y);
            let next_trend = next_level
                .minus(level)
                .scale(beta)
                .plus(trend.scale((1.0 - beta) * phi));
            level = next_level;
            trend = next_trend;
        }
        terms
    }

    /// Best initial state for a fixed damping value.
    fn evaluate(&self, values: &[f64], phi: f64) -> Candidate {
        let terms = self.one_step_terms(values, phi);

        let (mut spp, mut spq, mut sqq, mut spr, mut sqr) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (t, &y) in terms.iter().zip(values) {
            let r = y - t.c;
            spp += t.p * t.p;
            spq += t.p * t.q;
            sqq += t.q * t.q;
            spr += t.p * r;
            sqr += t.q * r;
        }

        let det = spp * sqq - spq * spq;
        let (l0, b0) = if det.abs() > SINGULAR_TOLERANCE * spp * sqq && det.is_finite() {
            ((spr * sqq - sqr * spq) / det, (sqr * spp - spr * spq) / det)
        } else {
            (values[0], values[1] - values[0])
        };

        let sse = terms
            .iter()
            .zip(values)
            .map(|(t, &y)| {
                let e = y - (t.c + t.p * l0 + t.q * b0);
                e * e
            })
            .sum();

        Candidate {
            damping: phi,
            initial_level: l0,
            initial_trend: b0,
            sse,
        }
    }

    fn search_damping(&self, values: &[f64]) -> Candidate {
        let (lo, hi) = (self.damping_min, self.damping_max);
        if hi - lo <= GOLDEN_TOLERANCE {
            return self.evaluate(values, lo);
        }

        // Coarse grid to find the basin.
        let step = (hi - lo) / DAMPING_GRID_STEPS as f64;
        let mut best_idx = 0;
        let mut best = self.evaluate(values, lo);
        for i in 1..=DAMPING_GRID_STEPS {
            let c = self.evaluate(values, lo + step * i as f64);
            if c.sse < best.sse {
                best = c;
                best_idx = i;
            }
        }

        // Golden-section refinement inside the neighbouring grid cells.
        let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
        let mut a = lo + step * best_idx.saturating_sub(1) as f64;
        let mut b = (lo + step * (best_idx + 1) as f64).min(hi);
        let mut x1 = b - inv_phi * (b - a);
        let mut x2 = a + inv_phi * (b - a);
        let mut f1 = self.evaluate(values, x1);
        let mut f2 = self.evaluate(values, x2);

        for _ in 0..GOLDEN_MAX_ITERATIONS {
            if b - a <= GOLDEN_TOLERANCE {
                break;
            }
            if f1.sse <= f2.sse {
                b = x2;
                x2 = x1;
                f2 = f1;
                x1 = b - inv_phi * (b - a);
                f1 = self.evaluate(values, x1);
            } else {
                a = x1;
                x1 = x2;
                f1 = f2;
                x2 = a + inv_phi * (b - a);
                f2 = self.evaluate(values, x2);
            }
        }

        let refined = if f1.sse <= f2.sse { f1 } else { f2 };
        if refined.sse < best.sse {
            refined
        } else {
            best
        }
    }

    /// Run the recursion with a concrete initial state; returns the final (level, trend).
    fn run(&self, values: &[f64], phi: f64, l0: f64, b0: f64) -> (f64, f64) {
        let (mut level, mut trend) = (l0, b0);
        for &y in values {
            let next_level = self.alpha * y + (1.0 - self.alpha) * (level + phi * trend);
            trend = self.beta * (next_level - level) + (1.0 - self.beta) * phi * trend;
            level = next_level;
        }
        (level, trend)
    }
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

impl Forecaster for TrendForecaster {
    fn name(&self) -> &str {
        "damped_trend"
    }

    fn forecast(&self, history: &FinancialTimeSeries) -> Result<ForecastResult, ValuationError> {
        let (values, latest) = checked_history(history)?;
        let fit = self.fit(&values)?;

        let projected = (1..=self.horizon)
            .map(|h| ensure_finite(fit.forecast(h), "damped trend forecast"))
            .collect::<Result<Vec<_>, _>>()?;

        ForecastResult::following(latest, &projected)
    }
}
