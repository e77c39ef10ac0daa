//! Seeded synthetic datasets and deterministic fitting routines
//!
//! Used only when no pre-trained weights are injected. Every routine draws
//! from a `ChaCha8Rng` seeded by the caller and iterates a fixed number of
//! full-batch epochs, so the same seed always yields the same weights.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Samples drawn per synthetic dataset.
pub const SYNTHETIC_SAMPLES: usize = 512;

const QUANTILE_EPOCHS: usize = 600;
const QUANTILE_LEARNING_RATE: f64 = 0.2;
const LOGISTIC_EPOCHS: usize = 800;
const LOGISTIC_LEARNING_RATE: f64 = 0.5;

/// Reference price for converting synthetic volumes to quote notional.
const REFERENCE_PRICE: f64 = 100.0;

/// Features and targets of one synthetic dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

/// Synthetic slippage observations: `depth` bid volumes, `depth` ask
/// volumes and the notional, against slippage as a fraction of notional.
///
/// Slippage grows with the notional relative to the quoted liquidity.
pub fn slippage_dataset(depth: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(SYNTHETIC_SAMPLES);
    let mut targets = Vec::with_capacity(SYNTHETIC_SAMPLES);

    for _ in 0..SYNTHETIC_SAMPLES {
        let mut row = Vec::with_capacity(2 * depth + 1);
        for _ in 0..2 * depth {
            row.push(rng.gen_range(0.1..10.0));
        }
        let notional: f64 = rng.gen_range(10.0..50_000.0);
        row.push(notional);

        let quoted_volume: f64 = row[..2 * depth].iter().sum::<f64>() / 2.0;
        let liquidity = (quoted_volume * REFERENCE_PRICE).max(1.0);
        let noise: f64 = rng.gen_range(-0.0005..0.0005);
        targets.push((0.002 * notional / liquidity + noise).max(0.0));
        features.push(row);
    }

    Dataset { features, targets }
}

/// Synthetic maker/taker observations over `[aggressiveness, size]`.
///
/// Passive, small orders rest and fill as maker; aggressive or large ones
/// cross the spread.
pub fn maker_taker_dataset(seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(SYNTHETIC_SAMPLES);
    let mut targets = Vec::with_capacity(SYNTHETIC_SAMPLES);

    for _ in 0..SYNTHETIC_SAMPLES {
        let aggressiveness: f64 = rng.gen_range(0.0..=1.0);
        let size: f64 = rng.gen_range(0.0..=1.0);
        let p_maker = sigmoid(3.0 - 6.0 * aggressiveness - 2.0 * size);
        let draw: f64 = rng.gen();
        targets.push(if draw < p_maker { 1.0 } else { 0.0 });
        features.push(vec![aggressiveness, size]);
    }

    Dataset { features, targets }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Per-column mean and standard deviation; zero deviations become 1.
fn column_moments(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len().max(1) as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, x) in means.iter_mut().zip(row) {
            *m += x / n;
        }
    }
    let mut stds = vec![0.0; width];
    for row in rows {
        for ((s, x), m) in stds.iter_mut().zip(row).zip(&means) {
            *s += (x - m).powi(2) / n;
        }
    }
    for s in stds.iter_mut() {
        *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
    }
    (means, stds)
}

/// Linear quantile regression by full-batch subgradient descent on the
/// pinball loss. Features and target are standardized for the descent and
/// the weights are folded back to raw scale.
///
/// Returns `(intercept, coefficients)`.
pub fn fit_quantile(data: &Dataset, quantile: f64) -> (f64, Vec<f64>) {
    let width = data.features.first().map_or(0, Vec::len);
    let n = data.features.len().max(1) as f64;
    let (means, stds) = column_moments(&data.features, width);

    let y_mean = data.targets.iter().sum::<f64>() / n;
    let y_var = data
        .targets
        .iter()
        .map(|y| (y - y_mean).powi(2))
        .sum::<f64>()
        / n;
    let y_std = if y_var > 0.0 { y_var.sqrt() } else { 1.0 };

    let scaled: Vec<Vec<f64>> = data
        .features
        .iter()
        .map(|row| {
            row.iter()
                .zip(means.iter().zip(&stds))
                .map(|(x, (m, s))| (x - m) / s)
                .collect()
        })
        .collect();
    let targets: Vec<f64> = data.targets.iter().map(|y| (y - y_mean) / y_std).collect();

    let mut weights = vec![0.0; width];
    let mut bias = 0.0;
    let mut grad = vec![0.0; width];

    for epoch in 0..QUANTILE_EPOCHS {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_bias = 0.0;

        for (row, y) in scaled.iter().zip(&targets) {
            let prediction = bias + dot(&weights, row);
            let residual = y - prediction;
            // d(pinball)/d(prediction)
            let slope = if residual > 0.0 {
                -quantile
            } else if residual < 0.0 {
                1.0 - quantile
            } else {
                0.0
            };
            for (g, x) in grad.iter_mut().zip(row) {
                *g += slope * x;
            }
            grad_bias += slope;
        }

        let step = QUANTILE_LEARNING_RATE / ((epoch + 1) as f64).sqrt();
        for (w, g) in weights.iter_mut().zip(&grad) {
            *w -= step * g / n;
        }
        bias -= step * grad_bias / n;
    }

    let coefficients: Vec<f64> = weights
        .iter()
        .zip(&stds)
        .map(|(w, s)| w * y_std / s)
        .collect();
    let shift: f64 = weights
        .iter()
        .zip(means.iter().zip(&stds))
        .map(|(w, (m, s))| w * m / s)
        .sum();
    let intercept = y_mean + y_std * (bias - shift);

    (intercept, coefficients)
}

/// Binary logistic regression by full-batch gradient descent on log loss.
///
/// Returns `(intercept, coefficients)`.
pub fn fit_logistic(data: &Dataset) -> (f64, Vec<f64>) {
    let width = data.features.first().map_or(0, Vec::len);
    let n = data.features.len().max(1) as f64;

    let mut weights = vec![0.0; width];
    let mut bias = 0.0;
    let mut grad = vec![0.0; width];

    for _ in 0..LOGISTIC_EPOCHS {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_bias = 0.0;

        for (row, y) in data.features.iter().zip(&data.targets) {
            let error = sigmoid(bias + dot(&weights, row)) - y;
            for (g, x) in grad.iter_mut().zip(row) {
                *g += error * x;
            }
            grad_bias += error;
        }

        for (w, g) in weights.iter_mut().zip(&grad) {
            *w -= LOGISTIC_LEARNING_RATE * g / n;
        }
        bias -= LOGISTIC_LEARNING_RATE * grad_bias / n;
    }

    (bias, weights)
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasets_are_seeded() {
        let a = slippage_dataset(10, 42);
        let b = slippage_dataset(10, 42);
        assert_eq!(a.features, b.features);
        assert_eq!(a.targets, b.targets);

        let c = slippage_dataset(10, 43);
        assert_ne!(a.targets, c.targets);
    }

    #[test]
    fn test_slippage_dataset_shape() {
        let data = slippage_dataset(10, 7);
        assert_eq!(data.features.len(), SYNTHETIC_SAMPLES);
        assert!(data.features.iter().all(|row| row.len() == 21));
        assert!(data.targets.iter().all(|y| *y >= 0.0));
    }

    #[test]
    fn test_fit_quantile_recovers_line() {
        // y = 2 + 3x with symmetric noise: median fit lands near the line
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for _ in 0..400 {
            let x: f64 = rng.gen_range(0.0..10.0);
            let noise: f64 = rng.gen_range(-0.5..0.5);
            features.push(vec![x]);
            targets.push(2.0 + 3.0 * x + noise);
        }
        let (intercept, coefficients) = fit_quantile(&Dataset { features, targets }, 0.5);

        assert!((coefficients[0] - 3.0).abs() < 0.2, "slope {}", coefficients[0]);
        assert!((intercept - 2.0).abs() < 0.6, "intercept {intercept}");
    }

    #[test]
    fn test_fit_quantile_deterministic() {
        let data = slippage_dataset(3, 42);
        assert_eq!(fit_quantile(&data, 0.5), fit_quantile(&data, 0.5));
    }

    #[test]
    fn test_fit_logistic_learns_direction() {
        let (intercept, coefficients) = fit_logistic(&maker_taker_dataset(42));
        assert!(intercept > 0.0);
        assert!(coefficients[0] < 0.0, "aggressiveness weight {}", coefficients[0]);
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(50.0) <= 1.0);
        assert!(sigmoid(-50.0) >= 0.0);
    }
}
