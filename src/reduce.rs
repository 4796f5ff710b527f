//! Dimensionality reduction for visualisation.
//!
//! Targets of 2 or 3 dimensions use t-SNE. Corpora larger than 50 items are
//! first projected to 50 dimensions with PCA. Other targets use PCA alone.
//! Both stages are seeded, so the same input always gives the same output.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RagError, Result};

const SEED: u64 = 42;
const TWO_STAGE_THRESHOLD: usize = 50;
const PCA_STAGE_DIMS: usize = 50;
const MAX_PERPLEXITY_TWO_STAGE: f64 = 30.0;
const MAX_PERPLEXITY_DIRECT: f64 = 5.0;

const POWER_ITERATIONS: usize = 300;
const EIGEN_EPS: f64 = 1e-10;

const TSNE_ITERATIONS: usize = 500;
const EXAGGERATION_ITERATIONS: usize = 250;
const EARLY_EXAGGERATION: f64 = 12.0;
const MIN_GAIN: f64 = 0.01;
const PERPLEXITY_STEPS: usize = 100;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;

/// Project `vectors` (one row per item) to `target_dims` columns.
///
/// A single item maps to the origin; an empty corpus maps to nothing.
pub fn reduce(vectors: &[Vec<f32>], target_dims: usize) -> Result<Vec<Vec<f32>>> {
    if target_dims == 0 {
        return Err(RagError::invalid("target dimensions must be at least 1"));
    }
    let n = vectors.len();
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let d = first.len();
    if vectors.iter().any(|v| v.len() != d) {
        return Err(RagError::invalid("all vectors must have the same dimensionality"));
    }
    if n == 1 || d == 0 {
        return Ok(vec![vec![0.0; target_dims]; n]);
    }

    let x = Array2::from_shape_fn((n, d), |(i, j)| vectors[i][j] as f64);
    let reduced = if matches!(target_dims, 2 | 3) {
        let max_perplexity = (n - 1) as f64;
        if n > TWO_STAGE_THRESHOLD {
            let stage = pca(&x, PCA_STAGE_DIMS.min(d));
            tsne(&stage, target_dims, MAX_PERPLEXITY_TWO_STAGE.min(max_perplexity))
        } else {
            tsne(&x, target_dims, MAX_PERPLEXITY_DIRECT.min(max_perplexity))
        }
    } else {
        pca(&x, target_dims)
    };

    tracing::debug!(items = n, from = d, to = target_dims, "embeddings reduced");
    Ok(reduced
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| *v as f32).collect())
        .collect())
}

// ── PCA ───────────────────────────────────────────────────────────────────────

/// Principal component scores, `n x k`. Columns past the data's rank are zero.
/// Each column's largest-magnitude entry is positive.
fn pca(x: &Array2<f64>, k: usize) -> Array2<f64> {
    let (n, d) = x.dim();
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    let centered = x - &mean;
    let components = k.min(n).min(d);
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut scores = Array2::<f64>::zeros((n, k));

    if d <= n {
        let covariance = centered.t().dot(&centered);
        for (c, (_, v)) in top_eigenpairs(&covariance, components, &mut rng)
            .into_iter()
            .enumerate()
        {
            scores.column_mut(c).assign(&centered.dot(&v));
        }
    } else {
        // fewer items than dimensions: decompose the Gram matrix instead
        let gram = centered.dot(&centered.t());
        for (c, (lambda, u)) in top_eigenpairs(&gram, components, &mut rng)
            .into_iter()
            .enumerate()
        {
            scores.column_mut(c).assign(&(u * lambda.sqrt()));
        }
    }

    for mut column in scores.columns_mut() {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }
    scores
}

/// Leading eigenpairs of a symmetric positive semi-definite matrix by power
/// iteration with deflation. Stops early once the remaining spectrum is zero.
fn top_eigenpairs(m: &Array2<f64>, k: usize, rng: &mut StdRng) -> Vec<(f64, Array1<f64>)> {
    let size = m.nrows();
    let mut m = m.clone();
    let mut pairs = Vec::with_capacity(k);

    for _ in 0..k {
        let mut v: Array1<f64> = (0..size).map(|_| rng.random::<f64>() - 0.5).collect();
        let norm = v.dot(&v).sqrt();
        if norm < EIGEN_EPS {
            break;
        }
        v /= norm;

        let mut lambda = 0.0;
        for _ in 0..POWER_ITERATIONS {
            let w = m.dot(&v);
            let norm = w.dot(&w).sqrt();
            if norm < EIGEN_EPS {
                lambda = 0.0;
                break;
            }
            let next = w / norm;
            let delta: f64 = (&next - &v).mapv(f64::abs).sum();
            v = next;
            lambda = norm;
            if delta < EIGEN_EPS {
                break;
            }
        }
        if lambda < EIGEN_EPS {
            break;
        }

        let col = v.view().insert_axis(Axis(1));
        let row = v.view().insert_axis(Axis(0));
        m = m - col.dot(&row) * lambda;
        pairs.push((lambda, v));
    }
    pairs
}

// ── t-SNE ─────────────────────────────────────────────────────────────────────

/// Exact t-SNE with early exaggeration, momentum and adaptive gains.
fn tsne(x: &Array2<f64>, dims: usize, perplexity: f64) -> Array2<f64> {
    let n = x.nrows();
    let p = joint_probabilities(&squared_distances(x), perplexity);

    let mut rng = StdRng::seed_from_u64(SEED);
    let mut y = Array2::from_shape_fn((n, dims), |_| gaussian(&mut rng) * 1e-2);
    let mut update = Array2::<f64>::zeros((n, dims));
    let mut gains = Array2::<f64>::ones((n, dims));
    let learning_rate = (n as f64 / EARLY_EXAGGERATION / 4.0).max(50.0);

    for iter in 0..TSNE_ITERATIONS {
        let (exaggeration, momentum) = if iter < EXAGGERATION_ITERATIONS {
            (EARLY_EXAGGERATION, 0.5)
        } else {
            (1.0, 0.8)
        };

        // Student-t affinities in the embedding
        let mut num = Array2::<f64>::zeros((n, n));
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dist: f64 = (0..dims).map(|k| (y[[i, k]] - y[[j, k]]).powi(2)).sum();
                let v = 1.0 / (1.0 + dist);
                num[[i, j]] = v;
                num[[j, i]] = v;
                total += 2.0 * v;
            }
        }
        let total = total.max(f64::MIN_POSITIVE);

        let mut grad = Array2::<f64>::zeros((n, dims));
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[[i, j]] / total).max(1e-12);
                let mult = (exaggeration * p[[i, j]] - q) * num[[i, j]];
                for k in 0..dims {
                    grad[[i, k]] += 4.0 * mult * (y[[i, k]] - y[[j, k]]);
                }
            }
        }

        for ((u, g), dy) in update.iter_mut().zip(gains.iter_mut()).zip(grad.iter()) {
            *g = if *u * dy < 0.0 {
                *g + 0.2
            } else {
                (*g * 0.8).max(MIN_GAIN)
            };
            *u = momentum * *u - learning_rate * *g * dy;
        }
        y += &update;

        if let Some(mean) = y.mean_axis(Axis(0)) {
            y -= &mean;
        }
    }
    y
}

fn squared_distances(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &x.row(i) - &x.row(j);
            let v = diff.dot(&diff);
            d[[i, j]] = v;
            d[[j, i]] = v;
        }
    }
    d
}

/// Symmetrised input affinities. Each row's Gaussian bandwidth is found by
/// binary search so its entropy matches `ln(perplexity)`.
fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let target = perplexity.max(1.0).ln();
    let mut p = Array2::<f64>::zeros((n, n));
    let mut row = vec![0.0f64; n];

    for i in 0..n {
        let nearest = (0..n)
            .filter(|&j| j != i)
            .map(|j| distances[[i, j]])
            .fold(f64::INFINITY, f64::min);
        let (mut beta, mut lo, mut hi) = (1.0f64, 0.0f64, f64::INFINITY);

        for _ in 0..PERPLEXITY_STEPS {
            let mut sum = 0.0;
            for j in 0..n {
                // shifted by the nearest distance so the largest term is 1
                row[j] = if j == i {
                    0.0
                } else {
                    (-(distances[[i, j]] - nearest) * beta).exp()
                };
                sum += row[j];
            }
            let entropy: f64 = row
                .iter()
                .map(|v| v / sum)
                .filter(|p| *p > 1e-12)
                .map(|p| -p * p.ln())
                .sum();

            let diff = entropy - target;
            if diff.abs() < PERPLEXITY_TOLERANCE {
                break;
            }
            if diff > 0.0 {
                lo = beta;
                beta = if hi.is_infinite() { beta * 2.0 } else { (beta + hi) / 2.0 };
            } else {
                hi = beta;
                beta = (beta + lo) / 2.0;
            }
        }

        let sum: f64 = row.iter().sum();
        for j in 0..n {
            p[[i, j]] = row[j] / sum;
        }
    }

    let joint = (&p + &p.t()) / (2.0 * n as f64);
    joint.mapv(|v| v.max(1e-12))
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
