use serde::{Deserialize, Serialize};

/// Ordinary least-squares line through `(i, y[i])`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. NaN when the series has no variance.
    pub r2: f64,
}

/// Fit `y` against its index (elapsed seconds for a per-second series).
///
/// A constant series has no variance, so its R² is NaN. Constancy is checked
/// on the values themselves since a rounded mean leaves a tiny nonzero SST.
/// Fewer than two points are treated the same way.
pub fn fit_line(y: &[f64]) -> LinearFit {
    let n = y.len();
    if n < 2 || y.iter().all(|&v| v == y[0]) {
        return LinearFit {
            slope: 0.0,
            intercept: y.first().copied().unwrap_or(0.0),
            r2: f64::NAN,
        };
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = y.iter().sum::<f64>() / n_f;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut sst = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        sst += dy * dy;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let sse: f64 = y
        .iter()
        .enumerate()
        .map(|(i, &yi)| {
            let residual = yi - (slope * i as f64 + intercept);
            residual * residual
        })
        .sum();
    let r2 = if sst == 0.0 { f64::NAN } else { 1.0 - sse / sst };
    LinearFit {
        slope,
        intercept,
        r2,
    }
}
