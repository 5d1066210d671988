use crate::models::chart::ChartDataPoint;

/// Goodness-of-fit statistics over assembled chart data.
///
/// The regression is log-log: `x = log10(days)`, `y = log10(price)`.
/// Degenerate inputs yield `None`, never `NaN`.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    /// R² of the log-log least-squares fit over observed, non-future points.
    pub fn r_squared(&self, points: &[ChartDataPoint]) -> Option<f64> {
        let samples: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| !p.is_future && p.days_since_genesis >= 1)
            .filter_map(|p| {
                let price = p.price?;
                (price.is_finite() && price > 0.0)
                    .then(|| ((p.days_since_genesis as f64).log10(), price.log10()))
            })
            .collect();
        self.r_squared_xy(&samples)
    }

    /// `1 - SSE/SST` of the ordinary least-squares line through `(x, y)`.
    pub fn r_squared_xy(&self, samples: &[(f64, f64)]) -> Option<f64> {
        if samples.len() < 2 {
            return None;
        }
        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut sst = 0.0;
        for (x, y) in samples {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            sst += dy * dy;
        }
        if sxx == 0.0 || sst == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let sse: f64 = samples
            .iter()
            .map(|(x, y)| {
                let residual = y - (intercept + slope * x);
                residual * residual
            })
            .sum();

        let r2 = 1.0 - sse / sst;
        r2.is_finite().then_some(r2)
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}
