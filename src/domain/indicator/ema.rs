//! Exponential moving average over an arbitrary input.
//!
//! k = 2/(n+1), seed with the first SMA, then EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are undefined.

/// EMA over `input`, `None` during warm-up.
pub(crate) fn ema_values(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &x) in input.iter().enumerate() {
        if i < period - 1 {
            sum += x;
        } else if i == period - 1 {
            sum += x;
            ema = sum / period as f64;
            out[i] = Some(ema);
        } else {
            ema = x * k + ema * (1.0 - k);
            out[i] = Some(ema);
        }
    }
    out
}
