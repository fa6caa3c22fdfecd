//! Fixed-capacity rolling windows used by the moving-window indicators.
//!
//! [`RollingWindow`] is a circular buffer that keeps running sums so mean and
//! variance cost O(1) per bar. [`RollingExtreme`] is a monotonic deque that
//! tracks the index of the window maximum (or minimum).

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    buf: Vec<f64>,
    head: usize,
    len: usize,
    sum: f64,
    sum_sq: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Push a value, returning the evicted one once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.is_full() {
            let old = self.buf[self.head];
            self.sum -= old;
            self.sum_sq -= old * old;
            Some(old)
        } else {
            self.len += 1;
            None
        };
        self.buf[self.head] = value;
        self.sum += value;
        self.sum_sq += value * value;
        self.head = (self.head + 1) % self.buf.len();
        evicted
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            None
        } else {
            Some(self.sum / self.len as f64)
        }
    }

    /// Sample variance (divides by n - 1). Clamped at zero against rounding drift.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.len < 2 {
            return None;
        }
        let n = self.len as f64;
        let mean = self.sum / n;
        Some(((self.sum_sq - mean * self.sum) / (n - 1.0)).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

/// Rolling arg-max / arg-min over the last `window` pushed values.
/// Ties resolve to the most recent index.
#[derive(Debug, Clone)]
pub struct RollingExtreme {
    window: usize,
    kind: Extreme,
    deque: VecDeque<(usize, f64)>,
}

impl RollingExtreme {
    pub fn new(window: usize, kind: Extreme) -> Self {
        Self {
            window: window.max(1),
            kind,
            deque: VecDeque::new(),
        }
    }

    pub fn push(&mut self, index: usize, value: f64) {
        while let Some(&(_, back)) = self.deque.back() {
            let dominated = match self.kind {
                Extreme::Max => back <= value,
                Extreme::Min => back >= value,
            };
            if dominated {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        self.deque.push_back((index, value));
        while let Some(&(front_idx, _)) = self.deque.front() {
            if front_idx + self.window <= index {
                self.deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// (index, value) of the current extreme.
    pub fn current(&self) -> Option<(usize, f64)> {
        self.deque.front().copied()
    }
}
