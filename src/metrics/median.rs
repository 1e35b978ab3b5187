//! Streaming median estimation (P² algorithm, Jain & Chlamtac 1985).
//!
//! Constant memory regardless of sample count. The first five samples are kept
//! verbatim, so small scans get an exact median.

const P: f64 = 0.5;
const MARKERS: usize = 5;

#[derive(Debug, Clone)]
pub struct StreamingMedian {
    count: usize,
    /// Marker heights
    q: [f64; MARKERS],
    /// Actual marker positions (1-based)
    n: [f64; MARKERS],
    /// Desired marker positions
    desired: [f64; MARKERS],
    increments: [f64; MARKERS],
}

impl Default for StreamingMedian {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingMedian {
    pub fn new() -> Self {
        StreamingMedian {
            count: 0,
            q: [0.0; MARKERS],
            n: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [1.0, 1.0 + 2.0 * P, 1.0 + 4.0 * P, 3.0 + 2.0 * P, 5.0],
            increments: [0.0, P / 2.0, P, (1.0 + P) / 2.0, 1.0],
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn push(&mut self, x: f64) {
        if self.count < MARKERS {
            self.q[self.count] = x;
            self.count += 1;
            if self.count == MARKERS {
                self.q.sort_by(f64::total_cmp);
            }
            return;
        }
        self.count += 1;

        let k = if x < self.q[0] {
            self.q[0] = x;
            0
        } else if x < self.q[1] {
            0
        } else if x < self.q[2] {
            1
        } else if x < self.q[3] {
            2
        } else if x <= self.q[4] {
            3
        } else {
            self.q[4] = x;
            3
        };

        for pos in &mut self.n[k + 1..] {
            *pos += 1.0;
        }
        for (d, inc) in self.desired.iter_mut().zip(self.increments) {
            *d += inc;
        }

        for i in 1..MARKERS - 1 {
            let drift = self.desired[i] - self.n[i];
            let room_up = self.n[i + 1] - self.n[i] > 1.0;
            let room_down = self.n[i - 1] - self.n[i] < -1.0;
            if (drift >= 1.0 && room_up) || (drift <= -1.0 && room_down) {
                let step = drift.signum();
                let candidate = self.parabolic(i, step);
                self.q[i] = if self.q[i - 1] < candidate && candidate < self.q[i + 1] {
                    candidate
                } else {
                    self.linear(i, step)
                };
                self.n[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let (q, n) = (&self.q, &self.n);
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.q[i] + d * (self.q[j] - self.q[i]) / (self.n[j] - self.n[i])
    }

    /// Current median estimate, or `None` before the first sample.
    pub fn estimate(&self) -> Option<f64> {
        match self.count {
            0 => None,
            c if c < MARKERS => {
                let mut seen = self.q[..c].to_vec();
                seen.sort_by(f64::total_cmp);
                let mid = c / 2;
                Some(if c % 2 == 0 {
                    (seen[mid - 1] + seen[mid]) / 2.0
                } else {
                    seen[mid]
                })
            }
            // q is sorted once full, the middle marker tracks the median
            _ => Some(self.q[2]),
        }
    }
}
