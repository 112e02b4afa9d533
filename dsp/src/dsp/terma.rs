//! TERMA (two event-related moving averages) detector
//!
//! An alternative to [`crate::srmac`]: a short "event" moving average minus a longer "cycle"
//! moving average, offset by a fraction of the trace mean. Both averages are centred on the
//! output sample and zero-padded past the ends of the trace.

use crate::error::{Error, Result};
use crate::fixed::{mul, Fixed};

/// Running sum over a centred window of `W` samples, backed by a ring of the raw values
struct CentredSum<const W: usize> {
    ring: [Fixed; W],
    pos: usize,
    sum: i64,
}

impl<const W: usize> CentredSum<W> {
    /// Window positioned on sample 0: `W / 2` zeros followed by the first samples of `data`
    fn new(data: &[Fixed]) -> Self {
        let half = W / 2;
        let mut ring = [0; W];
        let mut sum = 0i64;
        for (i, slot) in ring.iter_mut().enumerate().skip(half) {
            let v = data.get(i - half).copied().unwrap_or(0);
            *slot = v;
            sum += v as i64;
        }
        Self { ring, pos: 0, sum }
    }

    fn mean(&self) -> i64 {
        self.sum / W as i64
    }

    /// Slide forward one sample, taking in `incoming`
    fn advance(&mut self, incoming: Fixed) {
        self.sum += incoming as i64 - self.ring[self.pos] as i64;
        self.ring[self.pos] = incoming;
        self.pos = (self.pos + 1) % W;
    }
}

/// Replace `data` with `event_avg - (cycle_avg + b * mean)`, where the event window is `EVENT`
/// samples and the cycle window `CYCLE` samples
pub fn terma<const EVENT: usize, const CYCLE: usize>(data: &mut [Fixed], b: Fixed) -> Result<()> {
    if EVENT == 0 || CYCLE == 0 {
        return Err(Error::InvalidArgument("terma windows must be non-empty"));
    }
    if EVENT >= data.len() || CYCLE >= data.len() {
        return Err(Error::InvalidArgument("terma windows must be shorter than the data"));
    }

    let mean = data.iter().map(|&d| d as i64).sum::<i64>() / data.len() as i64;
    let offset = mul(b, mean as Fixed) as i64;

    let mut event = CentredSum::<EVENT>::new(data);
    let mut cycle = CentredSum::<CYCLE>::new(data);

    for i in 0..data.len() {
        let out = event.mean() - (cycle.mean() + offset);
        // incoming samples are always ahead of i, so still unmodified
        let next_event = data.get(i + EVENT - EVENT / 2).copied().unwrap_or(0);
        let next_cycle = data.get(i + CYCLE - CYCLE / 2).copied().unwrap_or(0);
        data[i] = out as Fixed;
        event.advance(next_event);
        cycle.advance(next_cycle);
    }
    Ok(())
}
