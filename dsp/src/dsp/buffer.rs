use crate::error::{Error, Result};
use crate::fixed::Fixed;

/// Fixed length analysis window, oldest sample first
///
/// New samples are written into the last `increment` slots. Once those are full the caller
/// analyses the whole window and calls [`SlidingBuffer::shift`], which moves everything left by
/// one increment to make room for the next batch.
#[derive(Clone, Debug)]
pub struct SlidingBuffer<const WINDOW: usize> {
    data: [Fixed; WINDOW],
    increment: usize,
}

impl<const WINDOW: usize> SlidingBuffer<WINDOW> {
    pub fn new(increment: usize) -> Result<Self> {
        if increment == 0 || increment > WINDOW {
            return Err(Error::InvalidArgument("increment must be within 1..=window"));
        }
        Ok(Self { data: [0; WINDOW], increment })
    }

    pub fn increment(&self) -> usize {
        self.increment
    }

    /// Store `sample` at position `offset` of the newest increment
    pub fn write(&mut self, offset: usize, sample: Fixed) -> Result<()> {
        if offset >= self.increment {
            return Err(Error::InvalidArgument("write offset past the increment"));
        }
        self.data[WINDOW - self.increment + offset] = sample;
        Ok(())
    }

    pub fn as_slice(&self) -> &[Fixed] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Fixed] {
        &mut self.data
    }

    /// The newest increment
    pub fn tail_mut(&mut self) -> &mut [Fixed] {
        let start = WINDOW - self.increment;
        &mut self.data[start..]
    }

    /// Drop the oldest increment. The freed tail keeps its old contents until overwritten.
    pub fn shift(&mut self) {
        self.data.copy_within(self.increment.., 0);
    }

    pub fn clear(&mut self) {
        self.data = [0; WINDOW];
    }
}
