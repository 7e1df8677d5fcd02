//! Fixed-Size Circular Buffer for Per-Vehicle History
//!
//! ## Overview
//!
//! Each tracked vehicle keeps a short history of recent readings: the mode
//! classifier looks at the last twenty, step analysis needs the previous
//! one. The history is a ring buffer whose size is fixed at compile time, so
//! per-vehicle memory is constant no matter how long a truck has been
//! reporting.
//!
//! ## Design Rationale
//!
//! - O(1) insertion (overwrites the oldest entry when full)
//! - O(1) access to the most recent entry
//! - O(n) iteration in chronological order
//! - No allocation after construction
//!
//! When full, old readings are discarded rather than rejected: recent data
//! is what every consumer wants.
//!
//! ```text
//! CircularBuffer<T, 5> after 7 pushes (A..G):
//!
//! Physical array:  [F, G, C, D, E]  (write_pos = 2)
//!                   0  1  2  3  4
//! Logical view:    [C, D, E, F, G]  (oldest → newest)
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use fuelguard_core::buffer::CircularBuffer;
//!
//! let mut speeds: CircularBuffer<f64, 3> = CircularBuffer::new();
//! for s in [10.0, 20.0, 30.0, 40.0] {
//!     speeds.push(s);
//! }
//!
//! assert_eq!(speeds.last(), Some(&40.0));
//! let recent: Vec<f64> = speeds.recent(2).copied().collect();
//! assert_eq!(recent, vec![30.0, 40.0]);
//! ```

/// Fixed-size circular buffer for time-ordered data
///
/// ## Internal Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - Logical index 0 is the oldest entry
#[derive(Debug, Clone)]
pub struct CircularBuffer<T: Copy, const N: usize> {
    /// Storage array; `None` marks slots never written
    data: [Option<T>; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid entries
    len: usize,
}

impl<T: Copy, const N: usize> CircularBuffer<T, N> {
    /// Creates a new empty circular buffer
    pub fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds an entry, overwriting the oldest when full
    pub fn push(&mut self, item: T) {
        self.data[self.write_pos] = Some(item);
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Maximum number of entries
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The most recent entry
    pub fn last(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }

        // Most recent is one before write position
        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };

        self.data[idx].as_ref()
    }

    /// Iterate over entries from oldest to newest
    pub fn iter(&self) -> CircularBufferIter<'_, T, N> {
        CircularBufferIter {
            buffer: self,
            index: 0,
        }
    }

    /// Iterate over the newest `count` entries, oldest first
    pub fn recent(&self, count: usize) -> CircularBufferIter<'_, T, N> {
        CircularBufferIter {
            buffer: self,
            index: self.len.saturating_sub(count),
        }
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.data = [None; N];
        self.write_pos = 0;
        self.len = 0;
    }

    /// Gets an entry by logical index (0 = oldest, len-1 = newest)
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < N {
            // Buffer not full yet, data starts at 0
            index
        } else {
            // Buffer is full, oldest data is at write_pos
            (self.write_pos + index) % N
        };

        self.data[actual_index].as_ref()
    }
}

/// Iterator over circular buffer contents
pub struct CircularBufferIter<'a, T: Copy, const N: usize> {
    buffer: &'a CircularBuffer<T, N>,
    index: usize,
}

impl<'a, T: Copy, const N: usize> Iterator for CircularBufferIter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.buffer.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, T: Copy, const N: usize> ExactSizeIterator for CircularBufferIter<'a, T, N> {}

impl<T: Copy, const N: usize> Default for CircularBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer: CircularBuffer<u64, 5> = CircularBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = CircularBuffer::<u64, 3>::new();

        for i in 0..5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        // Oldest entries 0 and 1 were overwritten
        let values: Vec<u64> = buffer.iter().copied().collect();
        assert_eq!(values, vec![2, 3, 4]);
        assert_eq!(buffer.last(), Some(&4));
    }

    #[test]
    fn recent_window_is_chronological() {
        let mut buffer = CircularBuffer::<u64, 4>::new();
        for i in 0..6 {
            buffer.push(i);
        }

        let recent: Vec<u64> = buffer.recent(2).copied().collect();
        assert_eq!(recent, vec![4, 5]);

        // Asking for more than stored yields everything
        assert_eq!(buffer.recent(10).len(), 4);
    }

    #[test]
    fn clear_resets_positions() {
        let mut buffer = CircularBuffer::<u64, 2>::new();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();

        assert!(buffer.is_empty());
        buffer.push(9);
        assert_eq!(buffer.get(0), Some(&9));
        assert_eq!(buffer.get(1), None);
    }
}
