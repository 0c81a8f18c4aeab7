use crate::models::error::CaptureError;

/// Byte-granular circular buffer bridging the driver callback thread and
/// the consumer thread.
///
/// The buffer itself is not thread safe. The owning handle wraps it in
/// `Arc<parking_lot::Mutex<_>>` and keeps the critical section down to the
/// memcpy: no allocation happens here after construction.
///
/// Overflow behavior: when an incoming span collides with a full (or nearly
/// full) buffer, only the tail of the new data that fits is queued and
/// `overflow_count` goes up by one. Already-buffered bytes are never
/// displaced, and the excess is simply not queued.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<u8>,
    read_count: u64,
    write_count: u64,
    overflow_count: u64,
}

impl RingBuffer {
    /// Create a buffer with a fixed capacity in bytes.
    pub fn new(capacity: usize) -> Result<Self, CaptureError> {
        if capacity == 0 {
            return Err(CaptureError::InvalidBufferCapacity);
        }
        Ok(Self {
            buffer: vec![0; capacity],
            read_count: 0,
            write_count: 0,
            overflow_count: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes currently queued.
    pub fn fill_count(&self) -> usize {
        (self.write_count - self.read_count) as usize
    }

    /// Number of bytes that can be written without colliding.
    pub fn free_count(&self) -> usize {
        self.capacity() - self.fill_count()
    }

    /// Number of write collisions since the last `clear`.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    fn read_offset(&self) -> usize {
        (self.read_count % self.capacity() as u64) as usize
    }

    fn write_offset(&self) -> usize {
        (self.write_count % self.capacity() as u64) as usize
    }

    /// Reset both cursors and the overflow counter, discarding all queued
    /// bytes.
    pub fn clear(&mut self) {
        self.read_count = 0;
        self.write_count = 0;
        self.overflow_count = 0;
    }

    /// Append `data`, keeping only its tail when it exceeds the free space.
    ///
    /// Any collision counts as exactly one overflow, whether the buffer was
    /// completely full or the span was merely truncated.
    pub fn write(&mut self, data: &[u8]) {
        let free = self.free_count();
        if free == 0 {
            self.overflow_count += 1;
            return;
        }

        let data = if data.len() > free {
            self.overflow_count += 1;
            &data[data.len() - free..]
        } else {
            data
        };

        let wp = self.write_offset();
        let first = data.len().min(self.capacity() - wp);
        self.buffer[wp..wp + first].copy_from_slice(&data[..first]);
        self.buffer[..data.len() - first].copy_from_slice(&data[first..]);

        self.write_count += data.len() as u64;
    }

    /// Append `length` zero bytes, with the same capacity rules as `write`.
    ///
    /// Used when the driver callback signals a period with no data pointer.
    pub fn write_empty(&mut self, length: usize) {
        let free = self.free_count();
        if free == 0 {
            self.overflow_count += 1;
            return;
        }

        let length = if length > free {
            self.overflow_count += 1;
            free
        } else {
            length
        };

        let wp = self.write_offset();
        let first = length.min(self.capacity() - wp);
        self.buffer[wp..wp + first].fill(0);
        self.buffer[..length - first].fill(0);

        self.write_count += length as u64;
    }

    /// Copy the oldest `dest.len()` bytes into `dest` and advance the read
    /// cursor.
    ///
    /// Precondition: `dest.len() <= fill_count()`. Violating it is a
    /// programmer error, not a recoverable condition.
    pub fn read(&mut self, dest: &mut [u8]) {
        debug_assert!(dest.len() <= self.fill_count());

        let rp = self.read_offset();
        let first = dest.len().min(self.capacity() - rp);
        dest[..first].copy_from_slice(&self.buffer[rp..rp + first]);
        let rest = dest.len() - first;
        dest[first..].copy_from_slice(&self.buffer[..rest]);

        self.read_count += dest.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            RingBuffer::new(0),
            Err(CaptureError::InvalidBufferCapacity)
        ));
    }

    #[test]
    fn fifo_order_preserved() {
        let mut ring = RingBuffer::new(16).unwrap();
        ring.write(&[1, 2, 3]);
        ring.write(&[4, 5]);

        let mut out = [0u8; 5];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 5]);
        assert_eq!(ring.fill_count(), 0);
        assert_eq!(ring.overflow_count(), 0);
    }

    #[test]
    fn wraparound_read_write() {
        let mut ring = RingBuffer::new(4).unwrap();
        ring.write(&[1, 2, 3]);
        let mut out = [0u8; 2];
        ring.read(&mut out); // cursor at 2

        ring.write(&[4, 5, 6]); // wraps
        assert_eq!(ring.fill_count(), 4);

        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn overflow_on_full_buffer_drops_new_data() {
        let mut ring = RingBuffer::new(8).unwrap();
        let a: Vec<u8> = (0..8).collect();
        ring.write(&a);
        assert_eq!(ring.free_count(), 0);

        ring.write(&[100, 101, 102, 103]);
        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.fill_count(), 8);

        let mut out = [0u8; 8];
        ring.read(&mut out);
        assert_eq!(out.to_vec(), a);
    }

    #[test]
    fn overflow_keeps_tail_of_oversized_write() {
        let mut ring = RingBuffer::new(4).unwrap();
        ring.write(&[1, 2]);
        ring.write(&[3, 4, 5, 6]); // only the 2 tail bytes fit

        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.fill_count(), 4);

        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 5, 6]);
    }

    #[test]
    fn write_empty_zero_fills() {
        let mut ring = RingBuffer::new(8).unwrap();
        ring.write(&[9, 9]);
        ring.write_empty(3);
        assert_eq!(ring.fill_count(), 5);

        let mut out = [0u8; 5];
        ring.read(&mut out);
        assert_eq!(out, [9, 9, 0, 0, 0]);
    }

    #[test]
    fn write_empty_obeys_capacity() {
        let mut ring = RingBuffer::new(4).unwrap();
        ring.write_empty(6);
        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.fill_count(), 4);

        ring.write_empty(1);
        assert_eq!(ring.overflow_count(), 2);
    }

    #[test]
    fn clear_resets_counters() {
        let mut ring = RingBuffer::new(4).unwrap();
        ring.write(&[1, 2, 3, 4]);
        ring.write(&[5]);
        assert_eq!(ring.overflow_count(), 1);

        ring.clear();
        assert_eq!(ring.fill_count(), 0);
        assert_eq!(ring.free_count(), 4);
        assert_eq!(ring.overflow_count(), 0);
    }
}
