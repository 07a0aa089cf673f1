// PCM ring buffer between the decoder thread and the renderer

use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed-capacity ring of interleaved f32 samples
pub struct PcmRingBuffer {
    buffer: Vec<f32>,
    read_pos: usize,
    len: usize,
}

impl PcmRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            read_pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Samples waiting to be read
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Append as much of `data` as fits; returns the number of samples written
    pub fn write(&mut self, data: &[f32]) -> usize {
        let to_write = data.len().min(self.free());
        if to_write == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let write_pos = (self.read_pos + self.len) % capacity;
        let first = to_write.min(capacity - write_pos);

        self.buffer[write_pos..write_pos + first].copy_from_slice(&data[..first]);
        if first < to_write {
            self.buffer[..to_write - first].copy_from_slice(&data[first..to_write]);
        }

        self.len += to_write;
        to_write
    }

    /// Fill the front of `output`; returns the number of samples read
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let to_read = output.len().min(self.len);
        if to_read == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first = to_read.min(capacity - self.read_pos);

        output[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        if first < to_read {
            output[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);
        }

        self.read_pos = (self.read_pos + to_read) % capacity;
        self.len -= to_read;
        to_read
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    /// Resize, dropping buffered samples
    pub fn resize(&mut self, capacity: usize) {
        self.buffer = vec![0.0; capacity.max(1)];
        self.clear();
    }

    /// Fill level in `0.0..=1.0`
    pub fn fullness(&self) -> f32 {
        self.len as f32 / self.capacity() as f32
    }
}

/// Shared handle used by both the decoder thread and the render callback
#[derive(Clone)]
pub struct SharedRingBuffer {
    inner: Arc<Mutex<PcmRingBuffer>>,
}

impl SharedRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PcmRingBuffer::new(capacity))),
        }
    }

    pub fn write(&self, data: &[f32]) -> usize {
        self.inner.lock().write(data)
    }

    pub fn read(&self, output: &mut [f32]) -> usize {
        self.inner.lock().read(output)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    pub fn resize(&self, capacity: usize) {
        self.inner.lock().resize(capacity)
    }

    pub fn fullness(&self) -> f32 {
        self.inner.lock().fullness()
    }
}
