//! Flat per-particle attribute buffers.
//!
//! A buffer stores `count * item_size` floats. Particle `i` owns the
//! components at `i * item_size .. (i + 1) * item_size`. The length is fixed
//! at construction; particles are recycled, never added or removed.
//!
//! Writers set `needs_update` after mutating so the renderer knows to
//! re-upload the data before the next draw.

use glam::Vec3;

/// Fixed-size numeric attribute array with a dirty flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBuffer {
    data: Vec<f32>,
    item_size: usize,
    /// Set after mutation; cleared by the renderer once uploaded.
    pub needs_update: bool,
}

impl AttributeBuffer {
    /// Zero-filled buffer for `count` items of `item_size` components.
    pub fn new(count: usize, item_size: usize) -> Self {
        assert!(item_size > 0, "item_size must be at least 1");
        Self {
            data: vec![0.0; count * item_size],
            item_size,
            needs_update: true,
        }
    }

    /// Wrap existing data. `data.len()` must be a multiple of `item_size`.
    pub fn from_vec(data: Vec<f32>, item_size: usize) -> Self {
        assert!(item_size > 0, "item_size must be at least 1");
        assert_eq!(data.len() % item_size, 0, "data length must be a multiple of item_size");
        Self {
            data,
            item_size,
            needs_update: true,
        }
    }

    /// Number of items (particles).
    #[inline]
    pub fn count(&self) -> usize {
        self.data.len() / self.item_size
    }

    /// Components per item.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the raw array. Does not touch `needs_update`.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Read a 3-component item.
    #[inline]
    pub fn vec3(&self, i: usize) -> Vec3 {
        debug_assert_eq!(self.item_size, 3);
        let base = i * 3;
        Vec3::new(self.data[base], self.data[base + 1], self.data[base + 2])
    }

    /// Write a 3-component item.
    #[inline]
    pub fn set_vec3(&mut self, i: usize, v: Vec3) {
        debug_assert_eq!(self.item_size, 3);
        let base = i * 3;
        self.data[base] = v.x;
        self.data[base + 1] = v.y;
        self.data[base + 2] = v.z;
    }

    /// Single component `axis` of item `i`.
    #[inline]
    pub fn get(&self, i: usize, axis: usize) -> f32 {
        self.data[i * self.item_size + axis]
    }

    #[inline]
    pub fn set(&mut self, i: usize, axis: usize, value: f32) {
        self.data[i * self.item_size + axis] = value;
    }

    /// Flag the buffer for re-upload.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Clear and return the dirty flag.
    #[inline]
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.needs_update, false)
    }
}
