//! # Tensor Storage
//!
//! Defines the underlying memory storage for Tensors.
//! Currently, this uses `ndarray::ArrayD` for CPU storage.

use ndarray::ArrayD;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::TensorData;

/// Represents the CPU memory backing a Tensor.
///
/// The array sits behind `Arc<RwLock<...>>` so that detached views and
/// clones of a tensor share one buffer, while leaf parameters can still be
/// overwritten in place by an outer-loop optimizer.
#[derive(Debug, Clone)]
pub struct CpuStorage {
    pub(crate) data: Arc<RwLock<ArrayD<TensorData>>>,
}

impl CpuStorage {
    /// Creates a new `CpuStorage` instance from an existing `ndarray::ArrayD`.
    pub fn new(array_data: ArrayD<TensorData>) -> Self {
        CpuStorage {
            data: Arc::new(RwLock::new(array_data)),
        }
    }

    /// Provides read access to the underlying `ndarray`.
    /// Locks the `RwLock` for reading. Panics if the lock is poisoned.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read().expect("CPU Storage RwLock poisoned (read)")
    }

    /// Provides write access to the underlying `ndarray`.
    /// Locks the `RwLock` for writing. Panics if the lock is poisoned.
    pub fn write_lock(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.data.write().expect("CPU Storage RwLock poisoned (write)")
    }

    /// Returns the shape of the stored data.
    pub fn shape(&self) -> Vec<usize> {
        self.read_lock().shape().to_vec()
    }

    /// True when both handles point at the same buffer.
    pub fn ptr_eq(&self, other: &CpuStorage) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}
