#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Compute backends
//!
//! A thin abstraction over the devices that run batched simulation kernels.
//!
//! A [`Kernel`] is a static description of one device program: its WGSL
//! source, the access mode of every binding, and a CPU reference
//! implementation with identical semantics. The crate that owns the math
//! defines its kernels; this crate only knows how to run them.
//!
//! -   [`CpuBackend`] runs the CPU reference implementation. It is always
//!     available and is what tests and headless machines use.
//! -   `GpuBackend` (feature `gpu`) compiles the WGSL once per kernel, caches
//!     the pipeline and dispatches on the default `wgpu` adapter.
//!
//! Buffers cross the boundary as [`BufferView`]s: reference-counted byte
//! slices tagged with a logical shape. Every backend checks that the byte
//! length matches the shape before it runs anything.

use std::sync::Arc;
use thiserror::Error;

pub mod backend;
pub mod cpu_backend;
pub mod layout;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use backend::ComputeBackend;
pub use cpu_backend::CpuBackend;
pub use layout::{read_f32s, workgroup_count, WORKGROUP_SIZE};

#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(&'static str),
    #[error("backend not available")]
    BackendUnavailable,
    #[error("device error: {0}")]
    Device(String),
}

/// How a kernel binding is accessed by the device program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// `var<storage, read>`; never read back.
    ReadOnly,
    /// `var<storage, read_write>`; read back after the dispatch.
    ReadWrite,
}

/// CPU reference implementation of a kernel.
///
/// Receives the same binds the device would and returns the contents of every
/// [`Access::ReadWrite`] binding after the kernel ran, in binding order.
pub type CpuKernelFn = fn(&[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError>;

/// Static description of a device program.
#[derive(Debug)]
pub struct Kernel {
    /// Unique name, also used as the pipeline cache key.
    pub name: &'static str,
    pub wgsl: &'static str,
    pub entry_point: &'static str,
    /// Access mode per binding, indexed by `@binding(n)` in group 0.
    pub bindings: &'static [Access],
    pub cpu: CpuKernelFn,
}

impl Kernel {
    #[must_use]
    pub const fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of bindings whose contents are returned by a dispatch.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.bindings
            .iter()
            .filter(|access| **access == Access::ReadWrite)
            .count()
    }
}

#[derive(Clone, Debug)]
pub struct BufferView {
    pub data: Arc<[u8]>,
    pub shape: Vec<usize>, // Number of elements per dimension
    pub element_size_in_bytes: usize, // Size of a single element described by the innermost dimension of shape
}

impl BufferView {
    #[must_use]
    pub fn new(data: Arc<[u8]>, shape: Vec<usize>, element_size_in_bytes: usize) -> Self {
        Self { data, shape, element_size_in_bytes }
    }

    /// Wraps a slice of `f32` as a one dimensional view.
    #[must_use]
    pub fn from_f32(values: &[f32]) -> Self {
        Self::new(
            bytemuck::cast_slice(values).to_vec().into(),
            vec![values.len()],
            std::mem::size_of::<f32>(),
        )
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Checks that the byte length agrees with `shape` and the element size.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::ShapeMismatch`] when they disagree.
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.data.len() == self.element_count() * self.element_size_in_bytes {
            Ok(())
        } else {
            Err(ComputeError::ShapeMismatch(
                "Buffer data length does not match product of shape dimensions and element size",
            ))
        }
    }
}

/// Checks the bind list against the kernel before any backend runs it.
///
/// # Errors
///
/// Returns [`ComputeError::ShapeMismatch`] when the number of binds differs
/// from the kernel's binding count or any bind fails [`BufferView::validate`].
pub fn validate_binds(kernel: &Kernel, binds: &[BufferView]) -> Result<(), ComputeError> {
    if binds.len() != kernel.binding_count() {
        return Err(ComputeError::ShapeMismatch(
            "number of binds does not match the kernel's binding count",
        ));
    }
    binds.iter().try_for_each(BufferView::validate)
}

/// Returns the preferred backend for this build and machine.
///
/// With the `gpu` feature a `wgpu` adapter is tried first; the CPU reference
/// backend is the fallback.
#[must_use]
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "gpu")]
    {
        match GpuBackend::try_new() {
            Ok(gpu) => {
                tracing::info!("using wgpu compute backend");
                return Arc::new(gpu);
            }
            Err(e) => tracing::warn!("wgpu backend unavailable ({e}), falling back to CPU"),
        }
    }
    tracing::info!("using CPU compute backend");
    Arc::new(CpuBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_cpu(binds: &[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError> {
        let values: Vec<f32> = layout::read_f32s(&binds[0].data)
            .iter()
            .map(|v| v * 2.0)
            .collect();
        Ok(vec![bytemuck::cast_slice(&values).to_vec()])
    }

    static DOUBLE: Kernel = Kernel {
        name: "double",
        wgsl: "",
        entry_point: "main",
        bindings: &[Access::ReadWrite, Access::ReadOnly],
        cpu: double_cpu,
    };

    #[test]
    fn mismatch_shape_fails() {
        let bad_buf = BufferView::new(vec![0u8; 12].into(), vec![4], 4);
        assert!(matches!(bad_buf.validate(), Err(ComputeError::ShapeMismatch(_))));
    }

    #[test]
    fn shape_product_is_zero() {
        let empty = BufferView::new(vec![0u8; 0].into(), vec![0, 4], 1);
        assert!(empty.validate().is_ok());

        let nonempty = BufferView::new(vec![0u8; 1].into(), vec![0, 4], 1);
        assert!(matches!(nonempty.validate(), Err(ComputeError::ShapeMismatch(_))));
    }

    #[test]
    fn bind_count_is_checked() {
        let buf = BufferView::from_f32(&[1.0, 2.0]);
        let result = validate_binds(&DOUBLE, &[buf]);
        assert!(matches!(result, Err(ComputeError::ShapeMismatch(_))));
    }

    #[test]
    fn output_count_counts_read_write_bindings() {
        assert_eq!(DOUBLE.binding_count(), 2);
        assert_eq!(DOUBLE.output_count(), 1);
    }

    #[test]
    fn from_f32_round_trips() {
        let view = BufferView::from_f32(&[1.5, -2.0, 3.25]);
        assert_eq!(view.shape, vec![3]);
        assert_eq!(view.element_size_in_bytes, 4);
        assert_eq!(layout::read_f32s(&view.data), vec![1.5, -2.0, 3.25]);
    }
}
