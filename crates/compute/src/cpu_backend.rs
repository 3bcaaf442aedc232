use crate::{validate_binds, BufferView, ComputeBackend, ComputeError, Kernel};

/// Runs the CPU reference implementation of every kernel.
#[derive(Default, Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[BufferView],
        _workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError> {
        validate_binds(kernel, binds)?;
        let outputs = (kernel.cpu)(binds)?;
        if outputs.len() != kernel.output_count() {
            return Err(ComputeError::ShapeMismatch(
                "kernel returned a different number of buffers than it has read-write bindings",
            ));
        }
        Ok(outputs)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}
