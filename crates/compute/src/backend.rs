use crate::{BufferView, ComputeError, Kernel};

pub trait ComputeBackend: Send + Sync + 'static {
    /// Dispatches a kernel with the given bindings and workgroup configuration.
    ///
    /// # Arguments
    /// * `kernel`: The kernel to dispatch.
    /// * `binds`: One `BufferView` per entry of `kernel.bindings`, in binding
    ///            order. Read-write bindings carry the initial contents.
    /// * `workgroups`: The number of workgroups to dispatch.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Vec<Vec<u8>>)` holding the contents of every read-write
    /// binding after the dispatch, in binding order. The input views are never
    /// modified.
    /// Returns `ComputeError::ShapeMismatch` if any input buffers are invalid.
    /// May return other `ComputeError` variants depending on the backend implementation.
    fn dispatch(
        &self,
        kernel: &Kernel,
        binds: &[BufferView],
        workgroups: [u32; 3],
    ) -> Result<Vec<Vec<u8>>, ComputeError>;

    /// Short human readable backend name, used in logs.
    fn name(&self) -> &'static str;
}
