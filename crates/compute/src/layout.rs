/// Threads per workgroup for one dimensional kernels. Shaders declare the
/// same value in `@workgroup_size`.
pub const WORKGROUP_SIZE: u32 = 64;

/// Number of workgroups needed to cover `elements` threads, at least one.
#[must_use]
pub fn workgroup_count(elements: usize, workgroup_size: u32) -> u32 {
    let elements = u32::try_from(elements).unwrap_or(u32::MAX);
    elements.div_ceil(workgroup_size).max(1)
}

/// Reads native-endian `f32`s from a byte buffer of any alignment.
#[must_use]
pub fn read_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(std::mem::size_of::<f32>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}
