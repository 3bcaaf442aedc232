// Golden master tests: the wgpu backend must agree with the CPU reference
// implementation of the same kernel. Skipped when no adapter is present.

#[cfg(feature = "gpu")]
mod wgpu_tests {
    use compute::{
        read_f32s, workgroup_count, Access, BufferView, ComputeBackend, ComputeError, CpuBackend,
        GpuBackend, Kernel, WORKGROUP_SIZE,
    };

    fn axpy_cpu(binds: &[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError> {
        let a = read_f32s(&binds[0].data)[0];
        let x = read_f32s(&binds[1].data);
        let y: Vec<f32> = read_f32s(&binds[2].data)
            .iter()
            .zip(&x)
            .map(|(y, x)| a * x + y)
            .collect();
        Ok(vec![bytemuck::cast_slice(&y).to_vec()])
    }

    static AXPY: Kernel = Kernel {
        name: "axpy",
        wgsl: r"
@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> x: array<f32>;
@group(0) @binding(2) var<storage, read_write> y: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= arrayLength(&y)) {
        return;
    }
    y[i] = a[0] * x[i] + y[i];
}
",
        entry_point: "main",
        bindings: &[Access::ReadOnly, Access::ReadOnly, Access::ReadWrite],
        cpu: axpy_cpu,
    };

    #[test]
    fn axpy_matches_cpu_reference() {
        let Ok(gpu) = GpuBackend::try_new() else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        let cpu = CpuBackend::new();

        let x: Vec<f32> = (0..300).map(|i| i as f32 * 0.5).collect();
        let y: Vec<f32> = (0..300).map(|i| 1.0 - i as f32).collect();
        let binds = [
            BufferView::from_f32(&[3.0]),
            BufferView::from_f32(&x),
            BufferView::from_f32(&y),
        ];
        let groups = [workgroup_count(x.len(), WORKGROUP_SIZE), 1, 1];

        let expected = cpu.dispatch(&AXPY, &binds, groups).unwrap();
        // second dispatch reuses the cached pipeline
        for _ in 0..2 {
            let actual = gpu.dispatch(&AXPY, &binds, groups).unwrap();
            assert_eq!(actual.len(), 1);
            assert_eq!(read_f32s(&expected[0]), read_f32s(&actual[0]));
        }
    }
}
