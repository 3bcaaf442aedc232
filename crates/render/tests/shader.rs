use std::fs;
use std::path::Path;

fn validate_shader(path: &Path) -> naga::Module {
    let src = fs::read_to_string(path).expect("read shader");
    let module = naga::front::wgsl::parse_str(&src).expect("wgsl parse");
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).expect("wgsl validate");
    module
}

#[test]
fn compile_line_shader() {
    let module = validate_shader(&Path::new(env!("CARGO_MANIFEST_DIR")).join("src/shader.wgsl"));
    let entry_points: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(entry_points, ["vs_main", "fs_main"]);
}

#[test]
fn vertex_layout_matches_shader_inputs() {
    // two vec3<f32> attributes, tightly packed
    assert_eq!(std::mem::size_of::<render::scene::Vertex>(), 24);
    assert_eq!(std::mem::size_of::<render::camera::CameraUniform>(), 64);
}
