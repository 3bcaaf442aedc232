//! Line geometry for one snapshot.
//!
//! Everything is drawn as a line list: a ground grid around the robot, three
//! great circles for the torso, the leg segments, a ring for every foot and a
//! vertical bar whose length shows the normal contact force.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use physics::Snapshot;
use std::f32::consts::TAU;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

const GRID: [f32; 3] = [0.3, 0.3, 0.35];
const TORSO: [f32; 3] = [0.9, 0.75, 0.3];
const LEG: [f32; 3] = [0.8, 0.8, 0.85];
const FOOT: [f32; 3] = [0.4, 0.7, 0.9];
const FORCE: [f32; 3] = [0.95, 0.3, 0.25];

/// Half-width of the ground grid in metres.
pub const GRID_EXTENT: i32 = 5;
/// Segments per circle.
pub const CIRCLE_SEGMENTS: usize = 24;
/// Metres of force bar per newton.
pub const FORCE_SCALE: f32 = 0.005;

fn to_glam(v: physics::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

/// Accumulates line segments.
#[derive(Debug, Default)]
pub struct LineBuilder {
    vertices: Vec<Vertex>,
}

impl LineBuilder {
    pub fn line(&mut self, a: Vec3, b: Vec3, color: [f32; 3]) {
        self.vertices.push(Vertex {
            position: a.to_array(),
            color,
        });
        self.vertices.push(Vertex {
            position: b.to_array(),
            color,
        });
    }

    /// Circle of `radius` around `center` in the plane spanned by `u` and `v`.
    #[allow(clippy::cast_precision_loss)]
    pub fn circle(&mut self, center: Vec3, u: Vec3, v: Vec3, radius: f32, color: [f32; 3]) {
        let point = |k: usize| {
            let (s, c) = (TAU * k as f32 / CIRCLE_SEGMENTS as f32).sin_cos();
            center + radius * (c * u + s * v)
        };
        for k in 0..CIRCLE_SEGMENTS {
            self.line(point(k), point(k + 1), color);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn grid(&mut self, around: Vec3) {
        let (cx, cy) = (around.x.round(), around.y.round());
        let extent = GRID_EXTENT as f32;
        for i in -GRID_EXTENT..=GRID_EXTENT {
            let o = i as f32;
            self.line(
                Vec3::new(cx + o, cy - extent, 0.0),
                Vec3::new(cx + o, cy + extent, 0.0),
                GRID,
            );
            self.line(
                Vec3::new(cx - extent, cy + o, 0.0),
                Vec3::new(cx + extent, cy + o, 0.0),
                GRID,
            );
        }
    }

    fn force_bar(&mut self, base: Vec3, force: f32) {
        if force > 0.0 {
            self.line(base, base + Vec3::Z * force * FORCE_SCALE, FORCE);
        }
    }

    pub fn snapshot(&mut self, snapshot: &Snapshot) {
        let center = to_glam(snapshot.torso_center);
        let q = snapshot.torso_orientation;
        let rotation = Quat::from_xyzw(q.x, q.y, q.z, q.w);
        let (x, y, z) = (rotation * Vec3::X, rotation * Vec3::Y, rotation * Vec3::Z);
        let r = snapshot.torso_radius;

        self.grid(center);
        self.circle(center, x, y, r, TORSO);
        self.circle(center, y, z, r, TORSO);
        self.circle(center, z, x, r, TORSO);
        // heading
        self.line(center, center + x * (1.5 * r), TORSO);
        self.force_bar(Vec3::new(center.x, center.y, 0.0), snapshot.torso_contact_force);

        for leg in &snapshot.legs {
            let (hip, knee, foot) = (to_glam(leg.hip), to_glam(leg.knee), to_glam(leg.foot));
            self.line(center, hip, LEG);
            self.line(hip, knee, LEG);
            self.line(knee, foot, LEG);
            self.circle(foot, Vec3::X, Vec3::Y, leg.foot_radius, FOOT);
            self.force_bar(Vec3::new(foot.x, foot.y, 0.0), leg.contact_force);
        }
    }

    pub fn finish(self) -> Vec<Vertex> {
        self.vertices
    }
}

/// Line-list vertices for `snapshot`.
pub fn build_lines(snapshot: &Snapshot) -> Vec<Vertex> {
    let mut builder = LineBuilder::default();
    builder.snapshot(snapshot);
    builder.finish()
}
