//! Per-instance dynamics shared by the in-place stepper and the batched CPU
//! kernel.
//!
//! Everything here works on plain slices so one instance of a
//! [`BatchState`](crate::BatchState) and an owned [`SimState`] go through the
//! exact same arithmetic. The per-substep math is branch free: contact and
//! joint-limit activity are expressed as 0/1 masks, matching `select` in the
//! WGSL port.

use crate::{
    error::PhysicsError,
    kinematics::leg_frame,
    math::{Quat, Vec3},
    model::{JointParams, Model, ModelParams, ParamsHeader, MAX_LEGS},
    state::{SimState, QPOS_ROOT, QVEL_ROOT},
};

fn mask(condition: bool) -> f32 {
    f32::from(u8::from(condition))
}

/// Ground reaction on a sphere of `radius` whose centre sits at `height` and
/// moves with `velocity`. Returns the world-frame force and its normal part.
fn ground_contact(header: &ParamsHeader, height: f32, velocity: Vec3, radius: f32) -> (Vec3, f32) {
    let depth = radius - height;
    let active = mask(depth > 0.0);
    let normal =
        (header.contact_stiffness * depth - header.contact_damping * velocity.z).max(0.0) * active;
    let eps = header.friction_smoothing;
    let slip = (velocity.x * velocity.x + velocity.y * velocity.y + eps * eps).sqrt();
    let scale = -header.friction * normal / slip;
    (Vec3::new(scale * velocity.x, scale * velocity.y, normal), normal)
}

fn limit_torque(header: &ParamsHeader, joint: &JointParams, angle: f32, rate: f32) -> f32 {
    let below = (joint.lower - angle).max(0.0);
    let above = (angle - joint.upper).max(0.0);
    let violated = mask(below > 0.0 || above > 0.0);
    header.limit_stiffness * (below - above) - header.limit_damping * rate * violated
}

/// Clamps one control value to its actuator range without panicking on NaN.
#[must_use]
pub fn clamp_control(joint: &JointParams, value: f32) -> f32 {
    value.max(joint.ctrl_lower).min(joint.ctrl_upper)
}

/// Writes `ctrl` clamped to the actuator ranges into `out`.
pub fn clamp_controls(params: &ModelParams, ctrl: &[f32], out: &mut [f32]) {
    let joints = params.legs.iter().flat_map(|leg| [&leg.hip, &leg.ankle]);
    for ((dst, src), joint) in out.iter_mut().zip(ctrl).zip(joints) {
        *dst = clamp_control(joint, *src);
    }
}

/// Advances one instance by a single substep of `header.timestep`.
///
/// Slices must have the lengths of the model's `nq`, `nv`, `nu` and
/// `ncontact`.
pub fn substep(params: &ModelParams, qpos: &mut [f32], qvel: &mut [f32], ctrl: &[f32], contact: &mut [f32]) {
    let header = &params.header;
    let dt = header.timestep;
    let num_legs = params.legs.len();

    let position = Vec3::from_slice(&qpos[0..3]);
    let rotation = Quat::from_slice(&qpos[3..QPOS_ROOT]);
    let linear = Vec3::from_slice(&qvel[0..3]);
    let angular = Vec3::from_slice(&qvel[3..QVEL_ROOT]);
    let angular_world = rotation.rotate(angular);

    let mut force = Vec3::new(0.0, 0.0, header.gravity * header.total_mass);
    let mut torque = Vec3::ZERO;
    let mut contact_torque = [0.0f32; 2 * MAX_LEGS];

    // torso sphere
    let lever = Vec3::new(0.0, 0.0, -header.torso_radius);
    let (f, normal) = ground_contact(
        header,
        position.z,
        linear + angular_world.cross(lever),
        header.torso_radius,
    );
    force += f;
    torque += lever.cross(f);
    contact[num_legs] = normal;

    for (k, leg) in params.legs.iter().enumerate() {
        let frame = leg_frame(leg, qpos[QPOS_ROOT + 2 * k], qpos[QPOS_ROOT + 2 * k + 1]);
        let lever = rotation.rotate(frame.foot);
        let joint_motion =
            frame.foot_dhip * qvel[QVEL_ROOT + 2 * k] + frame.foot_dankle * qvel[QVEL_ROOT + 2 * k + 1];
        let velocity = linear + angular_world.cross(lever) + rotation.rotate(joint_motion);
        let (f, normal) = ground_contact(header, position.z + lever.z, velocity, leg.foot_radius);
        contact[k] = normal;
        force += f;
        torque += lever.cross(f);

        let f_body = rotation.inverse_rotate(f);
        contact_torque[2 * k] = frame.foot_dhip.dot(f_body);
        contact_torque[2 * k + 1] = frame.foot_dankle.dot(f_body);
    }

    for (k, leg) in params.legs.iter().enumerate() {
        for (j, joint) in [&leg.hip, &leg.ankle].into_iter().enumerate() {
            let u = 2 * k + j;
            let angle = qpos[QPOS_ROOT + u];
            let rate = qvel[QVEL_ROOT + u];
            let tau = joint.gear * clamp_control(joint, ctrl[u]) - joint.damping * rate
                + limit_torque(header, joint, angle, rate)
                + contact_torque[u];
            qvel[QVEL_ROOT + u] = rate + tau / joint.armature * dt;
        }
    }

    let inertia = Vec3::from(header.inertia);
    let torque_body = rotation.inverse_rotate(torque);
    let angular_acc = (torque_body - angular.cross(inertia.mul_elem(angular))).div_elem(inertia);
    let linear = linear + force / header.total_mass * dt;
    let angular = angular + angular_acc * dt;

    qvel[0..3].copy_from_slice(&linear.to_array());
    qvel[3..QVEL_ROOT].copy_from_slice(&angular.to_array());

    let position = position + linear * dt;
    let rotation = rotation.integrate(angular, dt);
    qpos[0..3].copy_from_slice(&position.to_array());
    qpos[3..QPOS_ROOT].copy_from_slice(&rotation.to_array());
    for u in 0..2 * num_legs {
        qpos[QPOS_ROOT + u] += qvel[QVEL_ROOT + u] * dt;
    }
}

/// Runs every substep of one control step.
pub fn integrate(params: &ModelParams, qpos: &mut [f32], qvel: &mut [f32], ctrl: &[f32], contact: &mut [f32]) {
    for _ in 0..params.substeps() {
        substep(params, qpos, qvel, ctrl, contact);
    }
}

/// Advances `state` by one control step in place.
///
/// # Errors
///
/// Returns [`PhysicsError::ActionShape`] if `ctrl` does not hold one value
/// per actuator. Unstable integration is not an error; the state simply
/// becomes non-finite.
pub fn step(model: &Model, state: &mut SimState, ctrl: &[f32]) -> Result<(), PhysicsError> {
    if ctrl.len() != model.nu() {
        return Err(PhysicsError::ActionShape {
            expected: model.nu(),
            actual: ctrl.len(),
        });
    }
    let params = model.params();
    state.ctrl.resize(ctrl.len(), 0.0);
    clamp_controls(params, ctrl, &mut state.ctrl);
    integrate(
        params,
        &mut state.qpos,
        &mut state.qvel,
        &state.ctrl,
        &mut state.contact,
    );
    state.time += model.config().control_dt();
    Ok(())
}
