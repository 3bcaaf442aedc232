//! Batched, functional stepping.
//!
//! [`BatchState`] stacks N independent instances as struct-of-arrays, one
//! flat row-major `Vec<f32>` per field. [`BatchStepper::step`] is pure: it
//! uploads the stack, runs all substeps of every instance in a single
//! dispatch of [`INTEGRATE_LEGGED`] and returns a new stack.

use crate::{
    dynamics::{clamp_controls, integrate},
    error::PhysicsError,
    model::{Model, ModelParams},
    state::{SimState, StateView},
};
use compute::{read_f32s, workgroup_count, Access, BufferView, ComputeBackend, ComputeError, Kernel, WORKGROUP_SIZE};
use std::sync::Arc;

/// N stacked simulation instances.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchState {
    batch_size: usize,
    nq: usize,
    nv: usize,
    nu: usize,
    ncontact: usize,
    pub qpos: Vec<f32>,
    pub qvel: Vec<f32>,
    pub ctrl: Vec<f32>,
    pub contact: Vec<f32>,
    pub time: Vec<f32>,
}

/// One row of a [`BatchState`].
#[derive(Debug, Clone, Copy)]
pub struct StateRef<'a> {
    qpos: &'a [f32],
    qvel: &'a [f32],
    ctrl: &'a [f32],
    contact: &'a [f32],
    time: f32,
}

impl StateView for StateRef<'_> {
    fn qpos(&self) -> &[f32] {
        self.qpos
    }

    fn qvel(&self) -> &[f32] {
        self.qvel
    }

    fn ctrl(&self) -> &[f32] {
        self.ctrl
    }

    fn contact(&self) -> &[f32] {
        self.contact
    }

    fn time(&self) -> f32 {
        self.time
    }
}

impl StateRef<'_> {
    #[must_use]
    pub fn to_state(&self) -> SimState {
        SimState {
            qpos: self.qpos.to_vec(),
            qvel: self.qvel.to_vec(),
            ctrl: self.ctrl.to_vec(),
            contact: self.contact.to_vec(),
            time: self.time,
        }
    }
}

impl BatchState {
    /// Copies one instance `n` times.
    #[must_use]
    pub fn replicate(state: &SimState, n: usize) -> Self {
        Self {
            batch_size: n,
            nq: state.qpos.len(),
            nv: state.qvel.len(),
            nu: state.ctrl.len(),
            ncontact: state.contact.len(),
            qpos: state.qpos.repeat(n),
            qvel: state.qvel.repeat(n),
            ctrl: state.ctrl.repeat(n),
            contact: state.contact.repeat(n),
            time: vec![state.time; n],
        }
    }

    /// Stacks independent instances of the same model.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BatchSize`] for an empty slice and
    /// [`PhysicsError::StateShape`] when the instances disagree on their
    /// dimensions.
    pub fn stack(states: &[SimState]) -> Result<Self, PhysicsError> {
        let first = states.first().ok_or(PhysicsError::BatchSize { expected: 1, actual: 0 })?;
        let mut batch = Self::replicate(first, 0);
        for state in states {
            batch.push(state)?;
        }
        Ok(batch)
    }

    fn push(&mut self, state: &SimState) -> Result<(), PhysicsError> {
        if state.qpos.len() != self.nq
            || state.qvel.len() != self.nv
            || state.ctrl.len() != self.nu
            || state.contact.len() != self.ncontact
        {
            return Err(PhysicsError::StateShape);
        }
        self.qpos.extend_from_slice(&state.qpos);
        self.qvel.extend_from_slice(&state.qvel);
        self.ctrl.extend_from_slice(&state.ctrl);
        self.contact.extend_from_slice(&state.contact);
        self.time.push(state.time);
        self.batch_size += 1;
        Ok(())
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Borrowed view of instance `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= batch_size()`.
    #[must_use]
    pub fn row(&self, i: usize) -> StateRef<'_> {
        StateRef {
            qpos: &self.qpos[i * self.nq..(i + 1) * self.nq],
            qvel: &self.qvel[i * self.nv..(i + 1) * self.nv],
            ctrl: &self.ctrl[i * self.nu..(i + 1) * self.nu],
            contact: &self.contact[i * self.ncontact..(i + 1) * self.ncontact],
            time: self.time[i],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = StateRef<'_>> {
        (0..self.batch_size).map(|i| self.row(i))
    }

    /// Element-wise choice between two stacks: row `i` comes from `on_set`
    /// where `mask[i] > 0.5`, otherwise from `otherwise`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::BatchSize`] when the mask or `on_set` does not
    /// match this batch, and [`PhysicsError::StateShape`] when the per-row
    /// dimensions differ.
    pub fn select(mask: &[f32], on_set: &Self, otherwise: &Self) -> Result<Self, PhysicsError> {
        for len in [mask.len(), on_set.batch_size] {
            if len != otherwise.batch_size {
                return Err(PhysicsError::BatchSize {
                    expected: otherwise.batch_size,
                    actual: len,
                });
            }
        }
        if (on_set.nq, on_set.nv, on_set.nu, on_set.ncontact)
            != (otherwise.nq, otherwise.nv, otherwise.nu, otherwise.ncontact)
        {
            return Err(PhysicsError::StateShape);
        }

        Ok(Self {
            qpos: pick(mask, otherwise.nq, &on_set.qpos, &otherwise.qpos),
            qvel: pick(mask, otherwise.nv, &on_set.qvel, &otherwise.qvel),
            ctrl: pick(mask, otherwise.nu, &on_set.ctrl, &otherwise.ctrl),
            contact: pick(mask, otherwise.ncontact, &on_set.contact, &otherwise.contact),
            time: pick(mask, 1, &on_set.time, &otherwise.time),
            ..*otherwise
        })
    }
}

fn pick(mask: &[f32], width: usize, a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter()
        .zip(b)
        .enumerate()
        .map(|(j, (x, y))| if mask[j / width.max(1)] > 0.5 { *x } else { *y })
        .collect()
}

/// CPU reference of [`INTEGRATE_LEGGED`].
fn integrate_legged_cpu(binds: &[BufferView]) -> Result<Vec<Vec<u8>>, ComputeError> {
    let params = ModelParams::from_bytes(&binds[0].data)?;
    let nlegs = params.legs.len();
    let (nq, nv, nu, nc) = (7 + 2 * nlegs, 6 + 2 * nlegs, 2 * nlegs, nlegs + 1);

    let ctrl = read_f32s(&binds[1].data);
    let mut qpos = read_f32s(&binds[2].data);
    let mut qvel = read_f32s(&binds[3].data);
    let mut contact = read_f32s(&binds[4].data);

    let n = qpos.len() / nq;
    if qpos.len() != n * nq || qvel.len() != n * nv || ctrl.len() != n * nu || contact.len() != n * nc {
        return Err(ComputeError::ShapeMismatch("batched state does not match the model dimensions"));
    }

    for i in 0..n {
        integrate(
            &params,
            &mut qpos[i * nq..(i + 1) * nq],
            &mut qvel[i * nv..(i + 1) * nv],
            &ctrl[i * nu..(i + 1) * nu],
            &mut contact[i * nc..(i + 1) * nc],
        );
    }

    Ok(vec![
        bytemuck::cast_slice(&qpos).to_vec(),
        bytemuck::cast_slice(&qvel).to_vec(),
        bytemuck::cast_slice(&contact).to_vec(),
    ])
}

/// One control step of every instance: `[params, ctrl, qpos, qvel, contact]`.
pub static INTEGRATE_LEGGED: Kernel = Kernel {
    name: "integrate_legged",
    wgsl: include_str!("../shaders/integrate_legged.wgsl"),
    entry_point: "main",
    bindings: &[
        Access::ReadOnly,
        Access::ReadOnly,
        Access::ReadWrite,
        Access::ReadWrite,
        Access::ReadWrite,
    ],
    cpu: integrate_legged_cpu,
};

/// Steps a fixed-size batch on a compute backend.
pub struct BatchStepper {
    model: Arc<Model>,
    backend: Arc<dyn ComputeBackend>,
    params: BufferView,
    batch_size: usize,
}

impl BatchStepper {
    /// Flattens the model parameters once for every later dispatch.
    #[must_use]
    pub fn new(model: Arc<Model>, backend: Arc<dyn ComputeBackend>, batch_size: usize) -> Self {
        let params = model.params().to_buffer();
        tracing::info!(batch_size, backend = backend.name(), "batched stepper ready");
        Self {
            model,
            backend,
            params,
            batch_size,
        }
    }

    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Advances every instance by one control step and returns the new stack.
    ///
    /// `ctrl` is `batch_size × nu`, row-major.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::BatchSize`] / [`PhysicsError::ActionShape`] when the
    /// inputs do not match the stepper, [`PhysicsError::Backend`] when the
    /// dispatch fails.
    pub fn step(&self, state: &BatchState, ctrl: &[f32]) -> Result<BatchState, PhysicsError> {
        let model = &self.model;
        if state.batch_size != self.batch_size {
            return Err(PhysicsError::BatchSize {
                expected: self.batch_size,
                actual: state.batch_size,
            });
        }
        if state.nq != model.nq() || state.nv != model.nv() || state.ncontact != model.ncontact() {
            return Err(PhysicsError::StateShape);
        }
        let expected = self.batch_size * model.nu();
        if ctrl.len() != expected {
            return Err(PhysicsError::ActionShape {
                expected,
                actual: ctrl.len(),
            });
        }

        let n = self.batch_size;
        let view = |values: &[f32], width: usize| {
            BufferView::new(bytemuck::cast_slice(values).to_vec().into(), vec![n, width], 4)
        };
        let binds = [
            self.params.clone(),
            view(ctrl, model.nu()),
            view(&state.qpos, model.nq()),
            view(&state.qvel, model.nv()),
            view(&state.contact, model.ncontact()),
        ];
        let groups = workgroup_count(n, WORKGROUP_SIZE);
        let outputs = self.backend.dispatch(&INTEGRATE_LEGGED, &binds, [groups, 1, 1])?;
        let [qpos, qvel, contact] = outputs.as_slice() else {
            return Err(ComputeError::ShapeMismatch("integrate_legged returned the wrong number of buffers").into());
        };

        let mut clamped = vec![0.0; ctrl.len()];
        for (src, dst) in ctrl.chunks_exact(model.nu()).zip(clamped.chunks_exact_mut(model.nu())) {
            clamp_controls(model.params(), src, dst);
        }
        let dt = model.config().control_dt();

        Ok(BatchState {
            qpos: read_f32s(qpos),
            qvel: read_f32s(qvel),
            ctrl: clamped,
            contact: read_f32s(contact),
            time: state.time.iter().map(|t| t + dt).collect(),
            ..*state
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dynamics::step, test_support::quad_model};
    use compute::CpuBackend;

    fn stepper(n: usize) -> BatchStepper {
        BatchStepper::new(Arc::new(quad_model(10.0)), Arc::new(CpuBackend::new()), n)
    }

    #[test]
    fn replicate_and_row_round_trip() {
        let model = quad_model(10.0);
        let state = model.initial_state();
        let batch = BatchState::replicate(&state, 3);
        assert_eq!(batch.batch_size(), 3);
        assert_eq!(batch.qpos.len(), 3 * model.nq());
        assert_eq!(batch.row(2).to_state(), state);
    }

    #[test]
    fn stack_rejects_mixed_models() {
        let a = quad_model(10.0).initial_state();
        let b = crate::test_support::two_leg_model().initial_state();
        assert!(matches!(BatchState::stack(&[a, b]), Err(PhysicsError::StateShape)));
        assert!(matches!(BatchState::stack(&[]), Err(PhysicsError::BatchSize { .. })));
    }

    #[test]
    fn batch_step_matches_single_steps_bitwise() {
        let stepper = stepper(3);
        let model = Arc::clone(stepper.model());
        let mut states = Vec::new();
        for i in 0..3u8 {
            let mut s = model.initial_state();
            s.qpos[2] += 0.05 * f32::from(i);
            states.push(s);
        }
        let mut batch = BatchState::stack(&states).unwrap();
        let mut rng = 0.1f32;
        for _ in 0..20 {
            let ctrl: Vec<f32> = (0..3 * model.nu())
                .map(|_| {
                    rng = (rng * 7.31 + 0.17).fract();
                    2.0 * rng - 1.0
                })
                .collect();
            batch = stepper.step(&batch, &ctrl).unwrap();
            for (i, s) in states.iter_mut().enumerate() {
                step(&model, s, &ctrl[i * model.nu()..(i + 1) * model.nu()]).unwrap();
            }
        }
        for (i, s) in states.iter().enumerate() {
            assert_eq!(&batch.row(i).to_state(), s);
        }
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let stepper = stepper(2);
        let state = BatchState::replicate(&stepper.model().initial_state(), 2);
        assert!(matches!(
            stepper.step(&state, &[0.0; 3]),
            Err(PhysicsError::ActionShape { expected: 16, actual: 3 })
        ));
        let wrong = BatchState::replicate(&stepper.model().initial_state(), 5);
        assert!(matches!(
            stepper.step(&wrong, &[0.0; 40]),
            Err(PhysicsError::BatchSize { expected: 2, actual: 5 })
        ));
    }

    #[test]
    fn step_is_pure() {
        let stepper = stepper(2);
        let state = BatchState::replicate(&stepper.model().initial_state(), 2);
        let before = state.clone();
        let a = stepper.step(&state, &[0.3; 16]).unwrap();
        let b = stepper.step(&state, &[0.3; 16]).unwrap();
        assert_eq!(state, before);
        assert_eq!(a, b);
    }

    #[test]
    fn select_picks_rows_by_mask() {
        let model = quad_model(10.0);
        let mut moved = model.initial_state();
        moved.qpos[0] = 9.0;
        moved.time = 3.0;
        let a = BatchState::replicate(&moved, 3);
        let b = BatchState::replicate(&model.initial_state(), 3);
        let out = BatchState::select(&[1.0, 0.0, 1.0], &a, &b).unwrap();
        assert_eq!(out.row(0).qpos()[0], 9.0);
        assert_eq!(out.row(1).qpos()[0], 0.0);
        assert_eq!(out.time, vec![3.0, 0.0, 3.0]);
        assert!(BatchState::select(&[1.0], &a, &b).is_err());
    }
}
