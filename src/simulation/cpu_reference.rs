//! Cpu implementation of all pass kernels, mirroring the fragment shaders texel by texel.
//!
//! Sampling behaves like the shared field sampler: bilinear filtering, clamp to edge.

use super::barriers::Barrier;
use super::fields::*;
use super::force_injector::Impulse;
use super::passes::*;
use super::scheduler::*;
use cgmath::{Point2, Vector2};

/// Same cutoff as in shader/simulation/apply_force.frag
const IMPULSE_CUTOFF_RADII: f32 = 4.0;

#[derive(Clone)]
pub struct CpuField {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
}

impl CpuField {
    pub fn zeros(grid: GridGeometry) -> Self {
        CpuField {
            width: grid.width,
            height: grid.height,
            texels: vec![[0.0; 4]; grid.num_cells()],
        }
    }

    pub fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.max(0).min(self.width as i64 - 1) as usize;
        let y = y.max(0).min(self.height as i64 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        self.texels[(y * self.width + x) as usize] = value;
    }

    // Bilinear sample at texture coordinate uv.
    pub fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let px = uv[0] * self.width as f32 - 0.5;
        let py = uv[1] * self.height as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let t00 = self.fetch(x0, y0);
        let t10 = self.fetch(x0 + 1, y0);
        let t01 = self.fetch(x0, y0 + 1);
        let t11 = self.fetch(x0 + 1, y0 + 1);
        let mut result = [0.0; 4];
        for c in 0..4 {
            let top = t00[c] * (1.0 - fx) + t10[c] * fx;
            let bottom = t01[c] * (1.0 - fx) + t11[c] * fx;
            result[c] = top * (1.0 - fy) + bottom * fy;
        }
        result
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    // Kinetic energy if this holds a velocity field.
    pub fn energy(&self) -> f64 {
        self.texels.iter().map(|t| (t[0] as f64).powi(2) + (t[1] as f64).powi(2)).sum()
    }
}

fn add(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}

fn scale(a: [f32; 4], s: f32) -> [f32; 4] {
    [a[0] * s, a[1] * s, a[2] * s, a[3] * s]
}

fn offset(uv: [f32; 2], texel_size: [f32; 2], dx: f32, dy: f32) -> [f32; 2] {
    [uv[0] + dx * texel_size[0], uv[1] + dy * texel_size[1]]
}

/// Gaussian splat weight, zero beyond the cutoff.
pub fn splat_weight(uv: [f32; 2], constants: &ForceConstants) -> f32 {
    let d = Vector2::new(
        (uv[0] - constants.pointer_pos[0]) * constants.domain_extent[0],
        (uv[1] - constants.pointer_pos[1]) * constants.domain_extent[1],
    );
    let distance_sq = d.x * d.x + d.y * d.y;
    let radius = constants.impulse_radius;
    if distance_sq.sqrt() < IMPULSE_CUTOFF_RADII * radius {
        (-distance_sq / (radius * radius)).exp()
    } else {
        0.0
    }
}

// Normal velocity mirrored with flipped sign beyond the border, as in divergence.frag.
fn wall_normal(velocity: f32, neighbor_coord: f32) -> f32 {
    if neighbor_coord < 0.0 || neighbor_coord > 1.0 {
        -velocity
    } else {
        velocity
    }
}

fn divergence_at(velocity: &CpuField, uv: [f32; 2], texel_size: [f32; 2], grid_scale: f32) -> f32 {
    let uv_left = offset(uv, texel_size, -1.0, 0.0);
    let uv_right = offset(uv, texel_size, 1.0, 0.0);
    let uv_bottom = offset(uv, texel_size, 0.0, -1.0);
    let uv_top = offset(uv, texel_size, 0.0, 1.0);
    let left = wall_normal(velocity.sample(uv_left)[0], uv_left[0]);
    let right = wall_normal(velocity.sample(uv_right)[0], uv_right[0]);
    let bottom = wall_normal(velocity.sample(uv_bottom)[1], uv_bottom[1]);
    let top = wall_normal(velocity.sample(uv_top)[1], uv_top[1]);
    0.5 * ((right - left) + (top - bottom)) / grid_scale
}

fn evaluate(kind: PassKind, constants: &PushConstants, inputs: &[&CpuField], uv: [f32; 2]) -> [f32; 4] {
    match (kind, constants) {
        (PassKind::Advect, PushConstants::Advect(c)) => {
            let velocity = inputs[0].sample(uv);
            // Trace back in texel space.
            let back = [
                uv[0] - c.timestep * velocity[0] / c.grid_scale * c.texel_size[0],
                uv[1] - c.timestep * velocity[1] / c.grid_scale * c.texel_size[1],
            ];
            inputs[1].sample(back)
        }
        (PassKind::Jacobi, PushConstants::Solver(c)) => {
            let x = inputs[0];
            let neighbors = add(
                add(x.sample(offset(uv, c.texel_size, -1.0, 0.0)), x.sample(offset(uv, c.texel_size, 1.0, 0.0))),
                add(x.sample(offset(uv, c.texel_size, 0.0, -1.0)), x.sample(offset(uv, c.texel_size, 0.0, 1.0))),
            );
            let b = inputs[1].sample(uv);
            scale(add(neighbors, scale(b, c.alpha)), 1.0 / c.beta)
        }
        (PassKind::ApplyForce, PushConstants::Force(c)) => add(inputs[0].sample(uv), scale(c.force, splat_weight(uv, c))),
        (PassKind::Divergence, PushConstants::Grid(c)) => [divergence_at(inputs[0], uv, c.texel_size, c.grid_scale), 0.0, 0.0, 0.0],
        (PassKind::GradientSubtract, PushConstants::Grid(c)) => {
            let pressure = inputs[0];
            let left = pressure.sample(offset(uv, c.texel_size, -1.0, 0.0))[0];
            let right = pressure.sample(offset(uv, c.texel_size, 1.0, 0.0))[0];
            let bottom = pressure.sample(offset(uv, c.texel_size, 0.0, -1.0))[0];
            let top = pressure.sample(offset(uv, c.texel_size, 0.0, 1.0))[0];
            let velocity = inputs[1].sample(uv);
            [
                velocity[0] - 0.5 * (right - left) / c.grid_scale,
                velocity[1] - 0.5 * (top - bottom) / c.grid_scale,
                velocity[2],
                velocity[3],
            ]
        }
        (PassKind::Present, PushConstants::Grid(_)) => {
            let color = inputs[0].sample(uv);
            [color[0].max(0.0).min(1.0), color[1].max(0.0).min(1.0), color[2].max(0.0).min(1.0), 1.0]
        }
        (kind, constants) => panic!("{:?} invoked with {:?}", kind, constants),
    }
}

/// Executes recorded passes immediately on the cpu.
pub struct CpuRecorder {
    grid: GridGeometry,
    fields: Vec<CpuField>,
    pub surface: CpuField,
    pub num_barriers: usize,
}

impl CpuRecorder {
    pub fn new(grid: GridGeometry) -> Self {
        CpuRecorder {
            grid,
            fields: (0..SlotId::COUNT).map(|_| CpuField::zeros(grid)).collect(),
            surface: CpuField::zeros(grid),
            num_barriers: 0,
        }
    }

    pub fn field(&self, slot: SlotId) -> &CpuField {
        &self.fields[slot.index()]
    }

    pub fn field_mut(&mut self, slot: SlotId) -> &mut CpuField {
        &mut self.fields[slot.index()]
    }

    pub fn execute(&mut self, passes: &[PlannedPass]) {
        for pass in passes {
            match pass {
                PlannedPass::Clear(slot) => self.clear(*slot),
                PlannedPass::Draw(invocation) => self.draw(invocation),
            }
        }
    }
}

impl PassRecorder for CpuRecorder {
    fn clear(&mut self, slot: SlotId) {
        self.fields[slot.index()] = CpuField::zeros(self.grid);
    }

    fn barrier(&mut self, _barrier: &Barrier) {
        self.num_barriers += 1;
    }

    fn draw(&mut self, pass: &PassInvocation) {
        let texel_size = self.grid.texel_size();
        let mut output = CpuField::zeros(self.grid);
        {
            let inputs: Vec<&CpuField> = pass.inputs.iter().map(|slot| &self.fields[slot.index()]).collect();
            for y in 0..self.grid.height {
                for x in 0..self.grid.width {
                    let uv = [(x as f32 + 0.5) * texel_size[0], (y as f32 + 0.5) * texel_size[1]];
                    output.set(x, y, evaluate(pass.kind, &pass.constants, &inputs, uv));
                }
            }
        }
        match pass.target {
            PassTarget::Field(slot) => self.fields[slot.index()] = output,
            PassTarget::Surface => self.surface = output,
        }
    }
}

pub fn divergence_l2(velocity: &CpuField, grid: GridGeometry) -> f64 {
    let texel_size = grid.texel_size();
    let mut sum = 0.0;
    for y in 0..grid.height {
        for x in 0..grid.width {
            let uv = [(x as f32 + 0.5) * texel_size[0], (y as f32 + 0.5) * texel_size[1]];
            sum += (divergence_at(velocity, uv, texel_size, grid.grid_scale()) as f64).powi(2);
        }
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_steps(grid: GridGeometry, settings: StepSettings, impulses: &[Impulse]) -> (CpuRecorder, Vec<SimulationState>) {
        let mut recorder = CpuRecorder::new(grid);
        let mut scheduler = StepScheduler::new(grid, settings);
        let mut state = scheduler.initialize(&mut recorder);
        let mut states = Vec::new();
        for impulse in impulses {
            state = scheduler.record_step(state, impulse, &mut recorder);
            states.push(state);
        }
        (recorder, states)
    }

    fn push_impulse(radius: f32) -> Impulse {
        Impulse {
            force: Vector2::new(1.0, 0.0),
            tint: [1.0, 1.0, 1.0, 1.0],
            position: Point2::new(0.5, 0.5),
            radius,
        }
    }

    fn velocity(recorder: &CpuRecorder, state: SimulationState) -> &CpuField {
        recorder.field(SlotId::new(FieldPair::Velocity, state.velocity))
    }

    #[test]
    fn bilinear_sampling_clamps_to_edge() {
        let grid = GridGeometry::new(2, 1);
        let mut field = CpuField::zeros(grid);
        field.set(1, 0, [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(field.sample([0.25, 0.5])[0], 0.0);
        assert_eq!(field.sample([0.5, 0.5])[0], 1.0);
        assert_eq!(field.sample([0.75, 0.5])[0], 2.0);
        assert_eq!(field.sample([5.0, 0.5])[0], 2.0);
        assert_eq!(field.sample([-1.0, 0.5])[0], 0.0);
    }

    #[test]
    fn zero_field_is_fixed_point() {
        let grid = GridGeometry::new(16, 16);
        let impulses = vec![Impulse::none(0.1); 3];
        let (recorder, states) = run_steps(grid, StepSettings::default(), &impulses);
        for slot in SlotId::all() {
            assert!(recorder.field(slot).texels().iter().all(|t| *t == [0.0; 4]), "{:?}", slot);
        }
        assert!(recorder.surface.texels().iter().all(|t| *t == [0.0, 0.0, 0.0, 1.0]));
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn impulse_decays_with_distance_and_cuts_off() {
        let grid = GridGeometry::new(64, 64);
        let mut recorder = CpuRecorder::new(grid);
        let impulse = push_impulse(0.05);
        let roles = RoleMap::from_state(SimulationState::default());
        let settings = StepSettings::default();
        let output = advance(
            Stage::ApplyVelocityForce,
            &roles,
            &StepContext {
                grid,
                settings: &settings,
                impulse: &impulse,
            },
        );
        recorder.execute(&output.passes);

        let field = recorder.field(output.roles.slot(FieldRole::Velocity));
        // Pointer sits on the corner between texels 31 and 32, walk to the right from there.
        let row: Vec<f32> = (32..64).map(|x| field.fetch(x, 32)[0]).collect();
        let cutoff_texels = (IMPULSE_CUTOFF_RADII * 0.05 * 64.0) as usize;
        for i in 1..row.len() {
            if row[i - 1] > 0.0 && row[i] > 0.0 {
                more_asserts::assert_lt!(row[i], row[i - 1]);
            }
        }
        more_asserts::assert_gt!(row[0], 0.5);
        for value in &row[cutoff_texels + 1..] {
            assert_eq!(*value, 0.0);
        }
        // Force only pushes along x.
        assert!(field.texels().iter().all(|t| t[1] == 0.0));
    }

    #[test]
    fn projection_reduces_divergence() {
        let grid = GridGeometry::new(32, 32);
        let settings = StepSettings {
            jacobi_iterations: 200,
            ..StepSettings::default()
        };
        let mut recorder = CpuRecorder::new(grid);

        // Radial outflow around the center.
        let state = SimulationState::default();
        let velocity_slot = SlotId::new(FieldPair::Velocity, state.velocity);
        for y in 0..grid.height {
            for x in 0..grid.width {
                let d = Vector2::new(x as f32 + 0.5 - 16.0, y as f32 + 0.5 - 16.0);
                let falloff = (-(d.x * d.x + d.y * d.y) / 9.0).exp();
                recorder.field_mut(velocity_slot).set(x, y, [d.x * falloff, d.y * falloff, 0.0, 0.0]);
            }
        }
        let before = divergence_l2(recorder.field(velocity_slot), grid);
        more_asserts::assert_gt!(before, 1.0);

        let impulse = Impulse::none(0.1);
        let context = StepContext {
            grid,
            settings: &settings,
            impulse: &impulse,
        };
        let mut roles = RoleMap::from_state(state);
        for stage in &[Stage::Divergence, Stage::PressureSolve, Stage::GradientSubtract] {
            let output = advance(*stage, &roles, &context);
            recorder.execute(&output.passes);
            roles = output.roles;
        }

        let after = divergence_l2(recorder.field(roles.slot(FieldRole::Velocity)), grid);
        more_asserts::assert_lt!(after, before * 0.5);
    }

    #[test]
    fn single_impulse_energy_decays() {
        let grid = GridGeometry::new(64, 64);
        let mut impulses = vec![push_impulse(0.1)];
        impulses.extend(std::iter::repeat(Impulse::none(0.1)).take(100));

        let mut recorder = CpuRecorder::new(grid);
        let mut scheduler = StepScheduler::new(grid, StepSettings::default());
        let mut state = scheduler.initialize(&mut recorder);
        let mut energies = Vec::new();
        for impulse in impulses.iter() {
            state = scheduler.record_step(state, impulse, &mut recorder);
            energies.push(velocity(&recorder, state).energy());
        }

        let first = energies[0];
        more_asserts::assert_gt!(first, 0.0);
        for (step, window) in energies.windows(2).enumerate() {
            assert!(window[1] <= window[0], "energy rose in step {}: {} -> {}", step + 1, window[0], window[1]);
        }
        more_asserts::assert_lt!(energies[100], first * 0.5);
        more_asserts::assert_gt!(recorder.num_barriers, 0);
    }

    // Measures the divergence of the velocity entering and leaving the projection of every step.
    struct ProjectionMonitor {
        cpu: CpuRecorder,
        before: Vec<f64>,
        after: Vec<f64>,
    }

    impl PassRecorder for ProjectionMonitor {
        fn clear(&mut self, slot: SlotId) {
            self.cpu.clear(slot);
        }

        fn barrier(&mut self, barrier: &Barrier) {
            self.cpu.barrier(barrier);
        }

        fn draw(&mut self, pass: &PassInvocation) {
            if pass.kind == PassKind::Divergence {
                self.before.push(divergence_l2(self.cpu.field(pass.inputs[0]), self.cpu.grid));
            }
            self.cpu.draw(pass);
            if let (PassKind::GradientSubtract, PassTarget::Field(target)) = (pass.kind, pass.target) {
                self.after.push(divergence_l2(self.cpu.field(target), self.cpu.grid));
            }
        }
    }

    #[test]
    fn every_step_projection_reduces_divergence() {
        let grid = GridGeometry::new(32, 32);
        let mut monitor = ProjectionMonitor {
            cpu: CpuRecorder::new(grid),
            before: Vec::new(),
            after: Vec::new(),
        };
        let mut scheduler = StepScheduler::new(grid, StepSettings::default());
        let mut state = scheduler.initialize(&mut monitor);
        for step in 0..8 {
            let impulse = if step == 0 || step == 1 || step == 4 {
                push_impulse(0.1)
            } else {
                Impulse::none(0.1)
            };
            state = scheduler.record_step(state, &impulse, &mut monitor);
        }

        assert_eq!(monitor.before.len(), 8);
        assert_eq!(monitor.after.len(), 8);
        for (step, (before, after)) in monitor.before.iter().zip(monitor.after.iter()).enumerate() {
            more_asserts::assert_gt!(*before, 1.0, "step {}", step);
            more_asserts::assert_lt!(*after, *before, "step {}", step);
        }
    }

    // Flow into a wall counts as divergence, flow along it doesn't.
    #[test]
    fn walls_are_impermeable() {
        let grid = GridGeometry::new(8, 8);
        let mut field = CpuField::zeros(grid);
        for y in 0..8 {
            for x in 0..8 {
                field.set(x, y, [1.0, 0.0, 0.0, 0.0]);
            }
        }
        let texel_size = grid.texel_size();
        let uv = |x: u32, y: u32| [(x as f32 + 0.5) * texel_size[0], (y as f32 + 0.5) * texel_size[1]];
        let dx = grid.grid_scale();

        assert_eq!(divergence_at(&field, uv(3, 0), texel_size, dx), 0.0);
        assert_eq!(divergence_at(&field, uv(3, 7), texel_size, dx), 0.0);
        assert_eq!(divergence_at(&field, uv(0, 3), texel_size, dx), 1.0 / dx);
        assert_eq!(divergence_at(&field, uv(7, 3), texel_size, dx), -1.0 / dx);
    }

    #[test]
    fn ink_reaches_surface() {
        let grid = GridGeometry::new(32, 32);
        let (recorder, states) = run_steps(grid, StepSettings::default(), &[push_impulse(0.1)]);
        let center = recorder.surface.fetch(16, 16);
        more_asserts::assert_gt!(center[0], 0.5);
        let color = recorder.field(SlotId::new(FieldPair::Color, states[0].color)).fetch(16, 16);
        assert_eq!(center[..3], color[..3]);
        assert_eq!(recorder.surface.fetch(0, 0), [0.0, 0.0, 0.0, 1.0]);
    }
}
