use super::barriers::{Barrier, BarrierController};
use super::fields::*;
use super::force_injector::Impulse;
use super::passes::*;
use crate::config::SimulationConfig;

/// Command recording facility the scheduler records into.
///
/// Implemented for wgpu (see gpu_recorder) and by the cpu reference used in tests.
pub trait PassRecorder {
    // Sets every texel of the slot to zero.
    fn clear(&mut self, slot: SlotId);
    fn barrier(&mut self, barrier: &Barrier);
    fn draw(&mut self, pass: &PassInvocation);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepSettings {
    pub timestep: f32,
    pub viscosity: f32,
    pub jacobi_iterations: u32,
}

impl StepSettings {
    pub fn from_config(config: &SimulationConfig) -> Self {
        StepSettings {
            timestep: config.timestep,
            viscosity: config.viscosity,
            jacobi_iterations: config.jacobi_iterations,
        }
    }
}

impl Default for StepSettings {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

// Stages of a simulation step, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    AdvectVelocity,
    DiffuseVelocity,
    ApplyVelocityForce,
    ApplyColorForce,
    Divergence,
    PressureSolve,
    GradientSubtract,
    AdvectColor,
    Present,
}

impl Stage {
    pub const ORDER: [Stage; 9] = [
        Stage::AdvectVelocity,
        Stage::DiffuseVelocity,
        Stage::ApplyVelocityForce,
        Stage::ApplyColorForce,
        Stage::Divergence,
        Stage::PressureSolve,
        Stage::GradientSubtract,
        Stage::AdvectColor,
        Stage::Present,
    ];
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlannedPass {
    Clear(SlotId),
    Draw(PassInvocation),
}

/// Everything a stage needs besides the role mapping.
pub struct StepContext<'a> {
    pub grid: GridGeometry,
    pub settings: &'a StepSettings,
    pub impulse: &'a Impulse,
}

pub struct StageOutput {
    pub passes: Vec<PlannedPass>,
    pub roles: RoleMap,
}

/// Fully resolved step: which pass reads and writes which physical slot.
pub struct StepPlan {
    pub passes: Vec<(Stage, PlannedPass)>,
    pub next: SimulationState,
}

fn draw(kind: PassKind, inputs: Vec<SlotId>, target: SlotId, constants: PushConstants) -> PlannedPass {
    PlannedPass::Draw(PassInvocation {
        kind,
        inputs,
        target: PassTarget::Field(target),
        constants,
    })
}

/// Records `iterations` Jacobi sweeps starting by reading `start`. Returns the slot holding the last write.
///
/// Without `rhs` the sweep uses the field itself as right hand side (viscous diffusion).
pub fn jacobi_sweeps(
    start: SlotId,
    iterations: u32,
    rhs: Option<SlotId>,
    constants: SolverConstants,
    passes: &mut Vec<PlannedPass>,
) -> SlotId {
    let mut read = start;
    for _ in 0..iterations {
        let write = read.partner();
        passes.push(draw(
            PassKind::Jacobi,
            vec![read, rhs.unwrap_or(read)],
            write,
            PushConstants::Solver(constants),
        ));
        read = write;
    }
    read
}

fn force_constants(grid: GridGeometry, impulse: &Impulse, force: [f32; 4]) -> PushConstants {
    PushConstants::Force(ForceConstants {
        texel_size: grid.texel_size(),
        pointer_pos: [impulse.position.x, impulse.position.y],
        force,
        domain_extent: grid.domain_extent(),
        impulse_radius: impulse.radius,
        _padding: 0.0,
    })
}

/// Pure transition of the step pipeline: the passes of one stage and the role mapping after it.
pub fn advance(stage: Stage, roles: &RoleMap, context: &StepContext) -> StageOutput {
    let grid = context.grid;
    let settings = context.settings;
    let mut roles = roles.clone();
    let mut passes = Vec::new();

    let advect_constants = PushConstants::Advect(AdvectConstants {
        texel_size: grid.texel_size(),
        grid_scale: grid.grid_scale(),
        timestep: settings.timestep,
    });

    match stage {
        Stage::AdvectVelocity => {
            let velocity = roles.slot(FieldRole::Velocity);
            passes.push(draw(PassKind::Advect, vec![velocity, velocity], velocity.partner(), advect_constants));
            roles.assign(FieldRole::Velocity, velocity.partner());
        }
        Stage::DiffuseVelocity => {
            let constants = SolverConstants::viscosity(grid, settings.viscosity, settings.timestep);
            let start = roles.slot(FieldRole::Velocity);
            let last_written = jacobi_sweeps(start, settings.jacobi_iterations, None, constants, &mut passes);
            roles.assign(FieldRole::Velocity, last_written);
        }
        Stage::ApplyVelocityForce => {
            let velocity = roles.slot(FieldRole::Velocity);
            let force = context.impulse.force;
            passes.push(draw(
                PassKind::ApplyForce,
                vec![velocity],
                velocity.partner(),
                force_constants(grid, context.impulse, [force.x, force.y, 0.0, 0.0]),
            ));
            roles.assign(FieldRole::Velocity, velocity.partner());
        }
        Stage::ApplyColorForce => {
            let color = roles.slot(FieldRole::Color);
            passes.push(draw(
                PassKind::ApplyForce,
                vec![color],
                color.partner(),
                force_constants(grid, context.impulse, context.impulse.tint),
            ));
            roles.assign(FieldRole::Color, color.partner());
        }
        Stage::Divergence => {
            // No divergence texture: the velocity texture not holding the current velocity is free until projection.
            let velocity = roles.slot(FieldRole::Velocity);
            let divergence = velocity.partner();
            roles.assign(FieldRole::Divergence, divergence);
            passes.push(draw(
                PassKind::Divergence,
                vec![velocity],
                divergence,
                PushConstants::Grid(GridConstants::new(grid)),
            ));
        }
        Stage::PressureSolve => {
            // Deterministic initial guess.
            let seed = SlotId::new(FieldPair::Pressure, Member::A);
            passes.push(PlannedPass::Clear(seed));
            roles.assign(FieldRole::Pressure, seed);

            let divergence = roles.slot(FieldRole::Divergence);
            let constants = SolverConstants::pressure(grid);
            let last_written = jacobi_sweeps(seed, settings.jacobi_iterations, Some(divergence), constants, &mut passes);
            roles.assign(FieldRole::Pressure, last_written);
        }
        Stage::GradientSubtract => {
            let velocity = roles.slot(FieldRole::Velocity);
            let pressure = roles.slot(FieldRole::Pressure);
            // Projected velocity overwrites the divergence, which isn't needed anymore.
            let target = roles
                .release(FieldRole::Divergence)
                .expect("divergence has to be computed before gradient subtraction");
            passes.push(draw(
                PassKind::GradientSubtract,
                vec![pressure, velocity],
                target,
                PushConstants::Grid(GridConstants::new(grid)),
            ));
            roles.assign(FieldRole::Velocity, target);
        }
        Stage::AdvectColor => {
            let velocity = roles.slot(FieldRole::Velocity);
            let color = roles.slot(FieldRole::Color);
            passes.push(draw(PassKind::Advect, vec![velocity, color], color.partner(), advect_constants));
            roles.assign(FieldRole::Color, color.partner());
        }
        Stage::Present => passes.push(present_pass(&roles, grid)),
    }

    StageOutput { passes, roles }
}

fn present_pass(roles: &RoleMap, grid: GridGeometry) -> PlannedPass {
    PlannedPass::Draw(PassInvocation {
        kind: PassKind::Present,
        inputs: vec![roles.slot(FieldRole::Color)],
        target: PassTarget::Surface,
        constants: PushConstants::Grid(GridConstants::new(grid)),
    })
}

/// Plans one full timestep starting from `state`.
pub fn plan_step(state: SimulationState, context: &StepContext) -> StepPlan {
    let mut roles = RoleMap::from_state(state);
    let mut passes = Vec::new();
    for stage in Stage::ORDER.iter() {
        let output = advance(*stage, &roles, context);
        passes.extend(output.passes.into_iter().map(|pass| (*stage, pass)));
        roles = output.roles;
    }
    StepPlan {
        passes,
        next: roles.state(),
    }
}

/// Drives simulation steps: plans them, inserts barriers and hands everything to a recorder.
pub struct StepScheduler {
    grid: GridGeometry,
    settings: StepSettings,
    barriers: BarrierController,
}

impl StepScheduler {
    pub fn new(grid: GridGeometry, settings: StepSettings) -> Self {
        StepScheduler {
            grid,
            settings,
            barriers: BarrierController::new(),
        }
    }

    /// Zero-clears all fields and returns the initial simulation state.
    pub fn initialize(&mut self, recorder: &mut impl PassRecorder) -> SimulationState {
        for slot in SlotId::all() {
            self.record(&PlannedPass::Clear(slot), recorder);
        }
        SimulationState::default()
    }

    /// Records one timestep (including the present pass). Returns the state for the next call.
    pub fn record_step(&mut self, state: SimulationState, impulse: &Impulse, recorder: &mut impl PassRecorder) -> SimulationState {
        let context = StepContext {
            grid: self.grid,
            settings: &self.settings,
            impulse,
        };
        let plan = plan_step(state, &context);
        for (_, pass) in plan.passes.iter() {
            self.record(pass, recorder);
        }
        plan.next
    }

    /// Records only the present pass, leaving the simulation where it is.
    pub fn record_present(&mut self, state: SimulationState, recorder: &mut impl PassRecorder) {
        let pass = present_pass(&RoleMap::from_state(state), self.grid);
        self.record(&pass, recorder);
    }

    fn record(&mut self, pass: &PlannedPass, recorder: &mut impl PassRecorder) {
        match pass {
            PlannedPass::Clear(slot) => {
                let barrier = self.barriers.prepare_clear(*slot);
                recorder.barrier(&barrier);
                recorder.clear(*slot);
            }
            PlannedPass::Draw(invocation) => {
                let target = match invocation.target {
                    PassTarget::Field(slot) => Some(slot),
                    PassTarget::Surface => None,
                };
                for barrier in self.barriers.prepare_pass(&invocation.inputs, target) {
                    trace!("{:?} before {:?}", barrier, invocation.kind);
                    recorder.barrier(&barrier);
                }
                recorder.draw(invocation);
            }
        }
    }
}
