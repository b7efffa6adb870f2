use super::fields::{GridGeometry, SlotId};
use std::path::Path;
use strum_macros::EnumIter;

// Stage types. Diffusion and the pressure solve share the Jacobi kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum PassKind {
    Advect,
    Jacobi,
    ApplyForce,
    Divergence,
    GradientSubtract,
    Present,
}

// Output format of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFormat {
    Field,
    Surface,
}

/// Static configuration of a pass kernel. Immutable after setup.
pub struct PassDescriptor {
    pub kind: PassKind,
    pub label: &'static str,
    pub vertex_shader: &'static str,
    pub fragment_shader: &'static str,
    /// Number of field textures sampled (bound after the shared sampler, in this order).
    pub num_inputs: usize,
    pub target: TargetFormat,
}

impl PassDescriptor {
    pub const VERTEX_SHADER: &'static str = "screenquad.vert";

    pub fn get(kind: PassKind) -> &'static PassDescriptor {
        &PASS_DESCRIPTORS[kind as usize]
    }

    pub fn vertex_shader_path(&self) -> &Path {
        Path::new(self.vertex_shader)
    }

    pub fn fragment_shader_path(&self) -> &Path {
        Path::new(self.fragment_shader)
    }
}

static PASS_DESCRIPTORS: [PassDescriptor; 6] = [
    PassDescriptor {
        kind: PassKind::Advect,
        label: "Pass: Advect",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "simulation/advect.frag",
        num_inputs: 2, // velocity, advected quantity
        target: TargetFormat::Field,
    },
    PassDescriptor {
        kind: PassKind::Jacobi,
        label: "Pass: Jacobi",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "simulation/jacobi.frag",
        num_inputs: 2, // x, b
        target: TargetFormat::Field,
    },
    PassDescriptor {
        kind: PassKind::ApplyForce,
        label: "Pass: Apply Force",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "simulation/apply_force.frag",
        num_inputs: 1,
        target: TargetFormat::Field,
    },
    PassDescriptor {
        kind: PassKind::Divergence,
        label: "Pass: Divergence",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "simulation/divergence.frag",
        num_inputs: 1,
        target: TargetFormat::Field,
    },
    PassDescriptor {
        kind: PassKind::GradientSubtract,
        label: "Pass: Gradient Subtract",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "simulation/gradient_subtract.frag",
        num_inputs: 2, // pressure, velocity
        target: TargetFormat::Field,
    },
    PassDescriptor {
        kind: PassKind::Present,
        label: "Pass: Present",
        vertex_shader: PassDescriptor::VERTEX_SHADER,
        fragment_shader: "present.frag",
        num_inputs: 1,
        target: TargetFormat::Surface,
    },
];

// Push constant blocks. All of them start with the texel size so the shaders can derive uvs from gl_FragCoord.
// Layouts have to match the blocks in shader/simulation/*.frag.

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdvectConstants {
    pub texel_size: [f32; 2],
    pub grid_scale: f32,
    pub timestep: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SolverConstants {
    pub texel_size: [f32; 2],
    pub alpha: f32,
    pub beta: f32,
}

impl SolverConstants {
    // Implicit viscous diffusion: (∇² − α)u = −α·u₀
    pub fn viscosity(grid: GridGeometry, kinematic_viscosity: f32, timestep: f32) -> Self {
        let dx = grid.grid_scale();
        let alpha = dx * dx / (kinematic_viscosity * timestep);
        SolverConstants {
            texel_size: grid.texel_size(),
            alpha,
            beta: 4.0 + alpha,
        }
    }

    // Poisson equation ∇²p = ∇·u
    pub fn pressure(grid: GridGeometry) -> Self {
        let dx = grid.grid_scale();
        SolverConstants {
            texel_size: grid.texel_size(),
            alpha: -dx * dx,
            beta: 4.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ForceConstants {
    pub texel_size: [f32; 2],
    pub pointer_pos: [f32; 2],
    pub force: [f32; 4],
    pub domain_extent: [f32; 2],
    pub impulse_radius: f32,
    pub _padding: f32,
}

// Shared by divergence and gradient subtraction.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridConstants {
    pub texel_size: [f32; 2],
    pub grid_scale: f32,
    pub _padding: f32,
}

impl GridConstants {
    pub fn new(grid: GridGeometry) -> Self {
        GridConstants {
            texel_size: grid.texel_size(),
            grid_scale: grid.grid_scale(),
            _padding: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PushConstants {
    Advect(AdvectConstants),
    Solver(SolverConstants),
    Force(ForceConstants),
    Grid(GridConstants),
}

impl PushConstants {
    /// Size of the push constant range shared by all pipelines.
    pub const RANGE_SIZE: u32 = std::mem::size_of::<ForceConstants>() as u32;

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PushConstants::Advect(c) => bytemuck::bytes_of(c),
            PushConstants::Solver(c) => bytemuck::bytes_of(c),
            PushConstants::Force(c) => bytemuck::bytes_of(c),
            PushConstants::Grid(c) => bytemuck::bytes_of(c),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassTarget {
    Field(SlotId),
    // Whatever attachment the presentation side handed us for this frame.
    Surface,
}

/// A single full-screen draw: bind inputs, push constants, draw into target.
#[derive(Clone, Debug, PartialEq)]
pub struct PassInvocation {
    pub kind: PassKind,
    pub inputs: Vec<SlotId>,
    pub target: PassTarget,
    pub constants: PushConstants,
}

impl PassInvocation {
    pub fn reads(&self, slot: SlotId) -> bool {
        self.inputs.contains(&slot)
    }
}
