use super::fields::GridGeometry;
use crate::config::ForceConfig;
use cgmath::{Point2, Vector2, Zero};

/// Raw pointer input as polled once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerState {
    // In surface pixels, origin top left.
    pub position: Point2<f32>,
    pub primary_down: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        PointerState {
            position: Point2::new(0.0, 0.0),
            primary_down: false,
        }
    }
}

/// Per-frame impulse, consumed by the two force passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impulse {
    pub force: Vector2<f32>,
    // Color added by the color force pass.
    pub tint: [f32; 4],
    // In texture coordinates.
    pub position: Point2<f32>,
    // In domain units.
    pub radius: f32,
}

impl Impulse {
    pub fn none(radius: f32) -> Self {
        Impulse {
            force: Vector2::zero(),
            tint: [0.0; 4],
            position: Point2::new(0.5, 0.5),
            radius,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { previous: Point2<f32> },
}

pub struct ForceInjector {
    state: DragState,
    gain: f32,
    radius: f32,
    tint: [f32; 4],
}

impl ForceInjector {
    pub fn new(config: &ForceConfig) -> Self {
        ForceInjector {
            state: DragState::Idle,
            gain: config.gain,
            radius: config.impulse_radius,
            tint: config.color_tint,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }

    /// Advances the drag state machine by one frame and produces this frame's impulse.
    pub fn update(&mut self, pointer: PointerState, grid: GridGeometry) -> Impulse {
        let (force, dragging) = match (self.state, pointer.primary_down) {
            (DragState::Idle, false) => (Vector2::zero(), false),
            (DragState::Idle, true) => {
                // Pressing alone doesn't push anything, movement starts counting from here.
                self.state = DragState::Dragging {
                    previous: pointer.position,
                };
                (Vector2::zero(), true)
            }
            (DragState::Dragging { previous }, true) => {
                self.state = DragState::Dragging {
                    previous: pointer.position,
                };
                ((pointer.position - previous) * grid.grid_scale() * self.gain, true)
            }
            (DragState::Dragging { .. }, false) => {
                self.state = DragState::Idle;
                (Vector2::zero(), false)
            }
        };

        Impulse {
            force,
            tint: if dragging { self.tint } else { [0.0; 4] },
            position: Point2::new(
                pointer.position.x / grid.width as f32,
                pointer.position.y / grid.height as f32,
            ),
            radius: self.radius,
        }
    }
}
