use strum_macros::{EnumCount, EnumIter};

// The three ping-pong pairs. Every pair owns two physical textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum FieldPair {
    Velocity,
    Pressure,
    Color,
}

// Which of the two textures of a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum Member {
    A,
    B,
}

impl Member {
    pub fn other(self) -> Member {
        match self {
            Member::A => Member::B,
            Member::B => Member::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Member::A => 0,
            Member::B => 1,
        }
    }

    /// Member holding the last write after `iterations` ping-pong passes that started by reading `self`.
    pub fn after_ping_pong(self, iterations: u32) -> Member {
        let mut member = self;
        for _ in 0..iterations {
            member = member.other();
        }
        member
    }
}

/// One of the six physical field textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub pair: FieldPair,
    pub member: Member,
}

impl SlotId {
    pub const COUNT: usize = 6;

    pub fn new(pair: FieldPair, member: Member) -> Self {
        SlotId { pair, member }
    }

    pub fn index(self) -> usize {
        self.pair as usize * 2 + self.member.index()
    }

    // The other texture of the same pair.
    pub fn partner(self) -> SlotId {
        SlotId::new(self.pair, self.member.other())
    }

    pub fn label(self) -> &'static str {
        match (self.pair, self.member) {
            (FieldPair::Velocity, Member::A) => "Field: Velocity A",
            (FieldPair::Velocity, Member::B) => "Field: Velocity B",
            (FieldPair::Pressure, Member::A) => "Field: Pressure A",
            (FieldPair::Pressure, Member::B) => "Field: Pressure B",
            (FieldPair::Color, Member::A) => "Field: Color A",
            (FieldPair::Color, Member::B) => "Field: Color B",
        }
    }

    pub fn all() -> impl Iterator<Item = SlotId> {
        use strum::IntoEnumIterator;
        FieldPair::iter().flat_map(|pair| Member::iter().map(move |member| SlotId::new(pair, member)))
    }
}

/// Logical meaning a physical slot can take on during a step.
///
/// Divergence has no storage of its own, it borrows whichever velocity texture is not holding the current velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum FieldRole {
    Velocity,
    Divergence,
    Pressure,
    Color,
}

/// Tagged arena mapping logical roles onto the physical slots.
///
/// Two roles may never occupy the same slot at the same time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleMap {
    slots: [Option<SlotId>; <FieldRole as strum::EnumCount>::COUNT],
}

impl RoleMap {
    pub fn new() -> Self {
        RoleMap {
            slots: [None; <FieldRole as strum::EnumCount>::COUNT],
        }
    }

    pub fn from_state(state: SimulationState) -> Self {
        let mut roles = RoleMap::new();
        roles.assign(FieldRole::Velocity, SlotId::new(FieldPair::Velocity, state.velocity));
        roles.assign(FieldRole::Pressure, SlotId::new(FieldPair::Pressure, state.pressure));
        roles.assign(FieldRole::Color, SlotId::new(FieldPair::Color, state.color));
        roles
    }

    pub fn slot(&self, role: FieldRole) -> SlotId {
        match self.slots[role as usize] {
            Some(slot) => slot,
            None => panic!("field role {:?} is not mapped to any slot", role),
        }
    }

    pub fn holder(&self, slot: SlotId) -> Option<FieldRole> {
        use strum::IntoEnumIterator;
        FieldRole::iter().find(|role| self.slots[*role as usize] == Some(slot))
    }

    // Moves a role onto a slot. The slot has to be free or already held by the same role.
    pub fn assign(&mut self, role: FieldRole, slot: SlotId) {
        if let Some(holder) = self.holder(slot) {
            assert_eq!(holder, role, "{:?} would alias {:?} on {:?}", role, holder, slot);
        }
        self.slots[role as usize] = Some(slot);
    }

    pub fn release(&mut self, role: FieldRole) -> Option<SlotId> {
        self.slots[role as usize].take()
    }

    /// Snapshot of the per-pair current members.
    pub fn state(&self) -> SimulationState {
        SimulationState {
            velocity: self.slot(FieldRole::Velocity).member,
            pressure: self.slot(FieldRole::Pressure).member,
            color: self.slot(FieldRole::Color).member,
        }
    }
}

/// The only state that survives between frames: which member of each pair is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationState {
    pub velocity: Member,
    pub pressure: Member,
    pub color: Member,
}

impl Default for SimulationState {
    fn default() -> Self {
        SimulationState {
            velocity: Member::A,
            pressure: Member::A,
            color: Member::A,
        }
    }
}

/// Simulation grid, always equal to the output surface resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub width: u32,
    pub height: u32,
}

impl GridGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "grid must not be empty");
        GridGeometry { width, height }
    }

    pub fn num_cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// dx, the size of a cell with the longest grid side normalized to one.
    pub fn grid_scale(&self) -> f32 {
        1.0 / self.width.max(self.height) as f32
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    // Size of the grid in domain units (the longer side is 1).
    pub fn domain_extent(&self) -> [f32; 2] {
        let dx = self.grid_scale();
        [self.width as f32 * dx, self.height as f32 * dx]
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}
