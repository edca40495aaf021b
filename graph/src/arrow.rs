//! Shared small types used by both the pad model and the step graph.

index_vec::define_index_type! {
    /// The index of an arrow (lane) on the pad.
    pub struct ArrowIdx = usize;
}

/// Which foot a step is performed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Foot {
    Left,
    Right,
}

impl Foot {
    pub const ALL: [Foot; 2] = [Foot::Left, Foot::Right];

    /// The other foot.
    pub fn other(self) -> Foot {
        match self {
            Foot::Left => Foot::Right,
            Foot::Right => Foot::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Foot::Left => 0,
            Foot::Right => 1,
        }
    }
}

/// Which part of a foot is resting on an arrow. Only distinct from the
/// other portion of the same foot when the foot is bracketing two arrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Portion {
    Heel,
    Toe,
}

impl Portion {
    pub const ALL: [Portion; 2] = [Portion::Heel, Portion::Toe];

    pub fn index(self) -> usize {
        match self {
            Portion::Heel => 0,
            Portion::Toe => 1,
        }
    }
}
