use serde::{Deserialize, Serialize};

/// Cost multiplier for a diagonal step and the octile heuristic.
pub const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagonalPassing {
    None,
    Always,
    /// Diagonal only when neither orthogonal corner is blocked.
    NoCornerCut,
    /// Diagonal unless both orthogonal corners are blocked.
    AllowOneCornerObstacle,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Offset(pub i32, pub i32);

impl Offset {
    pub fn is_diagonal(self) -> bool {
        self.0 != 0 && self.1 != 0
    }
}

// Fixed enumeration order; flow-direction ties resolve to the earliest entry.
pub const CARDINALS: [Offset; 4] = [Offset(0, 1), Offset(0, -1), Offset(1, 0), Offset(-1, 0)];
pub const DIAGONALS: [Offset; 4] = [Offset(1, 1), Offset(1, -1), Offset(-1, 1), Offset(-1, -1)];
const ALL: [Offset; 8] = [
    Offset(0, 1), Offset(0, -1), Offset(1, 0), Offset(-1, 0),
    Offset(1, 1), Offset(1, -1), Offset(-1, 1), Offset(-1, -1),
];

#[derive(Copy, Clone, Debug)]
pub struct MovementPolicy {
    pub diagonal: DiagonalPassing,
}

impl Default for MovementPolicy {
    fn default() -> Self {
        Self { diagonal: DiagonalPassing::NoCornerCut }
    }
}

impl MovementPolicy {
    pub fn new(diagonal: DiagonalPassing) -> Self {
        Self { diagonal }
    }

    pub fn allows_diagonals(&self) -> bool {
        self.diagonal != DiagonalPassing::None
    }

    pub fn neighbor_offsets(&self) -> &'static [Offset] {
        if self.allows_diagonals() { &ALL } else { &CARDINALS }
    }

    /// Decides a diagonal step given whether each orthogonal corner is blocked.
    pub fn diagonal_permitted(&self, corner_a_blocked: bool, corner_b_blocked: bool) -> bool {
        match self.diagonal {
            DiagonalPassing::None => false,
            DiagonalPassing::Always => true,
            DiagonalPassing::NoCornerCut => !corner_a_blocked && !corner_b_blocked,
            DiagonalPassing::AllowOneCornerObstacle => !(corner_a_blocked && corner_b_blocked),
        }
    }
}
