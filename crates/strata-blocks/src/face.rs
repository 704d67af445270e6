use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Face {
    PosY = 0,
    NegY = 1,
    PosX = 2,
    NegX = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosY,
        Face::NegY,
        Face::PosX,
        Face::NegX,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Returns the `[0..6)` index of this face.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Converts a face index `[0..6)` back into a `Face` value.
    #[inline]
    pub fn from_index(i: usize) -> Option<Face> {
        Face::ALL.get(i).copied()
    }

    /// Returns the unit-normal vector for this face.
    #[inline]
    pub fn normal(self) -> [f32; 3] {
        let (dx, dy, dz) = self.delta();
        [dx as f32, dy as f32, dz as f32]
    }

    /// Returns the integer grid delta `(dx,dy,dz)` when stepping out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::PosY => (0, 1, 0),
            Face::NegY => (0, -1, 0),
            Face::PosX => (1, 0, 0),
            Face::NegX => (-1, 0, 0),
            Face::PosZ => (0, 0, 1),
            Face::NegZ => (0, 0, -1),
        }
    }

    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::PosY => Face::NegY,
            Face::NegY => Face::PosY,
            Face::PosX => Face::NegX,
            Face::NegX => Face::PosX,
            Face::PosZ => Face::NegZ,
            Face::NegZ => Face::PosZ,
        }
    }

    /// Axis index (0 = x, 1 = y, 2 = z) this face is perpendicular to.
    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Face::PosX | Face::NegX => 0,
            Face::PosY | Face::NegY => 1,
            Face::PosZ | Face::NegZ => 2,
        }
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        matches!(self, Face::PosX | Face::PosY | Face::PosZ)
    }

    /// Maps an axis-aligned unit normal back to its face. Non-axis normals yield `None`.
    pub fn from_normal(n: [f32; 3]) -> Option<Face> {
        let dx = n[0].round() as i32;
        let dy = n[1].round() as i32;
        let dz = n[2].round() as i32;
        if dx.abs() + dy.abs() + dz.abs() != 1 {
            return None;
        }
        Face::ALL.into_iter().find(|f| f.delta() == (dx, dy, dz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involution_and_negates_delta() {
        for f in Face::ALL {
            assert_eq!(f.opposite().opposite(), f);
            let (dx, dy, dz) = f.delta();
            assert_eq!(f.opposite().delta(), (-dx, -dy, -dz));
            assert_eq!(Face::from_index(f.index()), Some(f));
            assert_eq!(Face::from_normal(f.normal()), Some(f));
        }
        assert_eq!(Face::from_index(6), None);
        assert_eq!(Face::from_normal([0.7, 0.7, 0.0]), None);
    }
}
