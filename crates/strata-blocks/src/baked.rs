use crate::face::Face;

/// Model space runs 0..16 along each axis.
pub const MODEL_UNITS: f32 = 16.0;

const PLANE_EPS: f32 = 0.01;

/// Texture key of the degenerate definition used for unresolvable states.
pub const MISSING_TEXTURE: &str = "missing";

/// One quad of a baked block shape. Immutable once baked.
#[derive(Clone, Debug, PartialEq)]
pub struct BakedFace {
    pub pos: [f32; 12],
    pub uv: [f32; 8],
    pub normal: [f32; 3],
    pub tex_key: String,
}

impl BakedFace {
    #[inline]
    pub fn vertex(&self, i: usize) -> [f32; 3] {
        [self.pos[i * 3], self.pos[i * 3 + 1], self.pos[i * 3 + 2]]
    }

    /// The block boundary this face lies on, if any.
    ///
    /// Only axis-aligned faces whose four vertices sit on the 0 or 16 plane of
    /// their normal axis can be hidden by a neighbor; everything else is interior.
    pub fn cull_face(&self) -> Option<Face> {
        let face = Face::from_normal(self.normal)?;
        let plane = if face.is_positive() { MODEL_UNITS } else { 0.0 };
        let axis = face.axis();
        let flush = (0..4).all(|i| (self.pos[i * 3 + axis] - plane).abs() < PLANE_EPS);
        flush.then_some(face)
    }
}

/// Baked geometry for one block state.
#[derive(Clone, Debug, PartialEq)]
pub struct BakedBlockDef {
    pub faces: Vec<BakedFace>,
    /// `[x0,y0,z0,x1,y1,z1]` in model units.
    pub bbox: [f32; 6],
}

impl BakedBlockDef {
    /// Full 16³ cube with the same texture on every side.
    pub fn full_cube(tex_key: &str) -> Self {
        Self::from_cuboids(&[([0.0; 3], [MODEL_UNITS; 3])], |_| tex_key.to_string())
    }

    /// Degenerate single-face stand-in for states nobody could resolve.
    /// The zero-volume bbox means it never hides a neighbor.
    pub fn missing() -> Self {
        let face = cuboid_face(Face::PosY, [0.0; 3], [MODEL_UNITS; 3], MISSING_TEXTURE);
        Self {
            faces: vec![face],
            bbox: [0.0; 6],
        }
    }

    /// Bakes a union of axis-aligned cuboids, six faces each, textured per face.
    pub fn from_cuboids(cuboids: &[([f32; 3], [f32; 3])], mut tex_for: impl FnMut(Face) -> String) -> Self {
        let mut faces = Vec::with_capacity(cuboids.len() * 6);
        let mut bbox = [f32::MAX, f32::MAX, f32::MAX, f32::MIN, f32::MIN, f32::MIN];
        for &(from, to) in cuboids {
            let lo = [from[0].min(to[0]), from[1].min(to[1]), from[2].min(to[2])];
            let hi = [from[0].max(to[0]), from[1].max(to[1]), from[2].max(to[2])];
            for a in 0..3 {
                bbox[a] = bbox[a].min(lo[a]);
                bbox[a + 3] = bbox[a + 3].max(hi[a]);
            }
            for face in Face::ALL {
                faces.push(cuboid_face(face, lo, hi, &tex_for(face)));
            }
        }
        if faces.is_empty() {
            bbox = [0.0; 6];
        }
        Self { faces, bbox }
    }

    /// Two crossed double-sided diagonal planes, as used by plants.
    pub fn cross(tex_key: &str) -> Self {
        const INSET: f32 = 0.8;
        let (lo, hi) = (INSET, MODEL_UNITS - INSET);
        let n = std::f32::consts::FRAC_1_SQRT_2;
        let planes = [
            ([lo, lo], [hi, hi], [n, 0.0, -n]),
            ([lo, hi], [hi, lo], [n, 0.0, n]),
        ];
        let mut faces = Vec::with_capacity(4);
        for (a, b, normal) in planes {
            let quad = [
                [a[0], 0.0, a[1]],
                [b[0], 0.0, b[1]],
                [b[0], MODEL_UNITS, b[1]],
                [a[0], MODEL_UNITS, a[1]],
            ];
            for back in [false, true] {
                let mut pos = [0.0f32; 12];
                let order: [usize; 4] = if back { [0, 3, 2, 1] } else { [0, 1, 2, 3] };
                for (i, &c) in order.iter().enumerate() {
                    pos[i * 3..i * 3 + 3].copy_from_slice(&quad[c]);
                }
                let uv = if back {
                    [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0]
                } else {
                    [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]
                };
                let normal = if back { [-normal[0], 0.0, -normal[2]] } else { normal };
                faces.push(BakedFace {
                    pos,
                    uv,
                    normal,
                    tex_key: tex_key.to_string(),
                });
            }
        }
        Self {
            faces,
            bbox: [lo, 0.0, lo, hi, MODEL_UNITS, hi],
        }
    }

    pub fn is_missing(&self) -> bool {
        self.faces.len() == 1 && self.faces[0].tex_key == MISSING_TEXTURE && self.bbox == [0.0; 6]
    }

    /// True when the bbox spans the whole 16×16 square of `face` and touches its plane,
    /// i.e. the block fully hides whatever sits against that side.
    ///
    /// `bbox` is the union of every element, so a multi-cuboid shape is judged
    /// by its hull. Stairs report their back and side faces as covered even
    /// though part of the side is open, and over-cull the neighbor face there.
    pub fn covers(&self, face: Face) -> bool {
        let axis = face.axis();
        let touches = if face.is_positive() {
            (self.bbox[axis + 3] - MODEL_UNITS).abs() < PLANE_EPS
        } else {
            self.bbox[axis].abs() < PLANE_EPS
        };
        if !touches {
            return false;
        }
        (0..3).filter(|&a| a != axis).all(|a| {
            self.bbox[a].abs() < PLANE_EPS && (self.bbox[a + 3] - MODEL_UNITS).abs() < PLANE_EPS
        })
    }

    /// Six-bit mask of covered sides, bit `Face::index()`.
    pub fn occlusion_mask(&self) -> u8 {
        Face::ALL
            .into_iter()
            .filter(|&f| self.covers(f))
            .fold(0u8, |m, f| m | (1 << f.index()))
    }

    pub fn is_full_cube(&self) -> bool {
        self.occlusion_mask() == 0b11_1111
    }
}

/// Builds one counter-clockwise (seen from outside) quad of the cuboid `lo..hi`.
pub fn cuboid_face(face: Face, lo: [f32; 3], hi: [f32; 3], tex_key: &str) -> BakedFace {
    let [x0, y0, z0] = lo;
    let [x1, y1, z1] = hi;
    let corners: [[f32; 3]; 4] = match face {
        Face::PosY => [[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
        Face::NegY => [[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
        Face::PosX => [[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
        Face::NegX => [[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
        Face::PosZ => [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
        Face::NegZ => [[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
    };
    // Project onto the face plane for UVs, normalized to 0..1.
    let uv_from = |p: [f32; 3]| match face {
        Face::PosY | Face::NegY => (p[0], p[2]),
        Face::PosX | Face::NegX => (p[2], p[1]),
        Face::PosZ | Face::NegZ => (p[0], p[1]),
    };
    let mut pos = [0.0f32; 12];
    let mut uv = [0.0f32; 8];
    for (i, c) in corners.iter().enumerate() {
        pos[i * 3..i * 3 + 3].copy_from_slice(c);
        let (u, v) = uv_from(*c);
        uv[i * 2] = u / MODEL_UNITS;
        uv[i * 2 + 1] = v / MODEL_UNITS;
    }
    BakedFace {
        pos,
        uv,
        normal: face.normal(),
        tex_key: tex_key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    #[test]
    fn cube_faces_wind_outward() {
        let def = BakedBlockDef::full_cube("stone");
        assert_eq!(def.faces.len(), 6);
        for f in &def.faces {
            let v0 = f.vertex(0);
            let v1 = f.vertex(1);
            let v2 = f.vertex(2);
            let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
            let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
            let c = cross(e1, e2);
            let d = c[0] * f.normal[0] + c[1] * f.normal[1] + c[2] * f.normal[2];
            assert!(d > 0.0, "face {:?} winds inward", f.normal);
            assert!(f.cull_face().is_some());
        }
        assert!(def.is_full_cube());
        assert_eq!(def.occlusion_mask(), 0b11_1111);
    }

    #[test]
    fn bottom_slab_covers_only_its_bottom() {
        let def = BakedBlockDef::from_cuboids(&[([0.0; 3], [16.0, 8.0, 16.0])], |_| "oak".into());
        assert!(def.covers(Face::NegY));
        assert!(!def.covers(Face::PosY));
        assert!(!def.covers(Face::PosX));
        // Top quad sits at y=8: interior, never culled.
        let top = def.faces.iter().find(|f| f.normal == [0.0, 1.0, 0.0]).unwrap();
        assert_eq!(top.cull_face(), None);
        // Sides still lie on the boundary planes.
        let east = def.faces.iter().find(|f| f.normal == [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(east.cull_face(), Some(Face::PosX));
    }

    #[test]
    fn cross_faces_are_interior() {
        let def = BakedBlockDef::cross("grass");
        assert_eq!(def.faces.len(), 4);
        assert!(def.faces.iter().all(|f| f.cull_face().is_none()));
        assert_eq!(def.occlusion_mask(), 0);
    }

    #[test]
    fn missing_definition_never_occludes() {
        let def = BakedBlockDef::missing();
        assert_eq!(def.faces.len(), 1);
        assert!(def.is_missing());
        assert_eq!(def.occlusion_mask(), 0);
    }
}
