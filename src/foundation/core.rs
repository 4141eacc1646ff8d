#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn component(self, idx: usize) -> f64 {
        match idx {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Copy with `dz` added to the z component.
    pub fn offset_z(self, dz: f64) -> Self {
        Self {
            z: self.z + dz,
            ..self
        }
    }

    /// Space-separated components with three decimals, the engine's vector attribute form.
    pub fn to_attribute(self) -> String {
        format!("{:.3} {:.3} {:.3}", self.x, self.y, self.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
