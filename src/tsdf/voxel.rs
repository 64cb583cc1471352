use serde_derive::{Deserialize, Serialize};

/// Voxels with a weight at or below this were never observed.
pub const MIN_OBSERVED_WEIGHT: f32 = 1e-6;

/// RGBA color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Truncated signed distance voxel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TsdfVoxel {
    /// Signed distance to the closest surface, negative behind it.
    pub distance: f32,
    /// Accumulated integration weight.
    pub weight: f32,
    pub color: Color,
}

impl TsdfVoxel {
    pub fn new(distance: f32, weight: f32, color: Color) -> Self {
        Self {
            distance,
            weight,
            color,
        }
    }

    /// Whether any measurement was integrated into the voxel.
    pub fn is_observed(&self) -> bool {
        self.weight > MIN_OBSERVED_WEIGHT
    }
}
