use std::collections::HashMap;

use nalgebra::Vector3;

use crate::error::Error;

/// Integer coordinates of a block in the layer.
pub type BlockIndex = Vector3<i32>;
/// Integer coordinates of a voxel in the whole layer.
pub type GlobalIndex = Vector3<i64>;
/// Coordinates of a voxel inside its block, each in `[0, voxels_per_side)`.
pub type LocalIndex = Vector3<usize>;

/// Cubic block of voxels.
#[derive(Debug, Clone)]
pub struct Block<V> {
    voxels: Vec<V>,
    voxels_per_side: usize,
    voxel_size: f32,
    origin: Vector3<f32>,
    /// Set when the voxels changed since the last meshing.
    pub updated: bool,
}

impl<V: Default + Clone> Block<V> {
    pub fn new(origin: Vector3<f32>, voxels_per_side: usize, voxel_size: f32) -> Self {
        Self {
            voxels: vec![V::default(); voxels_per_side * voxels_per_side * voxels_per_side],
            voxels_per_side,
            voxel_size,
            origin,
            updated: false,
        }
    }
}

impl<V> Block<V> {
    pub fn origin(&self) -> Vector3<f32> {
        self.origin
    }

    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn num_voxels(&self) -> usize {
        self.voxels.len()
    }

    fn linear_index(&self, local: &LocalIndex) -> usize {
        local[0] + self.voxels_per_side * (local[1] + self.voxels_per_side * local[2])
    }

    /// Inverse of the x-fastest linear layout.
    pub fn local_index(&self, linear: usize) -> LocalIndex {
        let vps = self.voxels_per_side;
        Vector3::new(linear % vps, (linear / vps) % vps, linear / (vps * vps))
    }

    pub fn voxel(&self, local: &LocalIndex) -> &V {
        &self.voxels[self.linear_index(local)]
    }

    pub fn voxel_mut(&mut self, local: &LocalIndex) -> &mut V {
        let index = self.linear_index(local);
        &mut self.voxels[index]
    }

    /// Center of a voxel in world coordinates.
    pub fn voxel_center(&self, local: &LocalIndex) -> Vector3<f32> {
        self.origin + (local.map(|c| c as f32) + Vector3::repeat(0.5)) * self.voxel_size
    }

    /// Iterates over `(local index, voxel)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (LocalIndex, &V)> + '_ {
        self.voxels
            .iter()
            .enumerate()
            .map(move |(i, voxel)| (self.local_index(i), voxel))
    }
}

/// Sparse voxel grid made of blocks.
#[derive(Debug, Clone)]
pub struct Layer<V> {
    voxel_size: f32,
    voxels_per_side: usize,
    block_size: f32,
    blocks: HashMap<BlockIndex, Block<V>>,
}

impl<V: Default + Clone> Layer<V> {
    /// Creates an empty layer.
    ///
    /// # Arguments
    ///
    /// * `voxel_size` - Edge length of a voxel in meters, must be positive.
    /// * `voxels_per_side` - Voxels along each block edge, must not be zero.
    pub fn new(voxel_size: f32, voxels_per_side: usize) -> Result<Self, Error> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Voxel size must be positive, got {voxel_size}"
            )));
        }
        if voxels_per_side == 0 {
            return Err(Error::invalid_parameter("Voxels per side must not be zero"));
        }

        Ok(Self {
            voxel_size,
            voxels_per_side,
            block_size: voxel_size * voxels_per_side as f32,
            blocks: HashMap::new(),
        })
    }

    /// Gets the block at `index`, allocating it with default voxels if missing.
    pub fn allocate_block(&mut self, index: &BlockIndex) -> &mut Block<V> {
        let origin = index.map(|c| c as f32) * self.block_size;
        let (voxels_per_side, voxel_size) = (self.voxels_per_side, self.voxel_size);
        self.blocks
            .entry(*index)
            .or_insert_with(|| Block::new(origin, voxels_per_side, voxel_size))
    }

    /// Mutable voxel access by global index, allocating the containing block.
    pub fn allocate_voxel(&mut self, global: &GlobalIndex) -> &mut V {
        let (block_index, local) = self.split_global_index(global);
        self.allocate_block(&block_index).voxel_mut(&local)
    }
}

impl<V> Layer<V> {
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Edge length of a block in meters.
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, index: &BlockIndex) -> Option<&Block<V>> {
        self.blocks.get(index)
    }

    pub fn block_mut(&mut self, index: &BlockIndex) -> Option<&mut Block<V>> {
        self.blocks.get_mut(index)
    }

    /// Iterates over allocated blocks in arbitrary order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockIndex, &Block<V>)> {
        self.blocks.iter()
    }

    /// Whether both layers share voxel size and block layout.
    pub fn has_same_geometry<U>(&self, other: &Layer<U>) -> bool {
        self.voxels_per_side == other.voxels_per_side
            && (self.voxel_size - other.voxel_size).abs() <= f32::EPSILON * self.voxel_size
    }

    /// Splits a global voxel index into block index and index inside the block.
    pub fn split_global_index(&self, global: &GlobalIndex) -> (BlockIndex, LocalIndex) {
        let vps = self.voxels_per_side as i64;
        let block = global.map(|c| c.div_euclid(vps) as i32);
        let local = global.map(|c| c.rem_euclid(vps) as usize);
        (block, local)
    }

    pub fn global_index(&self, block: &BlockIndex, local: &LocalIndex) -> GlobalIndex {
        let vps = self.voxels_per_side as i64;
        block.map(|c| c as i64) * vps + local.map(|c| c as i64)
    }

    /// Voxel at a global index, `None` when its block was never allocated.
    pub fn voxel_by_global_index(&self, global: &GlobalIndex) -> Option<&V> {
        let (block_index, local) = self.split_global_index(global);
        self.blocks
            .get(&block_index)
            .map(|block| block.voxel(&local))
    }

    pub fn voxel_by_global_index_mut(&mut self, global: &GlobalIndex) -> Option<&mut V> {
        let (block_index, local) = self.split_global_index(global);
        self.blocks
            .get_mut(&block_index)
            .map(|block| block.voxel_mut(&local))
    }
}
