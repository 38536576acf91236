//! Blue noise tiles for SDR dithering.
//!
//! Tiles are generated once at renderer init with the void-and-cluster
//! method on a toroidal grid, so they tile seamlessly. Each tile holds every
//! rank exactly once, remapped to `(rank + 0.5) / n`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

/// Tile edge, in texels.
pub const BLUE_NOISE_RES: usize = 32;
/// Number of tiles; the kernel cycles through them by frame number.
pub const BLUE_NOISE_TILES: usize = 8;

const TILE_TEXELS: usize = BLUE_NOISE_RES * BLUE_NOISE_RES;

/// Gaussian energy filter radius.
const SIGMA: f32 = 1.5;
/// Share of texels set in the initial binary pattern.
const INITIAL_DENSITY: f32 = 0.1;

/// Per-channel texel offsets so R, G and B draw decorrelated values.
const CHANNEL_OFFSETS: [(usize, usize); 3] = [(0, 0), (11, 19), (23, 7)];

pub struct BlueNoise {
    tiles: Vec<f32>,
}

impl BlueNoise {
    /// Generate all tiles in parallel. The same seed always yields the same
    /// tiles.
    pub fn generate(seed: u64) -> Self {
        let tiles: Vec<Vec<f32>> = (0..BLUE_NOISE_TILES)
            .into_par_iter()
            .map(|t| void_and_cluster(seed.wrapping_add(t as u64)))
            .collect();
        Self {
            tiles: tiles.concat(),
        }
    }

    /// Noise value in (0, 1) for pixel (x, y) and color channel `channel`.
    #[inline]
    pub fn sample(&self, frame_num: u32, x: u32, y: u32, channel: usize) -> f32 {
        let tile = frame_num as usize % BLUE_NOISE_TILES;
        let (ox, oy) = CHANNEL_OFFSETS[channel % 3];
        let tx = (x as usize + ox) % BLUE_NOISE_RES;
        let ty = (y as usize + oy) % BLUE_NOISE_RES;
        self.tiles[tile * TILE_TEXELS + ty * BLUE_NOISE_RES + tx]
    }

    /// Tile-major float view, as bound at `BINDING_BLUE_NOISE`.
    pub fn as_floats(&self) -> &[f32] {
        &self.tiles
    }
}

// ============================================================
// Void and cluster
// ============================================================

struct EnergyField {
    lut: Vec<f32>,
    energy: Vec<f32>,
    set: Vec<bool>,
}

impl EnergyField {
    fn new() -> Self {
        let mut lut = vec![0.0; TILE_TEXELS];
        let half = BLUE_NOISE_RES as i32 / 2;
        for y in 0..BLUE_NOISE_RES {
            for x in 0..BLUE_NOISE_RES {
                // Toroidal distance
                let mut dx = x as i32;
                let mut dy = y as i32;
                if dx > half {
                    dx -= BLUE_NOISE_RES as i32;
                }
                if dy > half {
                    dy -= BLUE_NOISE_RES as i32;
                }
                let d2 = (dx * dx + dy * dy) as f32;
                lut[y * BLUE_NOISE_RES + x] = (-d2 / (2.0 * SIGMA * SIGMA)).exp();
            }
        }
        Self {
            lut,
            energy: vec![0.0; TILE_TEXELS],
            set: vec![false; TILE_TEXELS],
        }
    }

    fn splat(&mut self, idx: usize, sign: f32) {
        let px = idx % BLUE_NOISE_RES;
        let py = idx / BLUE_NOISE_RES;
        for y in 0..BLUE_NOISE_RES {
            let dy = (y + BLUE_NOISE_RES - py) % BLUE_NOISE_RES;
            for x in 0..BLUE_NOISE_RES {
                let dx = (x + BLUE_NOISE_RES - px) % BLUE_NOISE_RES;
                self.energy[y * BLUE_NOISE_RES + x] += sign * self.lut[dy * BLUE_NOISE_RES + dx];
            }
        }
    }

    fn insert(&mut self, idx: usize) {
        self.set[idx] = true;
        self.splat(idx, 1.0);
    }

    fn remove(&mut self, idx: usize) {
        self.set[idx] = false;
        self.splat(idx, -1.0);
    }

    /// Set texel with the highest energy.
    fn tightest_cluster(&self) -> usize {
        let mut best = 0;
        let mut best_e = f32::MIN;
        for i in 0..TILE_TEXELS {
            if self.set[i] && self.energy[i] > best_e {
                best_e = self.energy[i];
                best = i;
            }
        }
        best
    }

    /// Unset texel with the lowest energy.
    fn largest_void(&self) -> usize {
        let mut best = 0;
        let mut best_e = f32::MAX;
        for i in 0..TILE_TEXELS {
            if !self.set[i] && self.energy[i] < best_e {
                best_e = self.energy[i];
                best = i;
            }
        }
        best
    }
}

fn void_and_cluster(seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ones = ((TILE_TEXELS as f32 * INITIAL_DENSITY) as usize).max(1);

    // Random initial pattern
    let mut order: Vec<usize> = (0..TILE_TEXELS).collect();
    order.shuffle(&mut rng);
    let mut field = EnergyField::new();
    for &idx in &order[..ones] {
        field.insert(idx);
    }

    // Relax: move the tightest cluster into the largest void until stable
    for _ in 0..TILE_TEXELS {
        let cluster = field.tightest_cluster();
        field.remove(cluster);
        let void = field.largest_void();
        field.insert(void);
        if void == cluster {
            break;
        }
    }
    let initial_set = field.set.clone();
    let initial_energy = field.energy.clone();

    let mut rank = vec![0usize; TILE_TEXELS];

    // Ranks below the initial count: peel clusters off a copy
    for r in (0..ones).rev() {
        let cluster = field.tightest_cluster();
        field.remove(cluster);
        rank[cluster] = r;
    }

    // Remaining ranks: fill voids from the initial pattern
    field.set = initial_set;
    field.energy = initial_energy;
    for r in ones..TILE_TEXELS {
        let void = field.largest_void();
        field.insert(void);
        rank[void] = r;
    }

    rank.iter()
        .map(|&r| (r as f32 + 0.5) / TILE_TEXELS as f32)
        .collect()
}
