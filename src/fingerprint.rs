//! DCT-based perceptual fingerprint.
//!
//! A card image is reduced to luma, area-averaged down to a small square
//! grid, transformed with a 2-D DCT-II, and the 64 lowest-frequency AC
//! coefficients (zig-zag order, DC skipped) are thresholded against their
//! median. Bit 0 is the most significant bit of the packed `u64`.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ScanError;

/// Number of bits in a fingerprint
pub const FINGERPRINT_BITS: usize = 64;

/// Default side of the downscaled grid fed to the DCT
pub const DEFAULT_GRID_SIZE: u32 = 32;

/// Smallest grid whose first 11 anti-diagonals hold 64 AC coefficients
pub const MIN_GRID_SIZE: u32 = 11;

const HEX_LEN: usize = FINGERPRINT_BITS / 4;

/// Fixed-length perceptual fingerprint, compared by Hamming distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Value of bit `i`, counted from the most significant end
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < FINGERPRINT_BITS);
        (self.0 >> (FINGERPRINT_BITS - 1 - i)) & 1 == 1
    }

    /// Number of differing bit positions
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Fixed-width lowercase hexadecimal form (16 digits)
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ScanError> {
        if s.len() != HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ScanError::InvalidFingerprint(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ScanError::InvalidFingerprint(s.to_string()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes fingerprints from raster images
#[derive(Debug, Clone, Copy)]
pub struct FingerprintEngine {
    grid_size: u32,
}

impl FingerprintEngine {
    pub fn new(grid_size: u32) -> Result<Self, ScanError> {
        if grid_size < MIN_GRID_SIZE {
            return Err(ScanError::InvalidConfig(format!(
                "fingerprint grid size must be at least {}, got {}",
                MIN_GRID_SIZE, grid_size
            )));
        }
        Ok(Self { grid_size })
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn compute(&self, img: &DynamicImage) -> Fingerprint {
        self.compute_gray(&img.to_luma8())
    }

    pub fn compute_gray(&self, gray: &GrayImage) -> Fingerprint {
        let n = self.grid_size as usize;
        let grid = area_resize(gray, self.grid_size, self.grid_size);
        let coeffs = dct_2d(&grid, n);

        let low: Vec<f64> = zigzag(n)
            .into_iter()
            .skip(1) // DC
            .take(FINGERPRINT_BITS)
            .map(|(row, col)| coeffs[row * n + col])
            .collect();
        let med = median(&low);

        let bits = low
            .iter()
            .fold(0u64, |acc, &c| (acc << 1) | u64::from(c > med));
        Fingerprint(bits)
    }
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

/// Downscale by exact area averaging: each output cell is the
/// coverage-weighted mean of the source pixels under it. Row-major output.
pub fn area_resize(gray: &GrayImage, width: u32, height: u32) -> Vec<f64> {
    let (src_w, src_h) = gray.dimensions();
    if src_w == 0 || src_h == 0 {
        return vec![0.0; (width * height) as usize];
    }
    let col_weights = area_weights(src_w, width);
    let row_weights = area_weights(src_h, height);

    let mut out = Vec::with_capacity((width * height) as usize);
    for rows in &row_weights {
        for cols in &col_weights {
            let mut acc = 0.0;
            for &(sy, wy) in rows {
                for &(sx, wx) in cols {
                    acc += wy * wx * gray.get_pixel(sx as u32, sy as u32)[0] as f64;
                }
            }
            out.push(acc);
        }
    }
    out
}

/// Per output index, the source indices it covers and their normalized weights
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(usize, f64)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src as usize {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    weights.push((s, (hi - lo) / scale));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

/// Unnormalized separable DCT-II of an `n`×`n` row-major grid
pub fn dct_2d(grid: &[f64], n: usize) -> Vec<f64> {
    assert_eq!(grid.len(), n * n, "grid must be n*n");

    let basis: Vec<f64> = (0..n)
        .flat_map(|k| {
            (0..n).map(move |i| {
                (std::f64::consts::PI / n as f64 * (i as f64 + 0.5) * k as f64).cos()
            })
        })
        .collect();

    // rows
    let mut tmp = vec![0.0; n * n];
    for r in 0..n {
        let row = &grid[r * n..(r + 1) * n];
        for k in 0..n {
            let b = &basis[k * n..(k + 1) * n];
            tmp[r * n + k] = row.iter().zip(b).map(|(x, c)| x * c).sum();
        }
    }

    // columns
    let mut out = vec![0.0; n * n];
    for c in 0..n {
        for k in 0..n {
            let b = &basis[k * n..(k + 1) * n];
            out[k * n + c] = (0..n).map(|r| tmp[r * n + c] * b[r]).sum();
        }
    }
    out
}

/// JPEG-style zig-zag traversal of an `n`×`n` grid as (row, col) pairs
pub fn zigzag(n: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(n * n);
    for s in 0..(2 * n).saturating_sub(1) {
        let lo = s.saturating_sub(n - 1);
        let hi = s.min(n - 1);
        if s % 2 == 1 {
            for row in lo..=hi {
                order.push((row, s - row));
            }
        } else {
            for row in (lo..=hi).rev() {
                order.push((row, s - row));
            }
        }
    }
    order
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
