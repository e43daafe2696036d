//! Morphological conditioning of a probability map: dilate, erode, open,
//! close, box-smooth. All operate on [0,1]-valued `f32` maps and preserve
//! length and value bounds.

use crate::pool::{get_f32, Pooled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    None,
    Dilate,
    Erode,
    Open,
    Close,
    Smooth,
}

#[derive(Debug, Clone, Copy)]
pub struct MorphConfig {
    pub operation: MorphOp,
    pub kernel_size: i32,
    pub iterations: i32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            operation: MorphOp::None,
            kernel_size: 3,
            iterations: 1,
        }
    }
}

fn neighborhood_reduce(
    input: &[f32],
    width: usize,
    height: usize,
    half: i32,
    reduce: impl Fn(f32, f32) -> f32,
    init: f32,
) -> Pooled<f32> {
    let mut out = get_f32(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = init;
            for dy in -half..=half {
                for dx in -half..=half {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    let v = input[ny as usize * width + nx as usize];
                    acc = reduce(acc, v);
                }
            }
            out[y * width + x] = acc;
        }
    }
    out
}

fn dilate_once(input: &[f32], width: usize, height: usize, half: i32) -> Pooled<f32> {
    neighborhood_reduce(input, width, height, half, f32::max, f32::MIN)
}

fn erode_once(input: &[f32], width: usize, height: usize, half: i32) -> Pooled<f32> {
    neighborhood_reduce(input, width, height, half, f32::min, f32::MAX)
}

fn smooth_once(input: &[f32], width: usize, height: usize, half: i32) -> Pooled<f32> {
    let mut out = get_f32(width * height);
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            let mut count = 0u32;
            for dy in -half..=half {
                for dx in -half..=half {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    sum += input[ny as usize * width + nx as usize];
                    count += 1;
                }
            }
            out[y * width + x] = sum / count as f32;
        }
    }
    out
}

/// Apply the configured morphological operation to `prob`. No-op (returns
/// a copy) when `operation` is `None`, `kernel_size <= 0`, or `iterations <= 0`.
pub fn apply_morphology(prob: &[f32], width: usize, height: usize, cfg: &MorphConfig) -> Pooled<f32> {
    let mut current = get_f32(width * height);
    current.copy_from_slice(prob);

    if cfg.operation == MorphOp::None || cfg.kernel_size <= 0 || cfg.iterations <= 0 {
        return current;
    }

    let half = cfg.kernel_size / 2;

    for _ in 0..cfg.iterations {
        let next = match cfg.operation {
            MorphOp::None => unreachable!(),
            MorphOp::Dilate => dilate_once(&current, width, height, half),
            MorphOp::Erode => erode_once(&current, width, height, half),
            MorphOp::Open => {
                let eroded = erode_once(&current, width, height, half);
                dilate_once(&eroded, width, height, half)
            }
            MorphOp::Close => {
                let dilated = dilate_once(&current, width, height, half);
                erode_once(&dilated, width, height, half)
            }
            MorphOp::Smooth => smooth_once(&current, width, height, half),
        };
        current = next;
    }

    current
}
