// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Separable 2D Haar wavelet transform with averaging normalization.
//!
//! The forward transform fully decomposes every row, then every column, with
//! `a = (x0 + x1) / 2` and `d = (x0 - x1) / 2`. Coefficients are stored
//! coarse-to-fine, so the top-left `cw x ch` block of a decomposed image is
//! the decomposition of the image box-downsampled to `cw x ch`.
//!
//! All lengths must be powers of two.

/// Full 1D decomposition of `data` in place. `scratch` must be at least as long.
pub fn forward_1d(data: &mut [f32], scratch: &mut [f32]) {
    debug_assert!(data.len().is_power_of_two() || data.is_empty());
    let mut n = data.len();
    while n > 1 {
        let half = n / 2;
        for i in 0..half {
            let (x0, x1) = (data[2 * i], data[2 * i + 1]);
            scratch[i] = (x0 + x1) * 0.5;
            scratch[half + i] = (x0 - x1) * 0.5;
        }
        data[..n].copy_from_slice(&scratch[..n]);
        n = half;
    }
}

/// Inverse of [`forward_1d`].
pub fn inverse_1d(data: &mut [f32], scratch: &mut [f32]) {
    debug_assert!(data.len().is_power_of_two() || data.is_empty());
    let mut n = 2;
    while n <= data.len() {
        let half = n / 2;
        for i in 0..half {
            let (a, d) = (data[i], data[half + i]);
            scratch[2 * i] = a + d;
            scratch[2 * i + 1] = a - d;
        }
        data[..n].copy_from_slice(&scratch[..n]);
        n *= 2;
    }
}

fn for_each_column(data: &mut [f32], width: usize, height: usize, f: impl Fn(&mut [f32], &mut [f32])) {
    let mut column = vec![0.0; height];
    let mut scratch = vec![0.0; height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        f(&mut column, &mut scratch);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }
}

/// Forward 2D transform of a row-major `width x height` image, in place.
pub fn forward_2d(data: &mut [f32], width: usize, height: usize) {
    debug_assert_eq!(data.len(), width * height);
    let mut scratch = vec![0.0; width];
    for row in data.chunks_exact_mut(width) {
        forward_1d(row, &mut scratch);
    }
    for_each_column(data, width, height, forward_1d);
}

/// Inverse 2D transform of a row-major `width x height` block, in place.
pub fn inverse_2d(data: &mut [f32], width: usize, height: usize) {
    debug_assert_eq!(data.len(), width * height);
    for_each_column(data, width, height, inverse_1d);
    let mut scratch = vec![0.0; width];
    for row in data.chunks_exact_mut(width) {
        inverse_1d(row, &mut scratch);
    }
}

/// Keeps the top-left `coef_width x coef_height` coefficients.
pub fn truncate(data: &[f32], width: usize, coef_width: usize, coef_height: usize) -> Vec<f32> {
    let mut block = Vec::with_capacity(coef_width * coef_height);
    for row in data.chunks_exact(width).take(coef_height) {
        block.extend_from_slice(&row[..coef_width]);
    }
    block
}

/// Places a coefficient block in the top-left corner of a zeroed
/// `width x height` image.
pub fn expand(block: &[f32], coef_width: usize, width: usize, height: usize) -> Vec<f32> {
    let mut data = vec![0.0; width * height];
    for (y, row) in block.chunks_exact(coef_width).enumerate() {
        data[y * width..y * width + coef_width].copy_from_slice(row);
    }
    data
}

/// Averages `width x height` values down to `out_width x out_height` cells.
pub fn box_downsample(
    data: &[f32],
    width: usize,
    height: usize,
    out_width: usize,
    out_height: usize,
) -> Vec<f32> {
    let (cell_w, cell_h) = (width / out_width, height / out_height);
    let norm = 1.0 / (cell_w * cell_h) as f32;
    let mut out = vec![0.0; out_width * out_height];
    for y in 0..height {
        for x in 0..width {
            out[(y / cell_h) * out_width + x / cell_w] += data[y * width + x];
        }
    }
    out.iter_mut().for_each(|v| *v *= norm);
    out
}

/// Per-channel [`box_downsample`] of an RGBA image.
pub fn box_downsample_rgba(
    data: &[[f32; 4]],
    width: usize,
    height: usize,
    out_width: usize,
    out_height: usize,
) -> Vec<[f32; 4]> {
    let (cell_w, cell_h) = (width / out_width, height / out_height);
    let norm = 1.0 / (cell_w * cell_h) as f32;
    let mut out = vec![[0.0; 4]; out_width * out_height];
    for y in 0..height {
        for x in 0..width {
            let cell = &mut out[(y / cell_h) * out_width + x / cell_w];
            for (acc, v) in cell.iter_mut().zip(data[y * width + x]) {
                *acc += v;
            }
        }
    }
    for cell in &mut out {
        cell.iter_mut().for_each(|v| *v *= norm);
    }
    out
}
