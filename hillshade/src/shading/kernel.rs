//! Default per-element shade kernel.
//!
//! Computes one greyscale byte per unit element from the 2×2 elevation
//! window, lit from the northwest. The kernel also owns the output
//! layout for the three resolution modes: identity, 2× super-sampling
//! (each element expands into a factor² block) and divisor sub-sampling
//! (one representative element per divisor² block).

use crate::pipeline::{ComputingParams, UnitKernel};

/// Linear gradient shade kernel, built per render.
pub struct LinearShadeKernel {
    factor: i32,
    /// Hill shading magnitude; higher exaggerates relief.
    magnitude: f64,
}

impl LinearShadeKernel {
    pub fn new(factor: i32) -> Self {
        Self {
            factor,
            magnitude: 1.0,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }

    /// Shade byte for one unit element: the slope towards a northwest
    /// light source, normalised into `0..=255` with flat terrain at 128.
    fn shade_value(&self, nw: f64, sw: f64, se: f64, ne: f64, metres_per_element: f64) -> u8 {
        let metres = metres_per_element.max(1.0);
        let east_gradient = ((ne + se) - (nw + sw)) * 0.5 / metres;
        let south_gradient = ((sw + se) - (nw + ne)) * 0.5 / metres;

        let norm = (1.0 + east_gradient * east_gradient + south_gradient * south_gradient).sqrt();
        let light = (south_gradient - east_gradient) * self.magnitude / (norm * 2f64.sqrt());

        let shade = 0.5 + 0.5 * light;
        (shade.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl UnitKernel for LinearShadeKernel {
    fn process_unit_element(
        &self,
        nw: f64,
        sw: f64,
        se: f64,
        ne: f64,
        metres_per_element: f64,
        out_ix: usize,
        line: usize,
        col: usize,
        params: &ComputingParams,
    ) -> usize {
        let width = params.output_width;

        if self.factor >= 1 {
            let value = self.shade_value(nw, sw, se, ne, metres_per_element);
            let factor = self.factor as usize;
            for block_row in 0..factor {
                for block_col in 0..factor {
                    params.output.set(out_ix + block_row * width + block_col, value);
                }
            }
            out_ix + factor
        } else {
            let divisor = (-self.factor) as usize;
            let mut next = out_ix;
            // One representative element per divisor² block.
            if (line - 1) % divisor == 0 && (col - 1) % divisor == 0 {
                let value = self.shade_value(nw, sw, se, ne, metres_per_element);
                params.output.set(next, value);
            }
            if col % divisor == 0 {
                next += 1;
            }
            // Completing the block's last line steps to the next output
            // row; otherwise the between-row increment cancels out and
            // the row is revisited.
            if col == params.input_axis_len && line % divisor == 0 {
                next += width;
            }
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{OutputGrid, SampleBufferPool};
    use std::sync::atomic::{AtomicBool, AtomicIsize};
    use std::sync::Arc;

    fn params_for(factor: i32, input_axis_len: usize, padding: usize) -> ComputingParams {
        let output_axis_len = if factor >= 1 {
            input_axis_len * factor as usize
        } else {
            input_axis_len / (-factor) as usize
        };
        let output_width = output_axis_len + 2 * padding;
        ComputingParams {
            output: Arc::new(OutputGrid::new(output_width * output_width, output_width)),
            kernel: Arc::new(LinearShadeKernel::new(factor)),
            input_axis_len,
            output_axis_len,
            output_width,
            line_buffer_size: input_axis_len + 1,
            padding,
            resolution_factor: factor,
            north_unit_distance_per_line: 30.0,
            south_unit_distance_per_line: 30.0,
            compute_threads: 0,
            max_active_tasks: 1,
            active_tasks: AtomicIsize::new(0),
            input_pool: SampleBufferPool::new(1),
            line_pool: SampleBufferPool::new(1),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_flat_terrain_is_mid_grey() {
        let kernel = LinearShadeKernel::new(1);
        assert_eq!(kernel.shade_value(100.0, 100.0, 100.0, 100.0, 30.0), 128);
    }

    #[test]
    fn test_northwest_facing_slope_is_brighter() {
        let kernel = LinearShadeKernel::new(1);
        // Terrain rising towards the southeast faces the northwest light.
        let facing = kernel.shade_value(0.0, 10.0, 20.0, 10.0, 30.0);
        let away = kernel.shade_value(20.0, 10.0, 0.0, 10.0, 30.0);
        assert!(facing > 128, "facing slope should be bright, got {facing}");
        assert!(away < 128, "averted slope should be dark, got {away}");
    }

    #[test]
    fn test_identity_factor_advances_by_one() {
        let params = params_for(1, 4, 0);
        let kernel = LinearShadeKernel::new(1);
        let next = kernel.process_unit_element(0.0, 0.0, 0.0, 0.0, 30.0, 0, 1, 1, &params);
        assert_eq!(next, 1);
        assert_eq!(params.output.get(0), 128);
    }

    #[test]
    fn test_supersample_fills_factor_block() {
        let params = params_for(2, 4, 0);
        let kernel = LinearShadeKernel::new(2);
        let width = params.output_width;
        let next = kernel.process_unit_element(0.0, 0.0, 0.0, 0.0, 30.0, 0, 1, 1, &params);
        assert_eq!(next, 2);
        for (block_row, block_col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(params.output.get(block_row * width + block_col), 128);
        }
    }

    #[test]
    fn test_subsample_covers_every_output_cell_exactly_once() {
        let divisor = 2usize;
        let input_axis_len = 4usize;
        let params = params_for(-(divisor as i32), input_axis_len, 0);
        let kernel = LinearShadeKernel::new(-(divisor as i32));

        // Drive the kernel the way a computing task does: row-major over
        // all unit elements, with the sub-sampling between-row increment
        // of minus one output row (no padding in this fixture).
        let mut out_ix = 0i64;
        for line in 1..=input_axis_len {
            for col in 1..=input_axis_len {
                out_ix = kernel.process_unit_element(
                    100.0,
                    100.0,
                    100.0,
                    100.0,
                    30.0,
                    out_ix as usize,
                    line,
                    col,
                    &params,
                ) as i64;
            }
            out_ix -= params.output_width as i64;
        }

        // 4×4 input elements collapse into a fully written 2×2 output.
        assert_eq!(out_ix as usize, params.output.len());
        for ix in 0..params.output.len() {
            assert_eq!(params.output.get(ix), 128, "cell {ix}");
        }
    }
}
