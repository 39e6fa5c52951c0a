//! Precomputed lookup tables
//!
//! All tables are built once through [`FixedMath`] and are read-only after
//! that. Until [`LookupTables::generate_all`] runs every table is zero, so a
//! lookup against unpopulated tables yields zero rather than garbage.
//!
//! Every lookup clamps its index, so no input magnitude can read out of bounds.

use std::f32::consts::{PI, TAU};
use std::time::Instant;

use splatstorm_shared::constants::{
    ATLAS_CELLS, ATLAS_SIZE, COV_DET_FLOOR, COV_INV_LUT_RES, FOOTPRINT_RES, LUT_SIZE,
    LUT_THRESHOLD_SQ, MAX_EIG_VAL, SH_LUT_RES,
};
use splatstorm_shared::{Fixed16, FixedMath};
use tracing::{debug, info};

use crate::stats::DebugStat;

/// Smallest diagonal covariance entry covered by the covariance table
const COV_DIAG_MIN: f32 = 0.1;
/// Width of the diagonal covariance domain
const COV_DIAG_SPAN: f32 = 4.0;

/// Fixed SH basis weights: (Y00, Y1-1, Y10, Y11)
const SH_BASIS: [f32; 4] = [0.282095, 0.488603, 0.488603, 0.488603];
const SH_WEIGHTS: [f32; 3] = [0.3, 0.5, 0.2];

// ============================================================================
// Tables
// ============================================================================

/// Every precomputed table used by the splat math.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTables {
    exp: Box<[Fixed16]>,
    sqrt: Box<[Fixed16]>,
    recip: Box<[Fixed16]>,
    sin: Box<[Fixed16]>,
    cos: Box<[Fixed16]>,
    cov_inv: Box<[Fixed16]>,
    atlas: Box<[u8]>,
    sh: Box<[Fixed16]>,
    generated: bool,
    fill_passes: u32,
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTables {
    /// Allocate zeroed, unpopulated tables
    pub fn new() -> Self {
        Self {
            exp: zeroed(LUT_SIZE),
            sqrt: zeroed(LUT_SIZE),
            recip: zeroed(LUT_SIZE),
            sin: zeroed(LUT_SIZE),
            cos: zeroed(LUT_SIZE),
            cov_inv: zeroed(COV_INV_LUT_RES * COV_INV_LUT_RES),
            atlas: vec![0u8; ATLAS_SIZE * ATLAS_SIZE].into_boxed_slice(),
            sh: zeroed(SH_LUT_RES * SH_LUT_RES),
            generated: false,
            fill_passes: 0,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Number of times the tables were actually filled
    pub fn generation_passes(&self) -> u32 {
        self.fill_passes
    }

    /// Build every table in a fixed order.
    ///
    /// Returns `false` without touching anything if the tables are already
    /// populated.
    pub fn generate_all(&mut self, math: &FixedMath) -> bool {
        if self.generated {
            debug!("Lookup tables already generated, skipping");
            return false;
        }

        let start = Instant::now();
        fill_exp(&mut self.exp, math);
        fill_sqrt(&mut self.sqrt, math);
        fill_recip(&mut self.recip, math);
        fill_cov_inv(&mut self.cov_inv, math);
        fill_footprint_atlas(&mut self.atlas);
        fill_sh_lighting(&mut self.sh, math);
        fill_trig(&mut self.sin, &mut self.cos, math);

        self.generated = true;
        self.fill_passes += 1;

        info!(
            elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
            bytes = self.memory_usage().total(),
            "Lookup tables generated"
        );
        true
    }

    /// Zero every table and allow generation to run again
    pub fn reset(&mut self) {
        for table in [
            &mut self.exp,
            &mut self.sqrt,
            &mut self.recip,
            &mut self.sin,
            &mut self.cos,
            &mut self.cov_inv,
            &mut self.sh,
        ] {
            table.fill(Fixed16::ZERO);
        }
        self.atlas.fill(0);
        self.generated = false;
        debug!("Lookup tables reset");
    }

    // ------------------------------------------------------------------------
    // Raw table access
    // ------------------------------------------------------------------------

    pub fn exp_table(&self) -> &[Fixed16] {
        &self.exp
    }

    pub fn sqrt_table(&self) -> &[Fixed16] {
        &self.sqrt
    }

    pub fn recip_table(&self) -> &[Fixed16] {
        &self.recip
    }

    pub fn cov_inv_table(&self) -> &[Fixed16] {
        &self.cov_inv
    }

    /// Footprint atlas, row-major, `ATLAS_SIZE` texels per row
    pub fn atlas(&self) -> &[u8] {
        &self.atlas
    }

    /// SH lighting table, row-major by phi then theta
    pub fn sh_table(&self) -> &[Fixed16] {
        &self.sh
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn sin(&self, angle: Fixed16) -> Fixed16 {
        self.sin[angle_index(angle, LUT_SIZE)]
    }

    pub fn cos(&self, angle: Fixed16) -> Fixed16 {
        self.cos[angle_index(angle, LUT_SIZE)]
    }

    /// Table square root; inputs above `MAX_EIG_VAL` are clamped to it.
    pub fn sqrt(&self, value: Fixed16) -> Fixed16 {
        if value <= Fixed16::ZERO {
            return Fixed16::ZERO;
        }
        let v = value.to_f32().min(MAX_EIG_VAL);
        self.sqrt[clamp_index(v / MAX_EIG_VAL * (LUT_SIZE - 1) as f32, LUT_SIZE)]
    }

    /// Gaussian decay `e^-x` for `x` in `[0, LUT_THRESHOLD_SQ]`
    pub fn exp_neg(&self, x: Fixed16) -> Fixed16 {
        let v = x.to_f32();
        self.exp[clamp_index(v / LUT_THRESHOLD_SQ * (LUT_SIZE - 1) as f32, LUT_SIZE)]
    }

    /// Table reciprocal. Non-positive inputs return the largest entry.
    pub fn recip(&self, value: Fixed16) -> Fixed16 {
        let v = value.to_f32();
        self.recip[clamp_index(v / MAX_EIG_VAL * LUT_SIZE as f32 - 1.0, LUT_SIZE)]
    }

    /// Inverse determinant for a diagonal covariance `(a, d)`
    pub fn sample_cov_inv(&self, a: Fixed16, d: Fixed16) -> Fixed16 {
        let scale = (COV_INV_LUT_RES - 1) as f32 / COV_DIAG_SPAN;
        let x = clamp_index((a.to_f32() - COV_DIAG_MIN) * scale, COV_INV_LUT_RES);
        let y = clamp_index((d.to_f32() - COV_DIAG_MIN) * scale, COV_INV_LUT_RES);
        self.cov_inv[y * COV_INV_LUT_RES + x]
    }

    /// Alpha texel at normalized atlas coordinates (clamped to `[0, 1]`)
    pub fn sample_atlas(&self, u: f32, v: f32) -> u8 {
        let last = (ATLAS_SIZE - 1) as f32;
        let x = clamp_index(u.clamp(0.0, 1.0) * last, ATLAS_SIZE);
        let y = clamp_index(v.clamp(0.0, 1.0) * last, ATLAS_SIZE);
        self.atlas[y * ATLAS_SIZE + x]
    }

    /// Combined low-order SH lighting term for a direction
    pub fn sh_lighting(&self, theta: Fixed16, phi: Fixed16) -> Fixed16 {
        let x = angle_index(theta, SH_LUT_RES);
        let p = phi.to_f32().clamp(0.0, PI);
        let y = clamp_index(p / PI * (SH_LUT_RES - 1) as f32, SH_LUT_RES);
        self.sh[y * SH_LUT_RES + x]
    }

    pub fn memory_usage(&self) -> LutMemory {
        let fixed = std::mem::size_of::<Fixed16>();
        LutMemory {
            exp: self.exp.len() * fixed,
            sqrt: self.sqrt.len() * fixed,
            recip: self.recip.len() * fixed,
            trig: (self.sin.len() + self.cos.len()) * fixed,
            cov_inv: self.cov_inv.len() * fixed,
            atlas: self.atlas.len(),
            sh: self.sh.len() * fixed,
        }
    }
}

// ============================================================================
// Atlas Addressing
// ============================================================================

/// Sub-rectangle of the footprint atlas selected for one splat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasUv {
    pub u_base: f32,
    pub v_base: f32,
    pub u_scale: f32,
    pub v_scale: f32,
}

impl AtlasUv {
    /// Map local `[0, 1]` coordinates inside the cell to atlas coordinates
    pub fn to_atlas(&self, u: f32, v: f32) -> (f32, f32) {
        (self.u_base + u * self.u_scale, self.v_base + v * self.v_scale)
    }
}

/// Pick an atlas cell: rows by eigenvalue aspect ratio (clamped to `[1, 8]`),
/// columns by wrapped rotation angle.
pub fn atlas_uv(eigen1: Fixed16, eigen2: Fixed16, rotation: Fixed16) -> AtlasUv {
    let last = ATLAS_CELLS - 1;
    let e1 = eigen1.to_f32();
    let e2 = eigen2.to_f32();
    let aspect = if e2 > 1e-6 { e1 / e2 } else { 1.0 };
    let aspect = aspect.clamp(1.0, ATLAS_CELLS as f32);
    let aspect_idx = ((aspect - 1.0) as usize).min(last);

    let turns = rotation.to_f32() / TAU;
    let turns = turns - turns.floor();
    let angle_idx = ((turns * ATLAS_CELLS as f32) as usize).min(last);

    let cell = 1.0 / ATLAS_CELLS as f32;
    AtlasUv {
        u_base: angle_idx as f32 * cell,
        v_base: aspect_idx as f32 * cell,
        u_scale: cell,
        v_scale: cell,
    }
}

// ============================================================================
// Memory Report
// ============================================================================

/// Bytes held by each table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutMemory {
    pub exp: usize,
    pub sqrt: usize,
    pub recip: usize,
    pub trig: usize,
    pub cov_inv: usize,
    pub atlas: usize,
    pub sh: usize,
}

impl LutMemory {
    pub fn total(&self) -> usize {
        self.exp + self.sqrt + self.recip + self.trig + self.cov_inv + self.atlas + self.sh
    }

    pub fn debug_stats(&self) -> Vec<DebugStat> {
        vec![
            DebugStat::bytes("1D tables", self.exp + self.sqrt + self.recip + self.trig),
            DebugStat::bytes("Covariance inverse", self.cov_inv),
            DebugStat::bytes("Footprint atlas", self.atlas),
            DebugStat::bytes("SH lighting", self.sh),
            DebugStat::bytes("Total", self.total()),
        ]
    }
}

// ============================================================================
// Index Helpers
// ============================================================================

/// Truncate a scaled position to a valid index. NaN and negatives map to 0.
#[inline]
fn clamp_index(scaled: f32, len: usize) -> usize {
    if scaled > 0.0 {
        (scaled as usize).min(len - 1)
    } else {
        0
    }
}

/// Wrap into `[0, 2π)` by whole periods, then scale across `len` entries.
#[inline]
fn angle_index(angle: Fixed16, len: usize) -> usize {
    let period = Fixed16::TWO_PI.to_bits();
    let mut a = angle.to_bits();
    while a < 0 {
        a += period;
    }
    while a >= period {
        a -= period;
    }
    clamp_index(a as f32 / period as f32 * (len - 1) as f32, len)
}

fn zeroed(len: usize) -> Box<[Fixed16]> {
    vec![Fixed16::ZERO; len].into_boxed_slice()
}

// ============================================================================
// Generators
// ============================================================================

fn fill_exp(table: &mut [Fixed16], math: &FixedMath) {
    let last = (table.len() - 1) as f32;
    for (i, entry) in table.iter_mut().enumerate() {
        let x = i as f32 / last * LUT_THRESHOLD_SQ;
        *entry = math.from_f32((-x).exp());
    }
    debug!(entries = table.len(), "Generated exponential table");
}

fn fill_sqrt(table: &mut [Fixed16], math: &FixedMath) {
    let last = (table.len() - 1) as f32;
    for (i, entry) in table.iter_mut().enumerate() {
        let x = i as f32 / last * MAX_EIG_VAL;
        *entry = math.from_f32(x.sqrt());
    }
    debug!(entries = table.len(), "Generated square root table");
}

fn fill_recip(table: &mut [Fixed16], math: &FixedMath) {
    let len = table.len() as f32;
    for (i, entry) in table.iter_mut().enumerate() {
        // Shifted by one step so zero is never in the domain
        let x = (i + 1) as f32 / len * MAX_EIG_VAL;
        *entry = math.from_f32(1.0 / x);
    }
    debug!(entries = table.len(), "Generated reciprocal table");
}

fn fill_cov_inv(table: &mut [Fixed16], math: &FixedMath) {
    let last = (COV_INV_LUT_RES - 1) as f32;
    for y in 0..COV_INV_LUT_RES {
        let d = y as f32 / last * COV_DIAG_SPAN + COV_DIAG_MIN;
        for x in 0..COV_INV_LUT_RES {
            let a = x as f32 / last * COV_DIAG_SPAN + COV_DIAG_MIN;
            // Off-diagonal is zero, so det = a * d
            let det = (a * d).max(COV_DET_FLOOR);
            table[y * COV_INV_LUT_RES + x] = math.from_f32(1.0 / det);
        }
    }
    debug!(resolution = COV_INV_LUT_RES, "Generated covariance inverse table");
}

fn fill_footprint_atlas(atlas: &mut [u8]) {
    let cell_last = (ATLAS_CELLS - 1) as f32;
    let texel_last = (FOOTPRINT_RES - 1) as f32;
    for cell_y in 0..ATLAS_CELLS {
        let scale_y = 0.5 + cell_y as f32 / cell_last * 2.0;
        for cell_x in 0..ATLAS_CELLS {
            let scale_x = 0.5 + cell_x as f32 / cell_last * 2.0;
            for y in 0..FOOTPRINT_RES {
                let fy = (y as f32 / texel_last - 0.5) * 2.0;
                for x in 0..FOOTPRINT_RES {
                    let fx = (x as f32 / texel_last - 0.5) * 2.0;
                    let dist_sq = (fx * fx) / (scale_x * scale_x) + (fy * fy) / (scale_y * scale_y);
                    let alpha = (-0.5 * dist_sq).exp() * 255.0;

                    let px = cell_x * FOOTPRINT_RES + x;
                    let py = cell_y * FOOTPRINT_RES + y;
                    atlas[py * ATLAS_SIZE + px] = alpha as u8;
                }
            }
        }
    }
    debug!(cells = ATLAS_CELLS * ATLAS_CELLS, "Generated footprint atlas");
}

fn fill_sh_lighting(table: &mut [Fixed16], math: &FixedMath) {
    let last = (SH_LUT_RES - 1) as f32;
    for y in 0..SH_LUT_RES {
        let phi = y as f32 / last * PI;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for x in 0..SH_LUT_RES {
            let theta = x as f32 / last * TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let y1m1 = SH_BASIS[1] * sin_phi * sin_theta;
            let y10 = SH_BASIS[2] * cos_phi;
            let y11 = SH_BASIS[3] * sin_phi * cos_theta;
            let combined =
                SH_BASIS[0] + SH_WEIGHTS[0] * y1m1 + SH_WEIGHTS[1] * y10 + SH_WEIGHTS[2] * y11;

            table[y * SH_LUT_RES + x] = math.from_f32(combined);
        }
    }
    debug!(resolution = SH_LUT_RES, "Generated SH lighting table");
}

fn fill_trig(sin: &mut [Fixed16], cos: &mut [Fixed16], math: &FixedMath) {
    let last = (sin.len() - 1) as f32;
    for (i, (s, c)) in sin.iter_mut().zip(cos.iter_mut()).enumerate() {
        let angle = i as f32 / last * TAU;
        *s = math.from_f32(angle.sin());
        *c = math.from_f32(angle.cos());
    }
    debug!(entries = sin.len(), "Generated sin/cos tables");
}
