// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::SourceVector;

const INV_2PI: f64 = 0.5 * std::f64::consts::FRAC_1_PI;

/// Below this, lengths in the kernel are treated as zero.
const SINGULAR_TOL: f64 = 1e-12;

/// Below this, `cos(dip)` selects the vertical-plane forms of I1..I5.
const VERTICAL_COS_TOL: f64 = 1e-6;

/// Terms of the Okada (1985) surface solution at one corner (xi, eta) of the
/// rectangle.
struct CornerTerms {
    r: f64,
    y_tilde: f64,
    d_tilde: f64,
    inv_r_eta: f64,
    inv_r_xi: f64,
    theta: f64,
    i1: f64,
    i2: f64,
    i3: f64,
    i4: f64,
    i5: f64,
}

fn corner_terms(xi: f64, eta: f64, q: f64, sd: f64, cd: f64, alpha: f64) -> CornerTerms {
    let r = (xi * xi + eta * eta + q * q).sqrt();
    let y_tilde = eta * cd + q * sd;
    let d_tilde = eta * sd - q * cd;

    // R + eta vanishes on the negative eta axis; Okada's limit applies there.
    let r_eta = r + eta;
    let (ln_r_eta, inv_r_eta) = if r_eta < SINGULAR_TOL {
        (-(r - eta).ln(), 0.0)
    } else {
        (r_eta.ln(), 1.0 / r_eta)
    };
    let r_xi = r + xi;
    let inv_r_xi = if r_xi < SINGULAR_TOL { 0.0 } else { 1.0 / r_xi };

    let theta = if q.abs() < SINGULAR_TOL {
        0.0
    } else {
        (xi * eta / (q * r)).atan()
    };

    let r_d = r + d_tilde;
    let (i1, i3, i4, i5) = if cd.abs() < VERTICAL_COS_TOL {
        let r_d2 = r_d * r_d;
        let i1 = -0.5 * alpha * xi * q / r_d2;
        let i3 = 0.5 * alpha * (eta / r_d + y_tilde * q / r_d2 - ln_r_eta);
        let i4 = -alpha * q / r_d;
        let i5 = -alpha * xi * sd / r_d;
        (i1, i3, i4, i5)
    } else {
        let x = (xi * xi + q * q).sqrt();
        let i5 = if xi.abs() < SINGULAR_TOL {
            0.0
        } else {
            alpha * 2.0 / cd
                * ((eta * (x + q * cd) + x * (r + x) * sd) / (xi * (r + x) * cd)).atan()
        };
        let i4 = alpha / cd * (r_d.ln() - sd * ln_r_eta);
        let i3 = alpha * (y_tilde / (cd * r_d) - ln_r_eta) + sd / cd * i4;
        let i1 = -alpha * xi / (cd * r_d) - sd / cd * i5;
        (i1, i3, i4, i5)
    };
    let i2 = -alpha * ln_r_eta - i3;

    CornerTerms {
        r,
        y_tilde,
        d_tilde,
        inv_r_eta,
        inv_r_xi,
        theta,
        i1,
        i2,
        i3,
        i4,
        i5,
    }
}

/// Surface displacement of a rectangular dislocation in fault coordinates
/// (Okada, 1985, BSSA 75(4)).
///
/// The rectangle spans `[0, length]` along strike (x) and `[0, width]` up dip
/// from the reference edge at `depth`. `alpha` is `mu / (lambda + mu)`.
/// `slip` is `[strike_slip, dip_slip, opening]`. Returns `[ux, uy, uz]` with
/// x along strike and z up.
#[allow(clippy::too_many_arguments)]
pub fn okada_surface(
    alpha: f64,
    sd: f64,
    cd: f64,
    length: f64,
    width: f64,
    depth: f64,
    x: f64,
    y: f64,
    slip: [f64; 3],
) -> [f64; 3] {
    let [ss, ds, ts] = slip;
    let p = y * cd + depth * sd;
    let q = y * sd - depth * cd;

    let mut u = [0.0; 3];
    // Chinnery's notation: f(x, p) - f(x, p - W) - f(x - L, p) + f(x - L, p - W)
    let corners = [
        (x, p, 1.0),
        (x, p - width, -1.0),
        (x - length, p, -1.0),
        (x - length, p - width, 1.0),
    ];
    for (xi, eta, sign) in corners {
        let c = corner_terms(xi, eta, q, sd, cd, alpha);
        if c.r < SINGULAR_TOL {
            continue;
        }
        let q_r_eta = q * c.inv_r_eta / c.r;
        let q_r_xi = q * c.inv_r_xi / c.r;

        let mut f = [0.0; 3];
        if ss != 0.0 {
            let k = -ss * INV_2PI;
            f[0] += k * (xi * q_r_eta + c.theta + c.i1 * sd);
            f[1] += k * (c.y_tilde * q_r_eta + q * cd * c.inv_r_eta + c.i2 * sd);
            f[2] += k * (c.d_tilde * q_r_eta + q * sd * c.inv_r_eta + c.i4 * sd);
        }
        if ds != 0.0 {
            let k = -ds * INV_2PI;
            f[0] += k * (q / c.r - c.i3 * sd * cd);
            f[1] += k * (c.y_tilde * q_r_xi + cd * c.theta - c.i1 * sd * cd);
            f[2] += k * (c.d_tilde * q_r_xi + sd * c.theta - c.i5 * sd * cd);
        }
        if ts != 0.0 {
            let k = ts * INV_2PI;
            f[0] += k * (q * q_r_eta - c.i3 * sd * sd);
            f[1] += k * (-c.d_tilde * q_r_xi - sd * (xi * q_r_eta - c.theta) - c.i1 * sd * sd);
            f[2] += k * (c.y_tilde * q_r_xi + cd * (xi * q_r_eta - c.theta) - c.i5 * sd * sd);
        }

        for (total, part) in u.iter_mut().zip(f) {
            *total += sign * part;
        }
    }
    u
}

/// Displacement `[north, east, down]` at a surface point due to one source
/// vector.
///
/// The source's easting/northing/depth locate the middle of its reference
/// edge; a negative dip puts that edge on top of the plane.
pub fn displacement_at(src: &SourceVector, alpha: f64, easting: f64, northing: f64) -> [f64; 3] {
    let [length, width, depth, dip, strike, src_e, src_n, ss, ds, ts] = *src;
    let (sd, cd) = dip.to_radians().sin_cos();
    let (st, ct) = strike.to_radians().sin_cos();

    // Rotate into fault coordinates: x along strike from the edge start, y to
    // the left of strike.
    let de = easting - src_e;
    let dn = northing - src_n;
    let x = de * st + dn * ct + 0.5 * length;
    let y = -de * ct + dn * st;

    let [ux, uy, uz] = okada_surface(alpha, sd, cd, length, width, depth, x, y, [ss, ds, ts]);

    [ux * ct + uy * st, ux * st - uy * ct, -uz]
}
