//! Coordinate-system adapter
//!
//! The host modeller is right-handed, Z-up and Y-forward. The engine is left-handed,
//! Y-up and Z-forward. Everything leaving the exporter goes through the conversions in
//! this module.
//!
//! Matrices are indexed `(row, column)` the way the host API prints them. glam stores
//! columns, so [`at`] and [`from_rows`] do the translation.

use glam::{Mat4, Vec3, Vec4};

/// Host position to engine position: `x' = -x`, `y' = z`, `z' = -y`.
pub const T_POS: Mat4 = Mat4::from_cols(
    Vec4::new(-1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::W,
);

/// Host bone-local axes to engine bone-local axes (swaps Y and Z).
pub const T_BONE: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::W,
);

/// Inverse of [`T_POS`].
pub const T_POS_INV: Mat4 = Mat4::from_cols(
    Vec4::new(-1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.0, -1.0, 0.0, 0.0),
    Vec4::W,
);

/// Degrees to radians with the same constant the engine tools use.
pub const DEG_TO_RAD: f32 = 3.141_592_65 / 180.0;

/// Element at `(row, col)`.
#[inline]
pub fn at(m: &Mat4, row: usize, col: usize) -> f32 {
    m.col(col)[row]
}

/// Build a matrix from rows as written on paper.
pub fn from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

/// Uniform export scaling `diag(s, s, s, 1)`.
pub fn scale_matrix(scaling: f32) -> Mat4 {
    Mat4::from_diagonal(Vec4::new(scaling, scaling, scaling, 1.0))
}

/// Transform a host position into a scaled engine position.
pub fn convert_position(position: Vec3, scaling: f32) -> Vec3 {
    (scale_matrix(scaling) * T_POS).transform_point3(position)
}

/// Convert a host object matrix into engine space (`T_POS · m · T_POS_INV`).
pub fn convert_matrix(m: &Mat4) -> Mat4 {
    T_POS * *m * T_POS_INV
}

/// Convert a host bone matrix into engine space (`T_POS · m · T_BONE`).
///
/// `T_BONE` swaps Y and Z and is its own inverse.
pub fn convert_matrix_bone(m: &Mat4) -> Mat4 {
    T_POS * *m * T_BONE
}

/// Euler angles in degrees of an engine rotation matrix.
///
/// Gimbal-locked matrices (`|m12| >= 0.99999`) fold the Z rotation into Y.
pub fn matrix_to_euler(m: &Mat4) -> Vec3 {
    let e = |r, c| at(m, r, c);
    let half_pi = std::f32::consts::FRAC_PI_2;
    let euler = if e(1, 2) < 0.99999 {
        if e(1, 2) > -0.99999 {
            Vec3::new(
                e(1, 2).asin(),
                (-e(0, 2)).atan2(e(2, 2)),
                (-e(1, 0)).atan2(e(1, 1)),
            )
        } else {
            Vec3::new(-half_pi, 0.0, -e(2, 0).atan2(e(0, 0)))
        }
    } else {
        Vec3::new(half_pi, 0.0, e(2, 0).atan2(e(0, 0)))
    };
    euler / DEG_TO_RAD
}

/// Format a float with four decimals, trailing zeros and dot removed.
pub fn float_to_string(value: f32) -> String {
    let text = format!("{:.4}", value);
    match text.trim_end_matches('0').trim_end_matches('.') {
        "-0" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_position_axes() {
        assert_vec_eq(convert_position(Vec3::X, 1.0), Vec3::new(-1.0, 0.0, 0.0));
        assert_vec_eq(convert_position(Vec3::Y, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert_vec_eq(convert_position(Vec3::Z, 1.0), Vec3::new(0.0, 1.0, 0.0));
        assert_vec_eq(convert_position(Vec3::Z, 2.5), Vec3::new(0.0, 2.5, 0.0));
    }

    #[test]
    fn test_inverses() {
        assert!((T_POS * T_POS_INV).abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!((T_BONE * T_BONE).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_convert_matrix_moves_translation() {
        let host = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let engine = convert_matrix(&host);
        assert_vec_eq(engine.w_axis.truncate(), convert_position(Vec3::new(1.0, 2.0, 3.0), 1.0));
        assert!(convert_matrix(&Mat4::IDENTITY).abs_diff_eq(Mat4::IDENTITY, 1e-6));

        // host rotation of 90 degrees about Z turns into one about engine Y
        let host = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let engine = convert_matrix(&host);
        assert!((at(&engine, 1, 1) - 1.0).abs() < 1e-6);
        assert!(at(&engine, 0, 0).abs() < 1e-6);
    }

    #[test]
    fn test_identity_bone_is_flipped() {
        let engine = convert_matrix_bone(&Mat4::IDENTITY);
        assert_eq!(at(&engine, 0, 0), -1.0);
        assert_eq!(at(&engine, 1, 1), 1.0);
        assert_eq!(at(&engine, 2, 2), -1.0);
    }

    #[test]
    fn test_euler_identity() {
        assert_vec_eq(matrix_to_euler(&Mat4::IDENTITY), Vec3::ZERO);
    }

    #[test]
    fn test_euler_single_axis() {
        // engine euler x is asin(m12); a rotation of 30 degrees about X
        let m = from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.866_025_4, 0.5, 0.0],
            [0.0, -0.5, 0.866_025_4, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_vec_eq(matrix_to_euler(&m), Vec3::new(30.0, 0.0, 0.0));
    }

    #[test]
    fn test_euler_gimbal_lock() {
        let m = from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let euler = matrix_to_euler(&m);
        assert!((euler.x - 90.0).abs() < 1e-3);
        assert_eq!(euler.y, 0.0);
    }

    #[test]
    fn test_float_to_string() {
        assert_eq!(float_to_string(1.0), "1");
        assert_eq!(float_to_string(0.25), "0.25");
        assert_eq!(float_to_string(10.0), "10");
        assert_eq!(float_to_string(0.0), "0");
        assert_eq!(float_to_string(1.23456), "1.2346");
        assert_eq!(float_to_string(-0.0), "0");
        assert_eq!(float_to_string(-0.00001), "0");
    }
}
