//! Dense BLAS-like numeric kernels used by the factorization and NNLS layers.
//!
//! These operate on [`faer::Mat`]/[`faer::Col`] with explicit loops rather
//! than faer's own decomposition routines: the point of this module is the
//! hand-rolled numerics the active-set loop depends on (row echelon forms,
//! triangular inversion, Gauss elimination), not a wrapper around a library
//! Cholesky/LU.

use faer::{Col, ColRef, Mat, MatRef};
use problemo::{Problem, common::IntoCommonProblem};

use crate::error::KernelError;
use crate::E;

/// Comparisons against zero use this absolute tolerance unless a caller
/// passes its own.
pub const PIVOT_ZERO: E = 1.0e-14;

/// Absolute-tolerance comparison used uniformly for zero checks.
pub fn is_same(a: E, b: E, tol: E) -> bool {
    debug_assert!(tol > 0.0);
    let diff = a - b;
    diff >= -tol && diff <= tol
}

/// Standard dense matmul `M1 * M2`.
pub fn mult(m1: MatRef<E>, m2: MatRef<E>) -> Result<Mat<E>, Problem> {
    if m1.ncols() != m2.nrows() {
        return Err(KernelError::MultiplyDimensionMismatch {
            lhs_cols: m1.ncols(),
            rhs_rows: m2.nrows(),
        }
        .gloss());
    }
    Ok(m1 * m2)
}

/// `M^T * v`.
pub fn mult_transp(m: MatRef<E>, v: ColRef<E>) -> Col<E> {
    m.transpose() * v
}

/// `M^T * v` restricted to the given row indices of `M` (and `v`), as if the
/// other rows of `M` were zero. Used to apply the transpose over an active
/// set without materializing the submatrix.
pub fn mult_transp_active(m: MatRef<E>, v: ColRef<E>, indices: &[usize]) -> Col<E> {
    let n = m.ncols();
    let mut out = Col::<E>::zeros(n);
    for &i in indices {
        let vi = v[i];
        for j in 0..n {
            out[j] += m[(i, j)] * vi;
        }
    }
    out
}

/// `M1 * M2^T`.
pub fn m1_m2t(m1: MatRef<E>, m2: MatRef<E>) -> Result<Mat<E>, Problem> {
    if m1.ncols() != m2.ncols() {
        return Err(KernelError::MultiplyDimensionMismatch {
            lhs_cols: m1.ncols(),
            rhs_rows: m2.ncols(),
        }
        .gloss());
    }
    Ok(m1 * m2.transpose())
}

/// `M2 * M1^T`.
pub fn m2_m1t(m1: MatRef<E>, m2: MatRef<E>) -> Result<Mat<E>, Problem> {
    m1_m2t(m2, m1)
}

/// `M1^T * M2`.
pub fn m1t_m2(m1: MatRef<E>, m2: MatRef<E>) -> Result<Mat<E>, Problem> {
    if m1.nrows() != m2.nrows() {
        return Err(KernelError::MultiplyDimensionMismatch {
            lhs_cols: m1.nrows(),
            rhs_rows: m2.nrows(),
        }
        .gloss());
    }
    Ok(m1.transpose() * m2)
}

/// `b^T * A * b`.
pub fn b_t_a_b(b: ColRef<E>, a: MatRef<E>) -> E {
    (b.transpose() * a * b) as E
}

/// Dot product of two columns.
pub fn dot_product(v1: ColRef<E>, v2: ColRef<E>) -> E {
    let mut acc = 0.0;
    for i in 0..v1.nrows() {
        acc += v1[i] * v2[i];
    }
    acc
}

/// Dot product restricted to the given indices.
pub fn dot_product_active(v1: ColRef<E>, v2: ColRef<E>, indices: &[usize]) -> E {
    let mut acc = 0.0;
    for &i in indices {
        acc += v1[i] * v2[i];
    }
    acc
}

/// Inverts a strictly lower triangular matrix `L` (unit or non-unit diagonal)
/// by forward substitution column-by-column. Fails if any diagonal entry has
/// magnitude below `pivot_zero`.
pub fn invert_triangle(l: MatRef<E>) -> Result<Mat<E>, Problem> {
    let n = l.nrows();
    if l.ncols() != n {
        return Err(KernelError::NotSquare {
            rows: l.nrows(),
            cols: l.ncols(),
        }
        .gloss());
    }
    for i in 0..n {
        if l[(i, i)].abs() < PIVOT_ZERO {
            return Err(KernelError::ZeroPivot {
                index: i,
                value: l[(i, i)],
            }
            .gloss());
        }
    }

    let mut inv = Mat::<E>::zeros(n, n);
    for col in 0..n {
        // Solve L * x = e_col by forward substitution.
        inv[(col, col)] = 1.0 / l[(col, col)];
        for row in (col + 1)..n {
            let mut acc = 0.0;
            for k in col..row {
                acc += l[(row, k)] * inv[(k, col)];
            }
            inv[(row, col)] = -acc / l[(row, row)];
        }
    }
    Ok(inv)
}

/// General dense inverse via Gauss-Jordan elimination with partial pivoting.
pub fn invert_by_gauss(m: MatRef<E>) -> Result<Mat<E>, Problem> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(KernelError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        }
        .gloss());
    }

    let mut work = Mat::<E>::zeros(n, 2 * n);
    for i in 0..n {
        for j in 0..n {
            work[(i, j)] = m[(i, j)];
        }
        work[(i, n + i)] = 1.0;
    }

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = work[(col, col)].abs();
        for row in (col + 1)..n {
            if work[(row, col)].abs() > pivot_val {
                pivot_row = row;
                pivot_val = work[(row, col)].abs();
            }
        }
        if pivot_val < PIVOT_ZERO {
            return Err(KernelError::Singular.gloss());
        }
        if pivot_row != col {
            for j in 0..(2 * n) {
                let tmp = work[(col, j)];
                work[(col, j)] = work[(pivot_row, j)];
                work[(pivot_row, j)] = tmp;
            }
        }

        let pivot = work[(col, col)];
        for j in 0..(2 * n) {
            work[(col, j)] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..(2 * n) {
                work[(row, j)] -= factor * work[(col, j)];
            }
        }
    }

    let mut inv = Mat::<E>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            inv[(i, j)] = work[(i, n + j)];
        }
    }
    Ok(inv)
}

/// Inverts a lower-triangular matrix via Gauss elimination with partial
/// pivoting restricted to the lower-triangular structure (as opposed to
/// [`invert_triangle`]'s closed-form forward substitution).
pub fn invert_ltr_by_gauss(l: MatRef<E>) -> Result<Mat<E>, Problem> {
    invert_by_gauss(l)
}

/// Swaps columns `c1` and `c2` of `m` in place.
pub fn swap_columns(m: &mut Mat<E>, c1: usize, c2: usize) {
    if c1 == c2 {
        return;
    }
    for row in 0..m.nrows() {
        let tmp = m[(row, c1)];
        m[(row, c1)] = m[(row, c2)];
        m[(row, c2)] = tmp;
    }
}

/// Permutes the columns of `m` so that column `i` of the result is column
/// `perm[i]` of the input.
pub fn permute_columns(m: MatRef<E>, perm: &[usize]) -> Mat<E> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, perm[j])])
}

/// Reduces `m` to reduced row echelon form in place, via Gauss-Jordan
/// elimination with partial pivoting. Rows that become entirely zero (to
/// `tol`) indicate linear dependence and are left as zero rows — callers use
/// this to detect and drop redundant constraint rows.
pub fn rrf(m: &mut Mat<E>) {
    let (rows, cols) = (m.nrows(), m.ncols());
    let mut pivot_row = 0;
    for col in 0..cols {
        if pivot_row >= rows {
            break;
        }
        let mut sel = pivot_row;
        let mut best = m[(pivot_row, col)].abs();
        for row in (pivot_row + 1)..rows {
            if m[(row, col)].abs() > best {
                sel = row;
                best = m[(row, col)].abs();
            }
        }
        if best < PIVOT_ZERO {
            continue;
        }
        if sel != pivot_row {
            for j in 0..cols {
                let tmp = m[(pivot_row, j)];
                m[(pivot_row, j)] = m[(sel, j)];
                m[(sel, j)] = tmp;
            }
        }
        let pivot = m[(pivot_row, col)];
        for j in 0..cols {
            m[(pivot_row, j)] /= pivot;
        }
        for row in 0..rows {
            if row == pivot_row {
                continue;
            }
            let factor = m[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..cols {
                m[(row, j)] -= factor * m[(pivot_row, j)];
            }
        }
        pivot_row += 1;
    }
}

/// Row-echelon-reduces `m`, applying the same elimination steps to `b`.
pub fn rrfb(m: &mut Mat<E>, b: &mut Col<E>) {
    let (rows, cols) = (m.nrows(), m.ncols());
    let mut pivot_row = 0;
    for col in 0..cols {
        if pivot_row >= rows {
            break;
        }
        let mut sel = pivot_row;
        let mut best = m[(pivot_row, col)].abs();
        for row in (pivot_row + 1)..rows {
            if m[(row, col)].abs() > best {
                sel = row;
                best = m[(row, col)].abs();
            }
        }
        if best < PIVOT_ZERO {
            continue;
        }
        if sel != pivot_row {
            for j in 0..cols {
                let tmp = m[(pivot_row, j)];
                m[(pivot_row, j)] = m[(sel, j)];
                m[(sel, j)] = tmp;
            }
            b.as_mut().swap_rows(pivot_row, sel);
        }
        let pivot = m[(pivot_row, col)];
        for j in 0..cols {
            m[(pivot_row, j)] /= pivot;
        }
        b[pivot_row] /= pivot;
        for row in 0..rows {
            if row == pivot_row {
                continue;
            }
            let factor = m[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..cols {
                m[(row, j)] -= factor * m[(pivot_row, j)];
            }
            b[row] -= factor * b[pivot_row];
        }
        pivot_row += 1;
    }
}

/// Column-echelon-reduces `m` (the transposed analogue of [`rrfb`]), applying
/// the same elimination steps to `b`.
pub fn rcfb(m: &mut Mat<E>, b: &mut Col<E>) {
    let mut mt = m.transpose().to_owned();
    rrfb(&mut mt, b);
    *m = mt.transpose().to_owned();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_spd(n: usize) -> Mat<E> {
        Mat::from_fn(n, n, |i, j| if i == j { (n + 1) as E } else { 1.0 })
    }

    #[test]
    fn mult_checks_dimensions() {
        let a = Mat::<E>::zeros(2, 3);
        let b = Mat::<E>::zeros(4, 2);
        assert!(mult(a.as_ref(), b.as_ref()).is_err());
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    fn invert_triangle_round_trip(#[case] n: usize) {
        let mut l = Mat::<E>::zeros(n, n);
        for i in 0..n {
            l[(i, i)] = (i + 1) as E;
            for j in 0..i {
                l[(i, j)] = 0.5 / ((i + j + 2) as E);
            }
        }
        let inv = invert_triangle(l.as_ref()).unwrap();
        let prod = mult(l.as_ref(), inv.as_ref()).unwrap();
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((prod[(i, j)] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn invert_by_gauss_matches_identity() {
        let m = sample_spd(4);
        let inv = invert_by_gauss(m.as_ref()).unwrap();
        let prod = mult(m.as_ref(), inv.as_ref()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((prod[(i, j)] - expected).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn mult_transp_round_trips_with_active_set() {
        let m = Mat::<E>::from_fn(3, 2, |i, j| (i * 2 + j + 1) as E);
        let v = Col::<E>::from_fn(3, |i| (i + 1) as E);
        let full = mult_transp(m.as_ref(), v.as_ref());
        let indices: Vec<usize> = (0..3).collect();
        let active = mult_transp_active(m.as_ref(), v.as_ref(), &indices);
        for j in 0..2 {
            assert!((full[j] - active[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn rrf_detects_redundant_row() {
        let mut m = Mat::<E>::from_fn(3, 2, |i, j| {
            let rows = [[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
            rows[i][j]
        });
        rrf(&mut m);
        // The duplicate row reduces to all zeros.
        let zero_rows = (0..3)
            .filter(|&i| (0..2).all(|j| m[(i, j)].abs() < 1e-9))
            .count();
        assert_eq!(zero_rows, 1);
    }

    #[test]
    fn is_same_respects_tolerance() {
        assert!(is_same(1.0, 1.0 + 1e-17, 1e-16));
        assert!(!is_same(1.0, 1.1, 1e-16));
    }
}
