use crate::errors::ProgError;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Rem, Sub,
               SubAssign};

/// Determinants smaller than this are treated as zero during inversion.
const SINGULARITY_TOL: f64 = 1e-15;

/// An m-by-n matrix of `f64` in row-major order.
///
/// This is the numerical backbone shared by the observers and predictors:
/// it provides the Cholesky factorization used by the sigma-point transform
/// and the state sampler, the Crout LU determinant, the adjoint inverse, and
/// the weighted mean/covariance recombination of the unscented transform.
/// Value semantics throughout; matrices are copied freely.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Creates an m-by-n matrix of zeros.
    pub fn new(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates an m-by-n matrix with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Creates an m-by-n matrix from a row-major slice of m*n values.
    pub fn from_row_major(rows: usize, cols: usize, values: &[f64]) -> Result<Matrix, ProgError> {
        if values.len() != rows * cols {
            return Err(ProgError::DomainError(format!(
                "{} values cannot initialize a {}x{} matrix",
                values.len(),
                rows,
                cols
            )));
        }
        Ok(Matrix {
            rows,
            cols,
            data: values.to_vec(),
        })
    }

    /// Creates a column vector from the provided values.
    pub fn from_column(values: &[f64]) -> Matrix {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Creates the m-by-m identity matrix.
    pub fn identity(m: usize) -> Matrix {
        let mut r = Matrix::new(m, m);
        for i in 0..m {
            r[(i, i)] = 1.0;
        }
        r
    }

    /// Concatenates the provided matrices into a new matrix.
    ///
    /// If all inputs share a column count (and differ in row count), rows are
    /// stacked; if all share a row count (and differ in column count),
    /// columns are appended. Lists for which neither or both directions are
    /// viable are rejected; use [`Matrix::concat_sized`] to resolve the
    /// latter explicitly.
    pub fn concat(parts: &[&Matrix]) -> Result<Matrix, ProgError> {
        if parts.is_empty() {
            return Ok(Matrix::default());
        }
        if parts.len() == 1 {
            return Ok(parts[0].clone());
        }
        let same_cols = parts.iter().all(|p| p.cols == parts[0].cols);
        let same_rows = parts.iter().all(|p| p.rows == parts[0].rows);
        match (same_rows, same_cols) {
            (true, false) => Self::concat_sized(
                parts[0].rows,
                parts.iter().map(|p| p.cols).sum(),
                parts,
            ),
            (false, true) => Self::concat_sized(
                parts.iter().map(|p| p.rows).sum(),
                parts[0].cols,
                parts,
            ),
            (true, true) => Err(ProgError::DomainError(
                "concatenation direction is ambiguous".to_owned(),
            )),
            (false, false) => Err(ProgError::DomainError(
                "matrices cannot be concatenated".to_owned(),
            )),
        }
    }

    /// Concatenates the provided matrices into an m-by-n matrix.
    ///
    /// If every input has m rows, columns are appended; otherwise, if every
    /// input has n columns, rows are stacked. The inputs must exactly fill
    /// the target shape.
    pub fn concat_sized(rows: usize, cols: usize, parts: &[&Matrix]) -> Result<Matrix, ProgError> {
        let total: usize = parts.iter().map(|p| p.rows * p.cols).sum();
        if total != rows * cols {
            return Err(ProgError::DomainError(format!(
                "matrices do not fill a {}x{} matrix",
                rows, cols
            )));
        }
        let mut r = Matrix::new(rows, cols);
        if parts.iter().all(|p| p.rows == rows) {
            let mut col_off = 0;
            for p in parts {
                for i in 0..p.rows {
                    for j in 0..p.cols {
                        r[(i, col_off + j)] = p[(i, j)];
                    }
                }
                col_off += p.cols;
            }
            Ok(r)
        } else if parts.iter().all(|p| p.cols == cols) {
            let mut row_off = 0;
            for p in parts {
                for i in 0..p.rows {
                    for j in 0..p.cols {
                        r[(row_off + i, j)] = p[(i, j)];
                    }
                }
                row_off += p.rows;
            }
            Ok(r)
        } else {
            Err(ProgError::DomainError(
                "matrices cannot be concatenated".to_owned(),
            ))
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Checked element read.
    pub fn at(&self, i: usize, j: usize) -> Result<f64, ProgError> {
        if i >= self.rows || j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "({}, {}) is outside a {}x{} matrix",
                i, j, self.rows, self.cols
            )));
        }
        Ok(self.data[i * self.cols + j])
    }

    /// Checked element write.
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<(), ProgError> {
        if i >= self.rows || j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "({}, {}) is outside a {}x{} matrix",
                i, j, self.rows, self.cols
            )));
        }
        self.data[i * self.cols + j] = value;
        Ok(())
    }

    /// Returns row `i` as a freshly allocated 1-by-n matrix.
    pub fn row(&self, i: usize) -> Result<Matrix, ProgError> {
        if i >= self.rows {
            return Err(ProgError::OutOfRange(format!("row {} of {}", i, self.rows)));
        }
        Ok(Matrix {
            rows: 1,
            cols: self.cols,
            data: self.data[i * self.cols..(i + 1) * self.cols].to_vec(),
        })
    }

    /// Overwrites row `i` with the provided 1-by-n matrix.
    pub fn set_row(&mut self, i: usize, value: &Matrix) -> Result<(), ProgError> {
        if i >= self.rows {
            return Err(ProgError::OutOfRange(format!("row {} of {}", i, self.rows)));
        }
        if value.rows != 1 {
            return Err(ProgError::DomainError("value is not a row vector".to_owned()));
        }
        if value.cols != self.cols {
            return Err(ProgError::DomainError(
                "value size does not match the number of columns".to_owned(),
            ));
        }
        self.data[i * self.cols..(i + 1) * self.cols].copy_from_slice(&value.data);
        Ok(())
    }

    /// Overwrites row `i` with the provided values.
    pub fn set_row_slice(&mut self, i: usize, value: &[f64]) -> Result<(), ProgError> {
        if i >= self.rows {
            return Err(ProgError::OutOfRange(format!("row {} of {}", i, self.rows)));
        }
        if value.len() != self.cols {
            return Err(ProgError::DomainError(
                "value size does not match the number of columns".to_owned(),
            ));
        }
        self.data[i * self.cols..(i + 1) * self.cols].copy_from_slice(value);
        Ok(())
    }

    /// Returns column `j` as a freshly allocated m-by-1 matrix.
    pub fn col(&self, j: usize) -> Result<Matrix, ProgError> {
        if j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "column {} of {}",
                j, self.cols
            )));
        }
        let mut r = Matrix::new(self.rows, 1);
        for i in 0..self.rows {
            r[(i, 0)] = self[(i, j)];
        }
        Ok(r)
    }

    /// Overwrites column `j` with the provided m-by-1 matrix.
    pub fn set_col(&mut self, j: usize, value: &Matrix) -> Result<(), ProgError> {
        if j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "column {} of {}",
                j, self.cols
            )));
        }
        if value.cols != 1 {
            return Err(ProgError::DomainError(
                "value is not a column vector".to_owned(),
            ));
        }
        if value.rows != self.rows {
            return Err(ProgError::DomainError(
                "value size does not match the number of rows".to_owned(),
            ));
        }
        for i in 0..self.rows {
            self[(i, j)] = value[(i, 0)];
        }
        Ok(())
    }

    /// Overwrites column `j` with the provided values.
    pub fn set_col_slice(&mut self, j: usize, value: &[f64]) -> Result<(), ProgError> {
        if j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "column {} of {}",
                j, self.cols
            )));
        }
        if value.len() != self.rows {
            return Err(ProgError::DomainError(
                "value size does not match the number of rows".to_owned(),
            ));
        }
        for i in 0..self.rows {
            self[(i, j)] = value[i];
        }
        Ok(())
    }

    /// Returns the matrix with row `i` and column `j` removed.
    pub fn submatrix(&self, i: usize, j: usize) -> Result<Matrix, ProgError> {
        if i >= self.rows || j >= self.cols {
            return Err(ProgError::OutOfRange(format!(
                "({}, {}) is outside a {}x{} matrix",
                i, j, self.rows, self.cols
            )));
        }
        let mut r = Matrix::new(self.rows - 1, self.cols - 1);
        let mut ri = 0;
        for si in (0..self.rows).filter(|&si| si != i) {
            let mut rj = 0;
            for sj in (0..self.cols).filter(|&sj| sj != j) {
                r[(ri, rj)] = self[(si, sj)];
                rj += 1;
            }
            ri += 1;
        }
        Ok(r)
    }

    /// Resizes the matrix in place, copying the overlapping region and
    /// zero-initializing any newly exposed elements.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let mut data = vec![0.0; rows * cols];
        for i in 0..self.rows.min(rows) {
            for j in 0..self.cols.min(cols) {
                data[i * cols + j] = self.data[i * self.cols + j];
            }
        }
        self.rows = rows;
        self.cols = cols;
        self.data = data;
    }

    /// Interprets a single-row or single-column matrix as a plain vector.
    pub fn to_vec(&self) -> Result<Vec<f64>, ProgError> {
        if self.rows != 1 && self.cols != 1 {
            return Err(ProgError::DomainError("matrix is not a vector".to_owned()));
        }
        Ok(self.data.clone())
    }

    /// Applies `f` to every element in place.
    pub fn apply<F: Fn(f64) -> f64>(&mut self, f: F) {
        for e in &mut self.data {
            *e = f(*e);
        }
    }

    /// Element-wise product with a same-shape matrix.
    pub fn elementwise_multiply(&self, rhs: &Matrix) -> Result<Matrix, ProgError> {
        self.same_shape(rhs)?;
        let mut r = self.clone();
        for (e, o) in r.data.iter_mut().zip(rhs.data.iter()) {
            *e *= o;
        }
        Ok(r)
    }

    /// Element-wise quotient with a same-shape matrix.
    pub fn elementwise_divide(&self, rhs: &Matrix) -> Result<Matrix, ProgError> {
        self.same_shape(rhs)?;
        let mut r = self.clone();
        for (e, o) in r.data.iter_mut().zip(rhs.data.iter()) {
            *e /= o;
        }
        Ok(r)
    }

    pub fn transpose(&self) -> Matrix {
        let mut r = Matrix::new(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                r[(j, i)] = self[(i, j)];
            }
        }
        r
    }

    /// Returns the main diagonal as a column vector.
    pub fn diagonal(&self) -> Matrix {
        let len = self.rows.min(self.cols);
        let mut r = Matrix::new(len, 1);
        for i in 0..len {
            r[(i, 0)] = self[(i, i)];
        }
        r
    }

    /// Signed minor: `(-1)^(i+j)` times the determinant of the submatrix
    /// obtained by deleting row `i` and column `j`.
    pub fn cofactor(&self, i: usize, j: usize) -> Result<f64, ProgError> {
        let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
        Ok(sign * self.minor(i, j)?)
    }

    /// Determinant of the submatrix obtained by deleting row `i` and
    /// column `j`.
    pub fn minor(&self, i: usize, j: usize) -> Result<f64, ProgError> {
        self.require_square("minor")?;
        self.submatrix(i, j)?.determinant()
    }

    /// The matrix of minors.
    pub fn minors(&self) -> Result<Matrix, ProgError> {
        self.require_square("minors")?;
        let mut r = Matrix::new(self.rows, self.cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                r[(i, j)] = self.minor(i, j)?;
            }
        }
        Ok(r)
    }

    /// The matrix of cofactors.
    pub fn cofactors(&self) -> Result<Matrix, ProgError> {
        self.require_square("cofactors")?;
        let mut r = Matrix::new(self.rows, self.cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                r[(i, j)] = self.cofactor(i, j)?;
            }
        }
        Ok(r)
    }

    /// The adjoint (transposed cofactor matrix).
    pub fn adjoint(&self) -> Result<Matrix, ProgError> {
        Ok(self.cofactors()?.transpose())
    }

    /// Inverse via the adjoint and the determinant.
    pub fn inverse(&self) -> Result<Matrix, ProgError> {
        self.require_square("inverse")?;
        let d = self.determinant()?;
        if d.abs() < SINGULARITY_TOL {
            return Err(ProgError::DomainError("matrix is singular".to_owned()));
        }
        Ok(self.adjoint()? / d)
    }

    /// Determinant via Crout LU decomposition, falling back to Laplace
    /// cofactor expansion along the first column when no pivoting
    /// interchange can produce a usable leading element.
    pub fn determinant(&self) -> Result<f64, ProgError> {
        self.require_square("determinant")?;
        // The empty determinant is 1 so that the minor of a 1x1 matrix is
        // well-defined.
        if self.rows == 0 {
            return Ok(1.0);
        }
        if let Some((lu, sign)) = self.crout_internal() {
            let mut r = sign;
            for i in 0..self.rows {
                r *= lu[(i, i)];
            }
            return Ok(r);
        }
        self.laplace_det()
    }

    /// Cholesky factor R such that `R * R^T == self`.
    ///
    /// The input must be symmetric to within 1e-15; positive-definiteness is
    /// checked structurally by the appearance of NaN or infinity in the
    /// factor.
    pub fn chol(&self) -> Result<Matrix, ProgError> {
        self.require_square("chol")?;
        for i in 1..self.rows {
            for j in 0..i {
                if (self[(i, j)] - self[(j, i)]).abs() > 1e-15 {
                    return Err(ProgError::DomainError(
                        "matrix is not symmetric".to_owned(),
                    ));
                }
            }
        }

        let mut r = Matrix::new(self.rows, self.cols);
        for k in 0..self.rows {
            let mut sum = 0.0;
            for p in 0..k {
                sum += r[(k, p)] * r[(k, p)];
            }
            r[(k, k)] = (self[(k, k)] - sum).sqrt();
            for i in k + 1..self.rows {
                let mut s = 0.0;
                for p in 0..k {
                    s += r[(i, p)] * r[(k, p)];
                }
                r[(i, k)] = (self[(i, k)] - s) / r[(k, k)];
            }
        }

        if r.data.iter().any(|e| e.is_nan() || e.is_infinite()) {
            return Err(ProgError::DomainError(
                "matrix is not positive definite".to_owned(),
            ));
        }
        Ok(r)
    }

    /// Weighted mean of the columns: `self * w` with `w` an n-by-1 column of
    /// weights. Rows are the variables, columns the samples or sigma points.
    pub fn weighted_mean(&self, w: &Matrix) -> Result<Matrix, ProgError> {
        if w.rows != self.cols || w.cols != 1 {
            return Err(ProgError::DomainError(
                "w is not a column vector with one weight per column".to_owned(),
            ));
        }
        Ok(self * w)
    }

    /// Weighted covariance of the columns for sigma-point recombination.
    ///
    /// Returns `sum_i w_i (a_i - mu)(a_i - mu)^T` plus the zeroth-weight
    /// correction `(1 - alpha^2 + beta) (a_0 - mu)(a_0 - mu)^T` of the
    /// scaled unscented transform. With `alpha = 1`, `beta = 0` the
    /// correction vanishes.
    pub fn weighted_covariance(
        &self,
        w: &Matrix,
        alpha: f64,
        beta: f64,
    ) -> Result<Matrix, ProgError> {
        let mean = self.weighted_mean(w)?;
        let mut result = Matrix::new(self.rows, self.rows);
        for i in 0..self.cols {
            let diff = self.col(i)? - &mean;
            result += &(&(&diff * &diff.transpose()) * w[(i, 0)]);
        }
        let diff0 = self.col(0)? - &mean;
        result += &(&(&diff0 * &diff0.transpose()) * (1.0 - alpha * alpha + beta));
        Ok(result)
    }

    fn same_shape(&self, rhs: &Matrix) -> Result<(), ProgError> {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            return Err(ProgError::DomainError(format!(
                "matrices are different sizes ({}x{} vs {}x{})",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        Ok(())
    }

    fn require_square(&self, op: &str) -> Result<(), ProgError> {
        if !self.is_square() {
            return Err(ProgError::DomainError(format!(
                "{} requires a square matrix, got {}x{}",
                op, self.rows, self.cols
            )));
        }
        Ok(())
    }

    /// Laplace cofactor expansion along the first column.
    fn laplace_det(&self) -> Result<f64, ProgError> {
        match self.rows {
            0 => Ok(1.0),
            1 => Ok(self.data[0]),
            2 => Ok(self.data[0] * self.data[3] - self.data[1] * self.data[2]),
            _ => {
                let mut r = 0.0;
                for i in 0..self.rows {
                    let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                    r += sign * self[(i, 0)] * self.submatrix(i, 0)?.determinant()?;
                }
                Ok(r)
            }
        }
    }

    /// Crout decomposition with L and U sharing the original footprint.
    ///
    /// If the leading element is near zero, a row interchange is tried
    /// first, then a column interchange; each interchange flips the sign of
    /// the determinant. Returns None when no interchange can produce a
    /// non-zero leading element.
    fn crout_internal(&self) -> Option<(Matrix, f64)> {
        let mut sign = 1.0;
        let mut r = self.clone();
        if self.data[0].abs() < SINGULARITY_TOL {
            let pivot_row = (0..self.rows).find(|&i| r[(i, 0)].abs() > SINGULARITY_TOL);
            if let Some(i) = pivot_row {
                let tmp = r.row(0).ok()?;
                let other = r.row(i).ok()?;
                r.set_row(0, &other).ok()?;
                r.set_row(i, &tmp).ok()?;
                sign = -1.0;
            } else {
                let pivot_col = (0..self.cols).find(|&j| r[(0, j)].abs() > SINGULARITY_TOL)?;
                let tmp = r.col(0).ok()?;
                let other = r.col(pivot_col).ok()?;
                r.set_col(0, &other).ok()?;
                r.set_col(pivot_col, &tmp).ok()?;
                sign = -1.0;
            }
        }

        let n = self.rows;
        for k in 0..n {
            for i in k..n {
                let mut sum = 0.0;
                for p in 0..k {
                    sum += r[(i, p)] * r[(p, k)];
                }
                r[(i, k)] -= sum;
            }
            for j in k + 1..n {
                let mut sum = 0.0;
                for p in 0..k {
                    sum += r[(k, p)] * r[(p, j)];
                }
                r[(k, j)] = (r[(k, j)] - sum) / r[(k, k)];
            }
        }
        Some((r, sign))
    }
}

/// Unchecked access; indexing outside the matrix is a programming error.
impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        debug_assert!(i < self.rows && j < self.cols);
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        debug_assert!(i < self.rows && j < self.cols);
        &mut self.data[i * self.cols + j]
    }
}

/// Equal when the shapes match and every pair of elements is within ten
/// machine epsilons; NaN compares equal to NaN so that uninitialized cells
/// do not poison the comparison.
impl PartialEq for Matrix {
    fn eq(&self, rhs: &Matrix) -> bool {
        self.rows == rhs.rows
            && self.cols == rhs.cols
            && self
                .data
                .iter()
                .zip(rhs.data.iter())
                .all(|(a, b)| (a - b).abs() <= f64::EPSILON * 10.0 || (a.is_nan() && b.is_nan()))
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: &Matrix) -> Matrix {
        assert!(
            self.rows == rhs.rows && self.cols == rhs.cols,
            "matrices are different sizes"
        );
        let mut r = self.clone();
        r += rhs;
        r
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Matrix) -> Matrix {
        &self + &rhs
    }
}

impl Add<&Matrix> for Matrix {
    type Output = Matrix;

    fn add(self, rhs: &Matrix) -> Matrix {
        &self + rhs
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, rhs: &Matrix) {
        assert!(
            self.rows == rhs.rows && self.cols == rhs.cols,
            "matrices are different sizes"
        );
        for (e, o) in self.data.iter_mut().zip(rhs.data.iter()) {
            *e += o;
        }
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: &Matrix) -> Matrix {
        assert!(
            self.rows == rhs.rows && self.cols == rhs.cols,
            "matrices are different sizes"
        );
        let mut r = self.clone();
        r -= rhs;
        r
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Matrix) -> Matrix {
        &self - &rhs
    }
}

impl Sub<&Matrix> for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: &Matrix) -> Matrix {
        &self - rhs
    }
}

impl SubAssign<&Matrix> for Matrix {
    fn sub_assign(&mut self, rhs: &Matrix) {
        assert!(
            self.rows == rhs.rows && self.cols == rhs.cols,
            "matrices are different sizes"
        );
        for (e, o) in self.data.iter_mut().zip(rhs.data.iter()) {
            *e -= o;
        }
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        assert!(
            self.cols == rhs.rows,
            "inner matrix dimensions do not match"
        );
        let mut r = Matrix::new(self.rows, rhs.cols);
        for i in 0..self.rows {
            for j in 0..rhs.cols {
                let mut e = 0.0;
                for k in 0..self.cols {
                    e += self[(i, k)] * rhs[(k, j)];
                }
                r[(i, j)] = e;
            }
        }
        r
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        &self * &rhs
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        let mut r = self.clone();
        r.apply(|e| -e);
        r
    }
}

impl Neg for Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        -&self
    }
}

macro_rules! scalar_op {
    ($trait:ident, $fn:ident, $op:tt) => {
        impl $trait<f64> for &Matrix {
            type Output = Matrix;

            fn $fn(self, rhs: f64) -> Matrix {
                let mut r = self.clone();
                r.apply(|e| e $op rhs);
                r
            }
        }

        impl $trait<f64> for Matrix {
            type Output = Matrix;

            fn $fn(mut self, rhs: f64) -> Matrix {
                self.apply(|e| e $op rhs);
                self
            }
        }
    };
}

scalar_op!(Add, add, +);
scalar_op!(Sub, sub, -);
scalar_op!(Mul, mul, *);
scalar_op!(Div, div, /);
scalar_op!(Rem, rem, %);

impl Mul<&Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        rhs * self
    }
}

impl Mul<Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        &rhs * self
    }
}

impl MulAssign<f64> for Matrix {
    fn mul_assign(&mut self, rhs: f64) {
        self.apply(|e| e * rhs);
    }
}

impl DivAssign<f64> for Matrix {
    fn div_assign(&mut self, rhs: f64) {
        self.apply(|e| e / rhs);
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.rows {
            for j in 0..self.cols {
                write!(f, "{} ", self[(i, j)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat3(values: [f64; 9]) -> Matrix {
        Matrix::from_row_major(3, 3, &values).unwrap()
    }

    #[test]
    fn identity_multiplication() {
        let v = Matrix::from_column(&[1.0, 2.0, 3.0]);
        assert_eq!(&Matrix::identity(3) * &v, v);
    }

    #[test]
    fn addition_commutes() {
        let a = mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let b = mat3([9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert_eq!(&a + &b, &b + &a);
    }

    #[test]
    fn multiplication_associates() {
        let a = mat3([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0]);
        let b = mat3([2.0, 0.0, 1.0, 1.0, 3.0, 0.0, 0.0, 1.0, 4.0]);
        let c = mat3([1.0, 1.0, 0.0, 0.0, 2.0, 1.0, 3.0, 0.0, 1.0]);
        assert_eq!(&(&a * &b) * &c, &a * &(&b * &c));
    }

    #[test]
    fn transpose_involution() {
        let a = Matrix::from_row_major(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.transpose().transpose(), a);
    }

    #[test]
    fn inverse_3x3() {
        let a = mat3([3.0, 5.0, 7.0, 19.0, 17.0, 13.0, 11.0, 3.0, 1.0]);
        let inv = a.inverse().unwrap();
        let expected = mat3([
            11.0 / 178.0,
            -4.0 / 89.0,
            27.0 / 178.0,
            -31.0 / 89.0,
            37.0 / 178.0,
            -47.0 / 178.0,
            65.0 / 178.0,
            -23.0 / 178.0,
            11.0 / 89.0,
        ]);
        for i in 0..3 {
            for j in 0..3 {
                assert!((inv[(i, j)] - expected[(i, j)]).abs() < 1e-12);
            }
        }
        // A * A^-1 is the identity for well-conditioned A
        let prod = &a * &inv;
        let id = Matrix::identity(3);
        for i in 0..3 {
            for j in 0..3 {
                assert!((prod[(i, j)] - id[(i, j)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn cholesky() {
        let a = mat3([25.0, 15.0, -5.0, 15.0, 18.0, 0.0, -5.0, 0.0, 11.0]);
        let r = a.chol().unwrap();
        let expected = mat3([5.0, 0.0, 0.0, 3.0, 3.0, 0.0, -1.0, 1.0, 3.0]);
        assert_eq!(r, expected);
        assert_eq!(&r * &r.transpose(), a);
    }

    #[test]
    fn cholesky_rejects_asymmetry() {
        let a = mat3([25.0, 15.0, -5.0, 15.0, 18.0, 0.0, -5.0, 1.0, 11.0]);
        assert!(matches!(a.chol(), Err(ProgError::DomainError(_))));
    }

    #[test]
    fn cholesky_rejects_non_positive_definite() {
        let a = mat3([1.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(a.chol(), Err(ProgError::DomainError(_))));
    }

    #[test]
    fn weighted_mean() {
        let a = Matrix::from_row_major(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let w = Matrix::from_column(&[0.2, 0.8]);
        let mean = a.weighted_mean(&w).unwrap();
        assert_eq!(mean, Matrix::from_column(&[1.8, 3.8, 5.8]));
    }

    #[test]
    fn weighted_covariance_of_point_mass() {
        // All columns identical: zero spread regardless of scaling.
        let a = Matrix::from_row_major(2, 3, &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        let w = Matrix::from_column(&[0.5, 0.25, 0.25]);
        let cov = a.weighted_covariance(&w, 1.0, 0.0).unwrap();
        assert_eq!(cov, Matrix::new(2, 2));
    }

    #[test]
    fn determinant_product_rule() {
        let a = mat3([2.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 4.0]);
        let b = mat3([1.0, 0.0, 2.0, 0.0, 1.0, 1.0, 2.0, 1.0, 0.0]);
        let lhs = (&a * &b).determinant().unwrap();
        let rhs = a.determinant().unwrap() * b.determinant().unwrap();
        assert!((lhs - rhs).abs() < 1e-9);
    }

    #[test]
    fn determinant_pivots_on_zero_leading_element() {
        let a = mat3([0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
        // Laplace along the first column: 0 - 3*(0 - 2) + 1*(1 - 0) = 7
        assert!((a.determinant().unwrap() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn determinant_of_structurally_singular_matrix() {
        // First row and column all zero: no interchange helps and the
        // Laplace fallback reports zero.
        let a = mat3([0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 3.0, 4.0]);
        assert!((a.determinant().unwrap() - 0.0).abs() < 1e-12);
        assert!(matches!(a.inverse(), Err(ProgError::DomainError(_))));
    }

    #[test]
    fn nan_cells_compare_equal() {
        let mut a = Matrix::new(2, 2);
        let mut b = Matrix::new(2, 2);
        a[(0, 1)] = f64::NAN;
        b[(0, 1)] = f64::NAN;
        assert_eq!(a, b);
        b[(1, 0)] = 1.0;
        assert_ne!(a, b);
    }

    #[test]
    fn concatenation() {
        let a = Matrix::from_row_major(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]).unwrap();
        let b = Matrix::from_row_major(1, 2, &[4.0, 4.0]).unwrap();
        let c = Matrix::from_column(&[5.0, 6.0, 7.0]);

        let rows = Matrix::concat(&[&a, &b]).unwrap();
        assert_eq!(rows.rows(), 4);
        assert_eq!(rows[(3, 1)], 4.0);

        let cols = Matrix::concat(&[&a, &c]).unwrap();
        assert_eq!(cols.cols(), 3);
        assert_eq!(cols[(1, 2)], 6.0);

        // Same shape both ways is ambiguous without a target size.
        let err = Matrix::concat(&[&a, &a]);
        assert!(matches!(err, Err(ProgError::DomainError(_))));
        let sized = Matrix::concat_sized(6, 2, &[&a, &a]).unwrap();
        assert_eq!(sized[(5, 0)], 3.0);
    }

    #[test]
    fn resize_copies_overlap() {
        let mut a = Matrix::from_row_major(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        a.resize(3, 3);
        assert_eq!(a[(1, 1)], 4.0);
        assert_eq!(a[(2, 2)], 0.0);
        a.resize(1, 1);
        assert_eq!(a[(0, 0)], 1.0);
    }

    #[test]
    fn access_errors() {
        let mut a = Matrix::new(2, 2);
        assert!(matches!(a.at(2, 0), Err(ProgError::OutOfRange(_))));
        assert!(matches!(a.row(5), Err(ProgError::OutOfRange(_))));
        assert!(matches!(
            a.set_row(0, &Matrix::new(1, 3)),
            Err(ProgError::DomainError(_))
        ));
        assert!(matches!(
            a.set_col(0, &Matrix::new(3, 1)),
            Err(ProgError::DomainError(_))
        ));
        assert!(a.set(1, 1, 9.0).is_ok());
        assert_eq!(a.at(1, 1).unwrap(), 9.0);
    }

    #[test]
    fn scalar_and_elementwise_ops() {
        let a = Matrix::from_row_major(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(&a + 1.0, Matrix::from_row_major(2, 2, &[2.0, 3.0, 4.0, 5.0]).unwrap());
        assert_eq!(&a * 2.0, Matrix::from_row_major(2, 2, &[2.0, 4.0, 6.0, 8.0]).unwrap());
        assert_eq!(&a % 2.0, Matrix::from_row_major(2, 2, &[1.0, 0.0, 1.0, 0.0]).unwrap());
        let b = Matrix::from_row_major(2, 2, &[2.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(
            a.elementwise_multiply(&b).unwrap(),
            Matrix::from_row_major(2, 2, &[2.0, 4.0, 6.0, 8.0]).unwrap()
        );
        assert_eq!(
            a.elementwise_divide(&b).unwrap(),
            Matrix::from_row_major(2, 2, &[0.5, 1.0, 1.5, 2.0]).unwrap()
        );
        let mut c = a.clone();
        c.apply(|e| e * e);
        assert_eq!(c, Matrix::from_row_major(2, 2, &[1.0, 4.0, 9.0, 16.0]).unwrap());
    }

    #[test]
    fn adjoint_and_cofactors() {
        let a = Matrix::from_row_major(2, 2, &[4.0, 7.0, 2.0, 6.0]).unwrap();
        let adj = a.adjoint().unwrap();
        assert_eq!(adj, Matrix::from_row_major(2, 2, &[6.0, -7.0, -2.0, 4.0]).unwrap());
        let rect = Matrix::new(2, 3);
        assert!(matches!(rect.cofactors(), Err(ProgError::DomainError(_))));
    }

    #[test]
    fn inverse_of_a_scalar_matrix() {
        let a = Matrix::from_row_major(1, 1, &[4.0]).unwrap();
        let inv = a.inverse().unwrap();
        assert!((inv[(0, 0)] - 0.25).abs() < 1e-15);
    }
}
