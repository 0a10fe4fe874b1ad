//! Rational Gaussian elimination.

use num_rational::BigRational;
use num_traits::Zero;

/// Solve the square system `a * x = b` exactly.
///
/// Returns `None` when the matrix is singular.
#[must_use]
pub fn solve_square(a: &[Vec<BigRational>], b: &[BigRational]) -> Option<Vec<BigRational>> {
    let n = a.len();
    if n == 0 || a.iter().any(|row| row.len() != n) || b.len() != n {
        return None;
    }
    // augmented matrix
    let mut m: Vec<Vec<BigRational>> = a
        .iter()
        .zip(b.iter())
        .map(|(row, rhs)| {
            let mut r = row.clone();
            r.push(rhs.clone());
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).find(|&r| !m[r][col].is_zero())?;
        m.swap(col, pivot_row);
        let pivot = m[col][col].clone();
        for entry in m[col].iter_mut() {
            *entry = &*entry / &pivot;
        }
        for row in 0..n {
            if row == col || m[row][col].is_zero() {
                continue;
            }
            let factor = m[row][col].clone();
            for k in col..=n {
                let delta = &factor * &m[col][k];
                m[row][k] = &m[row][k] - &delta;
            }
        }
    }
    Some(m.into_iter().map(|row| row[n].clone()).collect())
}

/// Determinant of a square matrix.
#[must_use]
pub fn determinant(a: &[Vec<BigRational>]) -> BigRational {
    let n = a.len();
    let mut m: Vec<Vec<BigRational>> = a.to_vec();
    let mut det = BigRational::from_integer(1.into());
    for col in 0..n {
        let Some(pivot_row) = (col..n).find(|&r| !m[r][col].is_zero()) else {
            return BigRational::zero();
        };
        if pivot_row != col {
            m.swap(col, pivot_row);
            det = -det;
        }
        let pivot = m[col][col].clone();
        det *= &pivot;
        for row in (col + 1)..n {
            if m[row][col].is_zero() {
                continue;
            }
            let factor = &m[row][col] / &pivot;
            for k in col..n {
                let delta = &factor * &m[col][k];
                m[row][k] = &m[row][k] - &delta;
            }
        }
    }
    det
}

/// Rank of a rectangular matrix.
#[must_use]
pub fn rank(rows: &[Vec<BigRational>]) -> usize {
    let mut m: Vec<Vec<BigRational>> = rows.to_vec();
    let n_cols = m.first().map_or(0, Vec::len);
    let mut rank = 0;
    for col in 0..n_cols {
        let Some(pivot_row) = (rank..m.len()).find(|&r| !m[r][col].is_zero()) else {
            continue;
        };
        m.swap(rank, pivot_row);
        let pivot = m[rank][col].clone();
        for row in (rank + 1)..m.len() {
            if m[row][col].is_zero() {
                continue;
            }
            let factor = &m[row][col] / &pivot;
            for k in col..n_cols {
                let delta = &factor * &m[rank][k];
                m[row][k] = &m[row][k] - &delta;
            }
        }
        rank += 1;
        if rank == m.len() {
            break;
        }
    }
    rank
}

/// Dimension of the affine hull of a point set (0 for a single point).
#[must_use]
pub fn affine_rank(points: &[Vec<BigRational>]) -> usize {
    let Some((first, rest)) = points.split_first() else {
        return 0;
    };
    let diffs: Vec<Vec<BigRational>> = rest
        .iter()
        .map(|p| p.iter().zip(first.iter()).map(|(a, b)| a - b).collect())
        .collect();
    rank(&diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn test_solve_square_2x2() {
        // x + y = 3, x - y = 1  =>  x = 2, y = 1
        let a = vec![vec![rat(1), rat(1)], vec![rat(1), rat(-1)]];
        let b = vec![rat(3), rat(1)];
        let x = solve_square(&a, &b).unwrap();
        assert_eq!(x, vec![rat(2), rat(1)]);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let a = vec![vec![rat(1), rat(2)], vec![rat(2), rat(4)]];
        let b = vec![rat(1), rat(2)];
        assert!(solve_square(&a, &b).is_none());
    }

    #[test]
    fn test_determinant() {
        let a = vec![vec![rat(2), rat(0)], vec![rat(0), rat(3)]];
        assert_eq!(determinant(&a), rat(6));
        let b = vec![vec![rat(1), rat(2)], vec![rat(2), rat(4)]];
        assert_eq!(determinant(&b), rat(0));
    }

    #[test]
    fn test_affine_rank_of_triangle() {
        let points = vec![
            vec![rat(0), rat(0)],
            vec![rat(1), rat(0)],
            vec![rat(0), rat(1)],
        ];
        assert_eq!(affine_rank(&points), 2);

        let collinear = vec![
            vec![rat(0), rat(0)],
            vec![rat(1), rat(1)],
            vec![rat(2), rat(2)],
        ];
        assert_eq!(affine_rank(&collinear), 1);
    }
}
