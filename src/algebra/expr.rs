//! Linear expressions over a flat column vector.
//!
//! An expression is a linear combination of columns plus a constant:
//! `e(x) = c0 + c1*x1 + ... + cn*xn`. Column meaning (set dimension, map
//! input/output dimension, existential dimension) is assigned by the owning
//! piece.

use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// A linear expression: constant + sum(coeff[i] * col[i]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficient per column
    pub coeffs: Vec<i64>,
}

impl LinExpr {
    /// Create a zero expression over `n_cols` columns.
    pub fn zero(n_cols: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_cols],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_cols: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_cols],
        }
    }

    /// Create a unit expression for a single column.
    pub fn var(col: usize, n_cols: usize) -> Self {
        let mut coeffs = vec![0; n_cols];
        if col < n_cols {
            coeffs[col] = 1;
        }
        Self {
            constant: 0,
            coeffs,
        }
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.coeffs.len()
    }

    /// Coefficient for a column (0 when out of range).
    pub fn coeff(&self, col: usize) -> i64 {
        self.coeffs.get(col).copied().unwrap_or(0)
    }

    /// True when every column coefficient is zero.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// Evaluate at a concrete point.
    pub fn evaluate(&self, values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Scale by a constant factor.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Gcd of all column coefficients (not the constant); 0 for a constant
    /// expression.
    pub fn coeff_gcd(&self) -> i64 {
        self.coeffs.iter().fold(0i64, |acc, &c| acc.gcd(&c))
    }

    /// Rebuild the expression over `n_cols` new columns, sending old column
    /// `i` to new column `mapping[i]`.
    pub fn remap(&self, n_cols: usize, mapping: &[usize]) -> Self {
        let mut coeffs = vec![0i64; n_cols];
        for (old, &new) in mapping.iter().enumerate() {
            coeffs[new] += self.coeff(old);
        }
        Self {
            constant: self.constant,
            coeffs,
        }
    }

    /// Drop a column, shifting the ones above it down. The dropped column
    /// must have a zero coefficient.
    pub fn drop_col(&self, col: usize) -> Self {
        debug_assert_eq!(self.coeff(col), 0);
        let mut coeffs = self.coeffs.clone();
        if col < coeffs.len() {
            coeffs.remove(col);
        }
        Self {
            constant: self.constant,
            coeffs,
        }
    }

    /// Append `extra` fresh zero columns.
    pub fn extend_cols(&self, extra: usize) -> Self {
        let mut coeffs = self.coeffs.clone();
        coeffs.extend(std::iter::repeat(0).take(extra));
        Self {
            constant: self.constant,
            coeffs,
        }
    }

    /// Render with the given column names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let mut parts = Vec::new();
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let fallback = format!("c{}", i);
            let name = names.get(i).map(|s| s.as_str()).unwrap_or(&fallback);
            if c == 1 {
                parts.push(name.to_string());
            } else if c == -1 {
                parts.push(format!("-{}", name));
            } else {
                parts.push(format!("{}*{}", c, name));
            }
        }
        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        parts.join(" + ").replace("+ -", "- ")
    }
}

impl Add for LinExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }
}

impl Sub for LinExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        Self {
            constant: self.constant - other.constant,
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(&a, &b)| a - b)
                .collect(),
        }
    }
}

impl Neg for LinExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.n_cols()).map(|i| format!("c{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&names))
    }
}
