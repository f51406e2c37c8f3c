//! Linear constraints: `expr >= 0` inequalities and `expr = 0` equalities.

use crate::algebra::expr::LinExpr;
use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

/// A linear constraint over a piece's columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is expr >= 0 or expr = 0)
    pub expr: LinExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Create an inequality constraint: expr >= 0.
    pub fn ge_zero(expr: LinExpr) -> Self {
        Self {
            expr,
            kind: ConstraintKind::Inequality,
        }
    }

    /// Create an equality constraint: expr = 0.
    pub fn eq_zero(expr: LinExpr) -> Self {
        Self {
            expr,
            kind: ConstraintKind::Equality,
        }
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check whether the constraint holds at a point.
    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        let v = self.expr.evaluate(values);
        match self.kind {
            ConstraintKind::Inequality => v >= 0,
            ConstraintKind::Equality => v == 0,
        }
    }

    /// True when the constraint has no column coefficients and cannot hold.
    pub fn is_trivially_infeasible(&self) -> bool {
        if !self.expr.is_constant() {
            return false;
        }
        match self.kind {
            ConstraintKind::Inequality => self.expr.constant < 0,
            ConstraintKind::Equality => self.expr.constant != 0,
        }
    }

    /// True when the constraint holds everywhere.
    pub fn is_trivially_true(&self) -> bool {
        if !self.expr.is_constant() {
            return false;
        }
        match self.kind {
            ConstraintKind::Inequality => self.expr.constant >= 0,
            ConstraintKind::Equality => self.expr.constant == 0,
        }
    }

    /// Gcd-normalize the constraint. For an inequality the constant is
    /// tightened with floor division (sound and exact over the integers);
    /// an equality whose constant is not divisible by the coefficient gcd
    /// is turned into the canonical infeasible constraint `-1 >= 0`.
    pub fn normalized(&self) -> Self {
        let g = self.expr.coeff_gcd();
        if g <= 1 {
            return self.clone();
        }
        match self.kind {
            ConstraintKind::Inequality => {
                let coeffs = self.expr.coeffs.iter().map(|&c| c / g).collect();
                let constant = self.expr.constant.div_floor(&g);
                Self::ge_zero(LinExpr { constant, coeffs })
            }
            ConstraintKind::Equality => {
                if self.expr.constant % g != 0 {
                    Self::ge_zero(LinExpr::constant(-1, self.expr.n_cols()))
                } else {
                    let coeffs = self.expr.coeffs.iter().map(|&c| c / g).collect();
                    Self::eq_zero(LinExpr {
                        constant: self.expr.constant / g,
                        coeffs,
                    })
                }
            }
        }
    }

    /// Negation of an inequality: `expr >= 0` becomes `-expr - 1 >= 0`.
    /// Only valid for inequalities.
    pub fn negated(&self) -> Self {
        debug_assert!(!self.is_equality());
        let mut e = -self.expr.clone();
        e.constant -= 1;
        Self::ge_zero(e)
    }

    /// Render with column names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let op = match self.kind {
            ConstraintKind::Inequality => ">=",
            ConstraintKind::Equality => "=",
        };
        format!("{} {} 0", self.expr.to_string_with_names(names), op)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.expr.n_cols()).map(|i| format!("c{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfaction() {
        // i - 1 >= 0
        let mut e = LinExpr::var(0, 1);
        e.constant = -1;
        let c = Constraint::ge_zero(e);
        assert!(c.is_satisfied(&[1]));
        assert!(!c.is_satisfied(&[0]));
    }

    #[test]
    fn test_normalize_tightens() {
        // 2i - 1 >= 0  =>  i - 1 >= 0 (i.e. i >= 1 over the integers)
        let mut e = LinExpr::zero(1);
        e.coeffs[0] = 2;
        e.constant = -1;
        let n = Constraint::ge_zero(e).normalized();
        assert_eq!(n.expr.coeff(0), 1);
        assert_eq!(n.expr.constant, -1);
    }

    #[test]
    fn test_normalize_infeasible_equality() {
        // 2i - 1 = 0 has no integer solution
        let mut e = LinExpr::zero(1);
        e.coeffs[0] = 2;
        e.constant = -1;
        let n = Constraint::eq_zero(e).normalized();
        assert!(n.is_trivially_infeasible());
    }

    #[test]
    fn test_negated() {
        // i >= 0 negated is -i - 1 >= 0, i.e. i <= -1
        let c = Constraint::ge_zero(LinExpr::var(0, 1)).negated();
        assert!(c.is_satisfied(&[-1]));
        assert!(!c.is_satisfied(&[0]));
    }
}
