//! Parser for the textual set and relation notation.
//!
//! The accepted grammar follows the usual polyhedral surface syntax:
//!
//! ```text
//! { S[i, j] : 0 <= i < 4 and 0 <= j <= i }
//! { S[i] -> A[i - 1] : 1 <= i <= 3; T[i] -> A[i] : 0 <= i < 4 }
//! { [i] : exists q: i = 2*q and 0 <= i < 10 }
//! ```
//!
//! Tuple positions holding anything other than a fresh identifier become
//! anonymous dimensions pinned by an equality, so `S[i] -> [0, i]` works as
//! expected. Chained comparisons expand pairwise.

use crate::algebra::constraint::Constraint;
use crate::algebra::expr::LinExpr;
use crate::algebra::map::{BasicMap, Map};
use crate::algebra::set::{BasicSet, Set};
use crate::algebra::space::Tuple;
use crate::error::AlgebraError;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Int(i64),
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    Comma,
    Semi,
    Colon,
    Arrow,
    Plus,
    Minus,
    Star,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

fn tokenize(text: &str) -> Result<Vec<Tok>, AlgebraError> {
    let err = |message: &str| AlgebraError::Parse {
        message: message.to_string(),
        text: text.to_string(),
    };
    let bytes = text.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '{' => {
                toks.push(Tok::LBrace);
                i += 1;
            }
            '}' => {
                toks.push(Tok::RBrace);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBrack);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBrack);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            ';' => {
                toks.push(Tok::Semi);
                i += 1;
            }
            ':' => {
                toks.push(Tok::Colon);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '-' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    toks.push(Tok::Arrow);
                    i += 2;
                } else {
                    toks.push(Tok::Minus);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                } else {
                    i += 1;
                }
                toks.push(Tok::Eq);
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n: i64 = text[start..i].parse().map_err(|_| err("integer overflow"))?;
                toks.push(Tok::Int(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric()
                        || bytes[i] == b'_'
                        || bytes[i] == b'\'')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(text[start..i].to_string()));
            }
            _ => return Err(err(&format!("unexpected character {:?}", c))),
        }
    }
    Ok(toks)
}

/// An unresolved linear expression: constant plus named terms.
#[derive(Debug, Clone, Default)]
struct Ast {
    constant: i64,
    terms: Vec<(i64, String)>,
}

impl Ast {
    fn single_fresh_name(&self) -> Option<&str> {
        if self.constant == 0 && self.terms.len() == 1 && self.terms[0].0 == 1 {
            Some(&self.terms[0].1)
        } else {
            None
        }
    }

    fn lower(&self, scope: &HashMap<String, usize>, n_cols: usize) -> Result<LinExpr, AlgebraError> {
        let mut e = LinExpr::constant(self.constant, n_cols);
        for (coeff, name) in &self.terms {
            let col = *scope
                .get(name)
                .ok_or_else(|| AlgebraError::UnknownDimension(name.clone()))?;
            e.coeffs[col] += coeff;
        }
        Ok(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelOp {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

struct RawTuple {
    name: Option<String>,
    args: Vec<Ast>,
}

struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    text: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, AlgebraError> {
        Ok(Self {
            toks: tokenize(text)?,
            pos: 0,
            text,
        })
    }

    fn err(&self, message: &str) -> AlgebraError {
        AlgebraError::Parse {
            message: message.to_string(),
            text: self.text.to_string(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: Tok) -> Result<(), AlgebraError> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            other => Err(self.err(&format!("expected {:?}, found {:?}", tok, other))),
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(s)) if s == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// term := ['-']* (int ['*'] [ident] | ident)
    fn term(&mut self) -> Result<Ast, AlgebraError> {
        let mut sign = 1i64;
        while self.eat(&Tok::Minus) {
            sign = -sign;
        }
        match self.next() {
            Some(Tok::Int(n)) => {
                // allow both `2*i` and `2i`, but never bind the keywords
                // `and`/`exists` as a juxtaposed dimension
                let has_star = self.eat(&Tok::Star);
                let next_is_dim =
                    matches!(self.peek(), Some(Tok::Ident(s)) if s != "and" && s != "exists");
                if next_is_dim {
                    if let Some(Tok::Ident(name)) = self.next() {
                        return Ok(Ast {
                            constant: 0,
                            terms: vec![(sign * n, name)],
                        });
                    }
                    unreachable!()
                } else if has_star {
                    Err(self.err("expected identifier after '*'"))
                } else {
                    Ok(Ast {
                        constant: sign * n,
                        terms: Vec::new(),
                    })
                }
            }
            Some(Tok::Ident(name)) => Ok(Ast {
                constant: 0,
                terms: vec![(sign, name)],
            }),
            other => Err(self.err(&format!("expected term, found {:?}", other))),
        }
    }

    /// expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Ast, AlgebraError> {
        let mut acc = self.term()?;
        loop {
            let negate = if self.eat(&Tok::Plus) {
                false
            } else if self.peek() == Some(&Tok::Minus) {
                self.pos += 1;
                true
            } else {
                break;
            };
            let t = self.term()?;
            let factor = if negate { -1 } else { 1 };
            acc.constant += factor * t.constant;
            for (c, n) in t.terms {
                acc.terms.push((factor * c, n));
            }
        }
        Ok(acc)
    }

    fn relop(&mut self) -> Option<RelOp> {
        let op = match self.peek()? {
            Tok::Le => RelOp::Le,
            Tok::Lt => RelOp::Lt,
            Tok::Ge => RelOp::Ge,
            Tok::Gt => RelOp::Gt,
            Tok::Eq => RelOp::Eq,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn tuple(&mut self) -> Result<RawTuple, AlgebraError> {
        let name = if let Some(Tok::Ident(_)) = self.peek() {
            match self.next() {
                Some(Tok::Ident(s)) => Some(s),
                _ => unreachable!(),
            }
        } else {
            None
        };
        self.expect(Tok::LBrack)?;
        let mut args = Vec::new();
        if !self.eat(&Tok::RBrack) {
            loop {
                args.push(self.expr()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(Tok::RBrack)?;
                    break;
                }
            }
        }
        Ok(RawTuple { name, args })
    }

    /// Bind tuple positions: a lone unbound identifier names the dimension,
    /// anything else becomes an anonymous dimension plus a pending equality.
    fn bind_tuple(
        &self,
        raw: RawTuple,
        prefix: &str,
        scope: &mut HashMap<String, usize>,
        next_col: &mut usize,
        pending: &mut Vec<(usize, Ast)>,
    ) -> (Tuple, usize) {
        let mut dims = Vec::new();
        for (k, ast) in raw.args.into_iter().enumerate() {
            let col = *next_col;
            *next_col += 1;
            match ast.single_fresh_name() {
                Some(n) if !scope.contains_key(n) => {
                    scope.insert(n.to_string(), col);
                    dims.push(n.to_string());
                }
                _ => {
                    dims.push(format!("{}{}", prefix, k));
                    pending.push((col, ast));
                }
            }
        }
        let arity = dims.len();
        (
            Tuple {
                name: raw.name,
                dims,
            },
            arity,
        )
    }

    /// condition := ['exists' names ':'] chain ('and' chain)*
    /// Returns exists names and the comparison chains.
    #[allow(clippy::type_complexity)]
    fn condition(&mut self) -> Result<(Vec<String>, Vec<Vec<(Ast, RelOp)>>), AlgebraError> {
        let mut locals = Vec::new();
        if self.eat_keyword("exists") {
            loop {
                match self.next() {
                    Some(Tok::Ident(n)) => locals.push(n),
                    other => return Err(self.err(&format!("expected local name, found {:?}", other))),
                }
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(Tok::Colon)?;
        }
        let mut chains = Vec::new();
        loop {
            // a chain: expr (relop expr)+, kept as alternating list
            let first = self.expr()?;
            let mut chain = vec![(first, RelOp::Eq)];
            let mut any = false;
            while let Some(op) = self.relop() {
                any = true;
                let rhs = self.expr()?;
                if let Some(last) = chain.last_mut() {
                    last.1 = op;
                }
                chain.push((rhs, RelOp::Eq));
            }
            if !any {
                return Err(self.err("expected a comparison"));
            }
            chains.push(chain);
            if !self.eat_keyword("and") {
                break;
            }
        }
        Ok((locals, chains))
    }

    /// One union piece; `None` for the output tuple means a set piece.
    #[allow(clippy::type_complexity)]
    fn piece(&mut self, want_map: bool) -> Result<(Tuple, Option<Tuple>, usize, Vec<Constraint>), AlgebraError> {
        let mut scope: HashMap<String, usize> = HashMap::new();
        let mut next_col = 0usize;
        let mut pending: Vec<(usize, Ast)> = Vec::new();

        let raw_in = self.tuple()?;
        let (input, _) = self.bind_tuple(raw_in, "i", &mut scope, &mut next_col, &mut pending);

        let output = if self.eat(&Tok::Arrow) {
            if !want_map {
                return Err(self.err("found a relation piece where a set was expected"));
            }
            let raw_out = self.tuple()?;
            let (t, _) = self.bind_tuple(raw_out, "o", &mut scope, &mut next_col, &mut pending);
            Some(t)
        } else {
            if want_map {
                return Err(self.err("found a set piece where a relation was expected"));
            }
            None
        };

        let (locals, chains) = if self.eat(&Tok::Colon) {
            self.condition()?
        } else {
            (Vec::new(), Vec::new())
        };
        for l in &locals {
            if scope.contains_key(l) {
                return Err(self.err(&format!("local {:?} shadows a dimension", l)));
            }
            scope.insert(l.clone(), next_col);
            next_col += 1;
        }
        let n_cols = next_col;

        let mut constraints = Vec::new();
        for (col, ast) in &pending {
            let e = ast.lower(&scope, n_cols)?;
            constraints.push(Constraint::eq_zero(LinExpr::var(*col, n_cols) - e));
        }
        for chain in chains {
            for pair in chain.windows(2) {
                let (ref l, op) = pair[0];
                let (ref r, _) = pair[1];
                let l = l.lower(&scope, n_cols)?;
                let r = r.lower(&scope, n_cols)?;
                constraints.push(match op {
                    RelOp::Le => Constraint::ge_zero(r - l),
                    RelOp::Lt => {
                        let mut e = r - l;
                        e.constant -= 1;
                        Constraint::ge_zero(e)
                    }
                    RelOp::Ge => Constraint::ge_zero(l - r),
                    RelOp::Gt => {
                        let mut e = l - r;
                        e.constant -= 1;
                        Constraint::ge_zero(e)
                    }
                    RelOp::Eq => Constraint::eq_zero(l - r),
                });
            }
        }
        Ok((input, output, locals.len(), constraints))
    }

    fn pieces(&mut self, want_map: bool) -> Result<Vec<(Tuple, Option<Tuple>, usize, Vec<Constraint>)>, AlgebraError> {
        self.expect(Tok::LBrace)?;
        let mut out = Vec::new();
        if self.eat(&Tok::RBrace) {
            if self.peek().is_some() {
                return Err(self.err("trailing input after '}'"));
            }
            return Ok(out);
        }
        loop {
            out.push(self.piece(want_map)?);
            if self.eat(&Tok::Semi) {
                continue;
            }
            self.expect(Tok::RBrace)?;
            if self.peek().is_some() {
                return Err(self.err("trailing input after '}'"));
            }
            return Ok(out);
        }
    }
}

/// Parse a set in textual notation.
pub fn parse_set(text: &str) -> Result<Set, AlgebraError> {
    let mut p = Parser::new(text)?;
    let pieces = p.pieces(false)?;
    let mut out = Vec::new();
    for (tuple, _, n_local, constraints) in pieces {
        out.push(BasicSet::new(tuple, n_local, constraints));
    }
    Ok(Set::from_pieces(out))
}

/// Parse a relation in textual notation.
pub fn parse_map(text: &str) -> Result<Map, AlgebraError> {
    let mut p = Parser::new(text)?;
    let pieces = p.pieces(true)?;
    let mut out = Vec::new();
    for (input, output, n_local, constraints) in pieces {
        let output = output.expect("map piece has an output tuple");
        out.push(BasicMap::new(input, output, n_local, constraints));
    }
    Ok(Map::from_pieces(out))
}

impl Set {
    /// Parse from the textual notation.
    pub fn parse(text: &str) -> Result<Set, AlgebraError> {
        parse_set(text)
    }
}

impl Map {
    /// Parse from the textual notation.
    pub fn parse(text: &str) -> Result<Map, AlgebraError> {
        parse_map(text)
    }
}

impl FromStr for Set {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_set(s)
    }
}

impl FromStr for Map {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_map(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_range() {
        let s = Set::parse("{ S[i] : 0 <= i < 4 }").unwrap();
        let pts = s.labeled_points().unwrap();
        assert_eq!(pts.len(), 4);
        assert!(s.contains(Some("S"), &[3]).unwrap());
        assert!(!s.contains(Some("S"), &[4]).unwrap());
    }

    #[test]
    fn test_parse_union_pieces() {
        let s = Set::parse("{ S[i] : 0 <= i < 2; T[i, j] : 0 <= i < 2 and 0 <= j < 2 }").unwrap();
        assert_eq!(s.pieces.len(), 2);
        assert_eq!(s.statement_names().len(), 2);
        assert_eq!(s.labeled_points().unwrap().len(), 6);
    }

    #[test]
    fn test_parse_chained_comparison() {
        let s = Set::parse("{ [i, j] : 0 <= i <= j < 3 }").unwrap();
        // pairs with i <= j below 3
        assert_eq!(s.labeled_points().unwrap().len(), 6);
    }

    #[test]
    fn test_parse_map_with_offset() {
        let m = Map::parse("{ S[i] -> A[i - 1] : 1 <= i <= 3 }").unwrap();
        let pairs = m.labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("S".into()), vec![1], Some("A".into()), vec![0])));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_parse_anonymous_output() {
        let m = Map::parse("{ S[i] -> [0, i] : 0 <= i < 2 }").unwrap();
        let pairs = m.labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("S".into()), vec![1], None, vec![0, 1])));
    }

    #[test]
    fn test_parse_exists() {
        let s = Set::parse("{ [i] : exists q: i = 2*q and 0 <= i < 10 }").unwrap();
        let pts: Vec<Vec<i64>> = s
            .labeled_points()
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(pts, vec![vec![0], vec![2], vec![4], vec![6], vec![8]]);
    }

    #[test]
    fn test_parse_coefficient_juxtaposition() {
        let s = Set::parse("{ [i] : 0 <= 2i <= 6 }").unwrap();
        assert_eq!(s.labeled_points().unwrap().len(), 4);
    }

    #[test]
    fn test_parse_keyword_after_number_ends_term() {
        // `4 and` must not bind as the coefficient term `4*and`
        let s = Set::parse("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
        assert_eq!(s.labeled_points().unwrap().len(), 16);
    }

    #[test]
    fn test_display_reparses_with_locals() {
        let s = Set::parse("{ [i] : exists q: i = 2*q and 0 <= i < 7 }").unwrap();
        let again = Set::parse(&s.to_string()).unwrap();
        assert!(s.is_equal(&again).unwrap());
    }

    #[test]
    fn test_parse_unknown_dimension() {
        assert!(matches!(
            Set::parse("{ S[i] : 0 <= k < 4 }"),
            Err(AlgebraError::UnknownDimension(_))
        ));
    }

    #[test]
    fn test_parse_empty_braces() {
        let s = Set::parse("{ }").unwrap();
        assert!(s.pieces.is_empty());
        assert!(s.is_empty().unwrap());
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(matches!(
            Set::parse("{ S[i] : 0 <= i < }"),
            Err(AlgebraError::Parse { .. })
        ));
        assert!(matches!(
            Set::parse("S[i]"),
            Err(AlgebraError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_set_rejects_relation() {
        assert!(matches!(
            Set::parse("{ S[i] -> [i] }"),
            Err(AlgebraError::Parse { .. })
        ));
    }

    #[test]
    fn test_display_reparses() {
        let s = Set::parse("{ S[i, j] : 0 <= i < 3 and 0 <= j <= i }").unwrap();
        let again = Set::parse(&s.to_string()).unwrap();
        assert!(s.is_equal(&again).unwrap());
    }
}
