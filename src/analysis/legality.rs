//! Schedule legality validation against dependence relations.

use crate::analysis::dependence::time_relation;
use crate::algebra::Map;
use crate::error::PolyschedError;
use crate::model::DependenceRelation;
use crate::schedule::Schedule;
use log::debug;
use serde::{Deserialize, Serialize};

/// Verdict of a legality check. `Undetermined` means the schedule said
/// nothing about the dependence (its statements are not covered), which is
/// deliberately kept apart from both booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Legality {
    /// Every dependence pair runs source before target
    Legal,
    /// Some dependence pair runs target first, or at the same time under
    /// the strict zero-delta policy
    Illegal,
    /// The schedule does not order the dependence at all
    Undetermined,
}

/// Tunable policy for the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalityOptions {
    /// Verdict for a dependence mapped to identical time vectors. The
    /// conservative default treats same-time pairs as an ordering violation,
    /// since nothing sequences them.
    pub zero_delta_is_legal: bool,
}

impl Default for LegalityOptions {
    fn default() -> Self {
        Self {
            zero_delta_is_legal: false,
        }
    }
}

/// Validates candidate schedules against dependences.
#[derive(Debug, Clone, Default)]
pub struct LegalityChecker {
    options: LegalityOptions,
}

impl LegalityChecker {
    /// A checker with the default (strict) policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// A checker with an explicit policy.
    pub fn with_options(options: LegalityOptions) -> Self {
        Self { options }
    }

    /// Check one dependence against a flat schedule map.
    ///
    /// The dependence is chased into schedule time on both ends; the
    /// lexicographic minimum of target-time minus source-time decides:
    /// a leading negative entry is illegal, a leading positive entry legal,
    /// the zero vector falls to [`LegalityOptions::zero_delta_is_legal`].
    pub fn validate(
        &self,
        schedule: &Map,
        dep: &DependenceRelation,
    ) -> Result<Legality, PolyschedError> {
        let times = time_relation(schedule, dep);
        if times.is_empty().map_err(PolyschedError::from)? {
            debug!("legality: schedule does not cover {}", dep);
            return Ok(Legality::Undetermined);
        }
        let deltas = times.deltas().map_err(PolyschedError::from)?;
        let min = deltas.lexmin().map_err(PolyschedError::from)?;
        let Some(v) = min else {
            return Ok(Legality::Undetermined);
        };
        debug!("legality: minimal time delta {:?} for {}", v, dep);
        match v.iter().find(|&&x| x != 0) {
            Some(x) if *x < 0 => Ok(Legality::Illegal),
            Some(_) => Ok(Legality::Legal),
            None if self.options.zero_delta_is_legal => Ok(Legality::Legal),
            None => Ok(Legality::Illegal),
        }
    }

    /// Check one dependence against a schedule tree, through its flattened
    /// schedule map.
    pub fn validate_tree(
        &self,
        schedule: &Schedule,
        dep: &DependenceRelation,
    ) -> Result<Legality, PolyschedError> {
        let flat = schedule.schedule_map()?;
        self.validate(&flat, dep)
    }

    /// A union of dependences is legal only when every member is. Any
    /// illegal member decides; otherwise any undetermined member does.
    pub fn validate_all(
        &self,
        schedule: &Map,
        deps: &[DependenceRelation],
    ) -> Result<Legality, PolyschedError> {
        let mut verdict = Legality::Legal;
        for dep in deps {
            match self.validate(schedule, dep)? {
                Legality::Illegal => return Ok(Legality::Illegal),
                Legality::Undetermined => verdict = Legality::Undetermined,
                Legality::Legal => {}
            }
        }
        Ok(verdict)
    }
}
