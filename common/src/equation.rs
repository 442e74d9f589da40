use std::collections::{BTreeSet, HashSet};

use anyhow::{Result, bail, ensure};
use itertools::Itertools;
use log::debug;

use crate::game::Point;

/// A single count constraint over unrevealed cells: exactly `mine_count` of
/// `variables` are mines.
///
/// An ordered set keeps subset tests cheap and iteration deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Equation {
    pub variables: BTreeSet<Point>,
    pub mine_count: u8,
}

impl Equation {
    pub fn new(variables: BTreeSet<Point>, mine_count: u8) -> Self {
        Equation {
            variables,
            mine_count,
        }
    }

    /// Soundness invariant: `0 <= mine_count <= |variables|`.
    pub fn is_sound(&self) -> bool {
        self.mine_count as usize <= self.variables.len()
    }

    /// Every variable is provably mine-free.
    pub fn all_safe(&self) -> bool {
        !self.variables.is_empty() && self.mine_count == 0
    }

    /// Every variable is provably a mine.
    pub fn all_mines(&self) -> bool {
        !self.variables.is_empty() && self.mine_count as usize == self.variables.len()
    }
}

/// The set of active constraints, in insertion order.
#[derive(Debug, Default)]
pub struct EquationStore {
    equations: Vec<Equation>,
}

impl EquationStore {
    pub fn new() -> Self {
        EquationStore::default()
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Equation> {
        self.equations.iter()
    }

    pub fn clear(&mut self) {
        self.equations.clear();
    }

    /// Appends a freshly built equation. The builder is responsible for
    /// never inserting an unsound one.
    pub fn insert(&mut self, equation: Equation) {
        debug_assert!(equation.is_sound());
        self.equations.push(equation);
    }

    /// Removes variables that have since become revealed or flagged from
    /// every equation, decrementing the mine count for each flagged removal.
    ///
    /// Keeps all live equations referring only to still-unknown cells. A
    /// count that would go negative means a clue contradicted an earlier
    /// deduction, which is fatal.
    pub fn propagate_known(&mut self, exposed: &HashSet<Point>, flags: &HashSet<Point>) -> Result<()> {
        for equation in &mut self.equations {
            let known: Vec<Point> = equation
                .variables
                .iter()
                .copied()
                .filter(|p| exposed.contains(p) || flags.contains(p))
                .collect();
            for point in known {
                equation.variables.remove(&point);
                if flags.contains(&point) {
                    equation.mine_count = match equation.mine_count.checked_sub(1) {
                        Some(count) => count,
                        None => bail!(
                            "mine count went negative removing flagged ({}, {})",
                            point.x,
                            point.y
                        ),
                    };
                }
            }
            ensure!(
                equation.is_sound(),
                "equation over {} cells claims {} mines",
                equation.variables.len(),
                equation.mine_count
            );
        }
        Ok(())
    }

    /// Collapses equations with identical variable sets and mine counts.
    /// Repeated neighbor overlaps near the board edge make these common.
    pub fn dedup(&mut self) {
        let equations = std::mem::take(&mut self.equations);
        self.equations = equations.into_iter().unique().collect();
    }

    /// One certainty-extraction pass: harvests every equation that has
    /// resolved to all-safe (`k == 0`) or all-mines (`k == |vars|`) and
    /// discards it, along with any equation whose variable set is empty.
    ///
    /// Returns the harvested coordinates. Callers re-run this until a pass
    /// yields nothing, since flag propagation between passes can resolve
    /// further equations.
    pub fn extract_certain(&mut self) -> (Vec<Point>, Vec<Point>) {
        let mut safe = Vec::new();
        let mut mines = Vec::new();

        // Two-phase: classify in a read-only pass, then drop in one retain.
        for equation in &self.equations {
            if equation.all_safe() {
                safe.extend(equation.variables.iter().copied());
            } else if equation.all_mines() {
                mines.extend(equation.variables.iter().copied());
            }
        }
        self.equations
            .retain(|eq| !eq.variables.is_empty() && !eq.all_safe() && !eq.all_mines());

        (safe, mines)
    }

    /// Subset elimination, the core deduction step.
    ///
    /// If `varsA` is a subset of `varsB`, the cells in `varsB \ varsA`
    /// account for exactly `kB - kA` mines, so `B` is replaced by
    /// `(varsB \ varsA, kB - kA)` in place. Equations are sorted ascending
    /// by variable-set size first so the most specific constraints act as
    /// subtrahends early, which speeds convergence.
    ///
    /// This runs a single pairwise pass per invocation. Later turns re-invoke
    /// it as new clues arrive, so convergence is incremental across the game
    /// rather than exhaustive within one turn.
    pub fn reduce(&mut self) -> Result<()> {
        self.equations.sort_by_key(|eq| eq.variables.len());

        for i in 0..self.equations.len() {
            for j in (i + 1)..self.equations.len() {
                // Degenerate equations are certainty extraction's job.
                let skip = |eq: &Equation| eq.variables.is_empty() || eq.mine_count == 0;
                if skip(&self.equations[i]) || skip(&self.equations[j]) {
                    continue;
                }

                let (a, b) = if self.equations[i]
                    .variables
                    .is_subset(&self.equations[j].variables)
                {
                    (i, j)
                } else if self.equations[j]
                    .variables
                    .is_subset(&self.equations[i].variables)
                {
                    (j, i)
                } else {
                    continue;
                };

                let subtrahend = self.equations[a].clone();
                let superset = &mut self.equations[b];
                superset.mine_count = match superset.mine_count.checked_sub(subtrahend.mine_count) {
                    Some(count) => count,
                    None => bail!(
                        "subset elimination produced a negative mine count ({} - {})",
                        superset.mine_count,
                        subtrahend.mine_count
                    ),
                };
                let remainder = &superset.variables - &subtrahend.variables;
                superset.variables = remainder;
                debug!(
                    "reduced to {} cells / {} mines",
                    superset.variables.len(),
                    superset.mine_count
                );
            }
        }

        Ok(())
    }
}
