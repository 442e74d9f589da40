use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use anyhow::{Result, bail, ensure};
use log::{debug, info};
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;

use crate::equation::{Equation, EquationStore};
use crate::game::{GameConfig, GameStatus, Point, RevealResult, Square, neighbors};
use crate::variable::Variable;

/// The turn protocol between the game host and a strategy.
///
/// One `next_move` call produces a move, one `update` notification records
/// its result; nothing overlaps. On a terminal status the host stops asking
/// for moves.
pub trait Agent {
    /// Discards all prior-game state before a new game.
    fn reset(&mut self, config: &GameConfig);

    /// The coordinate to reveal next. `Ok(None)` means no legal candidate
    /// exists (possible near game end), which the host treats as "no legal
    /// move" rather than a crash. `Err` is a fatal internal inconsistency.
    fn next_move(&mut self) -> Result<Option<Point>>;

    /// Notification of the cells revealed by the previous move. On any
    /// terminal status the agent performs no further deduction.
    fn update(&mut self, result: &RevealResult) -> Result<()>;

    /// Read-only snapshot of the coordinates deduced to be mines.
    fn flags(&self) -> &HashSet<Point>;
}

/// Plays by exact logical deduction over count constraints, guessing by a
/// risk score only when no certainty is derivable.
///
/// Each revealed clue becomes an [`Equation`] over its unrevealed neighbors.
/// Equations are simplified by subset elimination; any equation that resolves
/// to all-safe or all-mines feeds the pending queues consumed by the move
/// selector.
pub struct CspAgent {
    width: usize,
    height: usize,
    start: Point,
    first_move: bool,
    variables: HashMap<Point, Variable>,
    equations: EquationStore,
    exposed_squares: HashSet<Point>,
    flags: HashSet<Point>,
    pending_safe: VecDeque<Point>,
    pending_mines: VecDeque<Point>,
}

impl CspAgent {
    pub fn new(config: &GameConfig, start: Point) -> Self {
        let mut agent = CspAgent {
            width: 0,
            height: 0,
            start,
            first_move: true,
            variables: HashMap::new(),
            equations: EquationStore::new(),
            exposed_squares: HashSet::new(),
            flags: HashSet::new(),
            pending_safe: VecDeque::new(),
            pending_mines: VecDeque::new(),
        };
        agent.reset(config);
        agent
    }

    /// Records one revealed clue and builds its equation.
    ///
    /// Revealed neighbors cannot be mines and are ignored; flagged neighbors
    /// are already accounted for, so each one decrements the new equation's
    /// mine count; the rest become the equation's variables.
    fn record_clue(&mut self, square: &Square) -> Result<()> {
        let pos = square.pos;
        if self.flags.contains(&pos) {
            bail!(
                "revealed cell ({}, {}) was already flagged as a mine",
                pos.x,
                pos.y
            );
        }
        self.exposed_squares.insert(pos);
        self.pending_safe.retain(|p| *p != pos);

        let mut variables = BTreeSet::new();
        let mut mine_count = square.num_mines;
        for neighbor in neighbors(self.width, self.height, pos) {
            if self.exposed_squares.contains(&neighbor) {
                continue;
            }
            if self.flags.contains(&neighbor) {
                mine_count = match mine_count.checked_sub(1) {
                    Some(count) => count,
                    None => bail!(
                        "clue at ({}, {}) is lower than its adjacent flag count",
                        pos.x,
                        pos.y
                    ),
                };
                continue;
            }
            variables.insert(neighbor);
        }
        ensure!(
            mine_count as usize <= variables.len(),
            "clue at ({}, {}) claims {} mines among {} unknown neighbors",
            pos.x,
            pos.y,
            mine_count,
            variables.len()
        );

        let variable = self
            .variables
            .get_mut(&pos)
            .unwrap_or_else(|| panic!("no variable for ({}, {})", pos.x, pos.y));
        variable.value = Some(square.num_mines);
        variable.constraint_value = mine_count;
        variable.constraint_neighbors = variables.iter().copied().collect();

        self.equations.insert(Equation::new(variables, mine_count));
        Ok(())
    }

    /// Harvests resolved equations into the pending queues until a full pass
    /// yields nothing, capped at the equation count to stay bounded even on
    /// inconsistent input.
    ///
    /// Each round drains newly deduced mines into `flags` before
    /// re-propagating, since equation maintenance depends on up-to-date flag
    /// membership.
    fn harvest_certainties(&mut self) -> Result<()> {
        let cap = self.equations.len().max(1);
        for _ in 0..cap {
            let (safe, mines) = self.equations.extract_certain();
            if safe.is_empty() && mines.is_empty() {
                break;
            }
            for point in safe {
                self.enqueue_safe(point)?;
            }
            for point in mines {
                self.enqueue_mine(point)?;
            }
            self.drain_flags();
            self.equations
                .propagate_known(&self.exposed_squares, &self.flags)?;
            self.equations.dedup();
        }
        Ok(())
    }

    fn enqueue_safe(&mut self, point: Point) -> Result<()> {
        if self.exposed_squares.contains(&point) || self.pending_safe.contains(&point) {
            return Ok(());
        }
        ensure!(
            !self.flags.contains(&point) && !self.pending_mines.contains(&point),
            "({}, {}) deduced safe but already classified as a mine",
            point.x,
            point.y
        );
        debug!("deduced safe: ({}, {})", point.x, point.y);
        self.pending_safe.push_back(point);
        Ok(())
    }

    fn enqueue_mine(&mut self, point: Point) -> Result<()> {
        if self.flags.contains(&point) || self.pending_mines.contains(&point) {
            return Ok(());
        }
        ensure!(
            !self.exposed_squares.contains(&point) && !self.pending_safe.contains(&point),
            "({}, {}) deduced a mine but already classified safe",
            point.x,
            point.y
        );
        debug!("deduced mine: ({}, {})", point.x, point.y);
        self.pending_mines.push_back(point);
        Ok(())
    }

    /// Moves every pending mine into the flag set. Idempotent; must run
    /// before the next deduction pass so flag membership is current.
    fn drain_flags(&mut self) {
        while let Some(point) = self.pending_mines.pop_front() {
            self.flags.insert(point);
        }
    }

    /// Risk-scored guess when no certainty is available.
    ///
    /// Every revealed cell contributes `clue - flagged_neighbors` risk to
    /// each of its unrevealed unflagged neighbors; cells bordering several
    /// clues accumulate several contributions. The minimum accumulated score
    /// wins, ties breaking to the smallest coordinate in `(x, y)` order.
    /// Cells adjacent to no revealed clue are only considered when nothing
    /// else is left, in row-major order.
    fn guess_with_heuristic(&self) -> Option<Point> {
        let mut scores: BTreeMap<Point, i32> = BTreeMap::new();
        for cell in &self.exposed_squares {
            let Some(value) = self.variables[cell].value else {
                continue;
            };
            let mut flagged_neighbors = 0i32;
            let mut hidden_neighbors = Vec::new();
            for neighbor in neighbors(self.width, self.height, *cell) {
                if self.flags.contains(&neighbor) {
                    flagged_neighbors += 1;
                } else if !self.exposed_squares.contains(&neighbor) {
                    hidden_neighbors.push(neighbor);
                }
            }
            let risk = value as i32 - flagged_neighbors;
            for neighbor in hidden_neighbors {
                *scores.entry(neighbor).or_insert(0) += risk;
            }
        }

        // BTreeMap iterates in ascending coordinate order, so keeping the
        // first strictly-smaller score makes the tie-break deterministic.
        let mut best: Option<(Point, i32)> = None;
        for (&point, &score) in &scores {
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((point, score)),
            }
        }
        if let Some((point, score)) = best {
            debug!("guessing ({}, {}) with risk {}", point.x, point.y, score);
            return Some(point);
        }

        // No cell borders a clue yet: take the first untouched cell.
        for y in 0..self.height {
            for x in 0..self.width {
                let point = Point { x, y };
                if !self.exposed_squares.contains(&point) && !self.flags.contains(&point) {
                    return Some(point);
                }
            }
        }
        None
    }
}

impl Agent for CspAgent {
    fn reset(&mut self, config: &GameConfig) {
        self.width = config.width;
        self.height = config.height;
        self.first_move = true;
        self.variables.clear();
        for y in 0..config.height {
            for x in 0..config.width {
                let pos = Point { x, y };
                self.variables.insert(pos, Variable::new(pos));
            }
        }
        self.equations.clear();
        self.exposed_squares.clear();
        self.flags.clear();
        self.pending_safe.clear();
        self.pending_mines.clear();
    }

    fn next_move(&mut self) -> Result<Option<Point>> {
        if self.first_move {
            self.first_move = false;
            return Ok(Some(self.start));
        }

        // A cell already proven safe needs no further computation this turn.
        if let Some(point) = self.pending_safe.pop_front() {
            return Ok(Some(point));
        }

        // One reduction pass; repeated turns re-invoke it as clues arrive,
        // so convergence is incremental across the game. Harvesting drains
        // any newly deduced mines into the flag set before re-propagating.
        self.equations.reduce()?;
        self.harvest_certainties()?;

        if let Some(point) = self.pending_safe.pop_front() {
            return Ok(Some(point));
        }
        Ok(self.guess_with_heuristic())
    }

    fn update(&mut self, result: &RevealResult) -> Result<()> {
        match result.status {
            GameStatus::Victory => {
                info!("the agent won");
                return Ok(());
            }
            GameStatus::Defeat => {
                info!("the agent hit a mine");
                return Ok(());
            }
            GameStatus::Abandoned => {
                info!("the agent gave up");
                return Ok(());
            }
            GameStatus::Playing => {}
        }

        for square in &result.new_squares {
            self.record_clue(square)?;
        }
        self.equations
            .propagate_known(&self.exposed_squares, &self.flags)?;
        self.equations.dedup();
        self.harvest_certainties()?;

        debug_assert!(self.exposed_squares.is_disjoint(&self.flags));
        Ok(())
    }

    fn flags(&self) -> &HashSet<Point> {
        &self.flags
    }
}

/// Baseline strategy: uniform choice among unrevealed cells. Never flags.
pub struct RandomAgent {
    width: usize,
    height: usize,
    exposed_squares: HashSet<Point>,
    flags: HashSet<Point>,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(config: &GameConfig, rng: StdRng) -> Self {
        let mut agent = RandomAgent {
            width: 0,
            height: 0,
            exposed_squares: HashSet::new(),
            flags: HashSet::new(),
            rng,
        };
        agent.reset(config);
        agent
    }
}

impl Agent for RandomAgent {
    fn reset(&mut self, config: &GameConfig) {
        self.width = config.width;
        self.height = config.height;
        self.exposed_squares.clear();
        self.flags.clear();
    }

    fn next_move(&mut self) -> Result<Option<Point>> {
        let hidden: Vec<Point> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Point { x, y }))
            .filter(|p| !self.exposed_squares.contains(p))
            .collect();
        Ok(hidden.choose(&mut self.rng).copied())
    }

    fn update(&mut self, result: &RevealResult) -> Result<()> {
        for square in &result.new_squares {
            self.exposed_squares.insert(square.pos);
        }
        Ok(())
    }

    fn flags(&self) -> &HashSet<Point> {
        &self.flags
    }
}

/// Which strategy the harness should run, parsed from its CLI name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Random,
    Csp,
}

impl AgentKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "random" => Some(AgentKind::Random),
            "csp" => Some(AgentKind::Csp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Random => "random",
            AgentKind::Csp => "csp",
        }
    }

    pub fn build(self, config: &GameConfig, start: Point, rng: StdRng) -> Box<dyn Agent> {
        match self {
            AgentKind::Random => Box::new(RandomAgent::new(config, rng)),
            AgentKind::Csp => Box::new(CspAgent::new(config, start)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: usize, height: usize, num_mines: usize) -> GameConfig {
        GameConfig {
            width,
            height,
            num_mines,
            auto_expand_clear_areas: false,
        }
    }

    fn playing(squares: Vec<Square>) -> RevealResult {
        RevealResult {
            status: GameStatus::Playing,
            new_squares: squares,
        }
    }

    fn square(x: usize, y: usize, num_mines: u8) -> Square {
        Square {
            pos: Point { x, y },
            num_mines,
        }
    }

    #[test]
    fn test_first_move_is_the_start_position() {
        let cfg = config(8, 8, 10);
        let start = Point { x: 2, y: 2 };
        let mut agent = CspAgent::new(&cfg, start);
        assert_eq!(agent.next_move().unwrap(), Some(start));

        // And again after a reset.
        agent.reset(&cfg);
        assert_eq!(agent.next_move().unwrap(), Some(start));
    }

    #[test]
    fn test_zero_clue_marks_all_neighbors_safe() {
        let cfg = config(3, 3, 0);
        let mut agent = CspAgent::new(&cfg, Point { x: 1, y: 1 });
        agent.next_move().unwrap();
        agent.update(&playing(vec![square(1, 1, 0)])).unwrap();

        assert_eq!(agent.pending_safe.len(), 8);
        assert!(agent.pending_mines.is_empty());
        // The safe queue is consumed FIFO with no further deduction.
        let first = agent.pending_safe[0];
        assert_eq!(agent.next_move().unwrap(), Some(first));
    }

    #[test]
    fn test_saturated_clue_flags_all_neighbors() {
        // Corner of a 2x2 board: 3 neighbors, clue 3 means all of them are
        // mines. They pass through pending_mines into the flag set.
        let cfg = config(2, 2, 3);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        agent.next_move().unwrap();
        agent.update(&playing(vec![square(0, 0, 3)])).unwrap();

        let expected: HashSet<Point> = [
            Point { x: 1, y: 0 },
            Point { x: 0, y: 1 },
            Point { x: 1, y: 1 },
        ]
        .into_iter()
        .collect();
        assert_eq!(*agent.flags(), expected);
        assert!(agent.pending_mines.is_empty());
        // A coordinate never sits in both the exposed and flag sets.
        assert!(agent.exposed_squares.is_disjoint(&agent.flags));
    }

    #[test]
    fn test_subset_elimination_finds_safe_cell() {
        // A = ({p1, p2, p3}, 1) and B = ({p1, p2}, 1) coexist; the reducer
        // derives ({p3}, 0), so p3 comes back as the next certain-safe move.
        let cfg = config(4, 4, 2);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        agent.first_move = false;

        let p1 = Point { x: 1, y: 0 };
        let p2 = Point { x: 1, y: 1 };
        let p3 = Point { x: 1, y: 2 };
        agent
            .equations
            .insert(Equation::new([p1, p2, p3].into_iter().collect(), 1));
        agent
            .equations
            .insert(Equation::new([p1, p2].into_iter().collect(), 1));

        assert_eq!(agent.next_move().unwrap(), Some(p3));
    }

    #[test]
    fn test_flagged_reveal_is_fatal() {
        let cfg = config(3, 3, 1);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        agent.flags.insert(Point { x: 2, y: 2 });
        assert!(agent.update(&playing(vec![square(2, 2, 1)])).is_err());
    }

    #[test]
    fn test_conflicting_certainties_are_fatal() {
        // (0,0) with clue 0 proves (1,0) safe; a later clue claiming (1,0)
        // must be a mine contradicts that and surfaces immediately.
        let cfg = config(3, 1, 1);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        agent.next_move().unwrap();
        agent.update(&playing(vec![square(0, 0, 0)])).unwrap();
        assert!(agent.pending_safe.contains(&Point { x: 1, y: 0 }));

        assert!(agent.update(&playing(vec![square(2, 0, 1)])).is_err());
    }

    #[test]
    fn test_heuristic_guess_is_deterministic() {
        // A lone clue of 1 gives all three hidden neighbors equal risk; the
        // tie breaks to the smallest coordinate, and repeats agree.
        let run = || {
            let cfg = config(4, 4, 2);
            let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
            agent.next_move().unwrap();
            agent.update(&playing(vec![square(0, 0, 1)])).unwrap();
            agent.next_move().unwrap()
        };
        let first = run().unwrap();
        assert_eq!(first, Point { x: 0, y: 1 });
        for _ in 0..5 {
            assert_eq!(run().unwrap(), first);
        }
    }

    #[test]
    fn test_guess_pool_exhausted_signals_no_move() {
        // Every cell revealed or flagged: there is nothing left to guess.
        let cfg = config(2, 1, 1);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        agent.first_move = false;
        agent.exposed_squares.insert(Point { x: 0, y: 0 });
        agent.flags.insert(Point { x: 1, y: 0 });
        assert_eq!(agent.next_move().unwrap(), None);
    }

    #[test]
    fn test_terminal_update_is_inert() {
        let cfg = config(3, 3, 1);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        let result = RevealResult {
            status: GameStatus::Victory,
            new_squares: vec![square(0, 0, 1)],
        };
        agent.update(&result).unwrap();
        // Terminal notifications are recorded, not deduced over.
        assert!(agent.exposed_squares.is_empty());
        assert!(agent.equations.is_empty());
    }

    #[test]
    fn test_reset_discards_prior_game() {
        let cfg = config(3, 3, 1);
        let mut agent = CspAgent::new(&cfg, Point { x: 1, y: 1 });
        agent.next_move().unwrap();
        agent.update(&playing(vec![square(1, 1, 0)])).unwrap();
        assert!(!agent.pending_safe.is_empty());

        agent.reset(&cfg);
        assert!(agent.pending_safe.is_empty());
        assert!(agent.exposed_squares.is_empty());
        assert!(agent.flags().is_empty());
        assert!(agent.equations.is_empty());
        assert_eq!(agent.variables.len(), 9);
    }

    #[test]
    fn test_agent_kind_dispatch() {
        assert_eq!(AgentKind::parse("csp"), Some(AgentKind::Csp));
        assert_eq!(AgentKind::parse("random"), Some(AgentKind::Random));
        assert_eq!(AgentKind::parse("bfs"), None);
        assert_eq!(AgentKind::Csp.name(), "csp");
    }
}
