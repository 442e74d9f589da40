use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use log::info;
use rand::Rng;
use rand::seq::index::sample;

use crate::agent::Agent;

/// Represents a 2D coordinate on the minesweeper board.
///
/// `Ord` is derived (x first, then y) so coordinates can key ordered sets,
/// giving the solver deterministic iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// Board dimensions and mine count for one game.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    pub num_mines: usize,
    /// When a revealed cell has no adjacent mines, also reveal the whole
    /// connected zero region in the same turn.
    pub auto_expand_clear_areas: bool,
}

/// Tracks the current status of the game as reported to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameStatus {
    Playing,
    Victory,
    Defeat,
    /// The agent reported that it had no legal move left.
    Abandoned,
}

/// One newly revealed cell together with its clue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Square {
    pub pos: Point,
    /// Number of mines adjacent to `pos`.
    pub num_mines: u8,
}

/// The per-turn notification sent to the agent after a reveal.
///
/// Contains a single square per turn unless `auto_expand_clear_areas` is on,
/// in which case a zero clue floods out a whole region.
#[derive(Debug, Clone)]
pub struct RevealResult {
    pub status: GameStatus,
    pub new_squares: Vec<Square>,
}

/// Outcome of one completed game, the input to the statistics sink.
#[derive(Debug, Clone, Copy)]
pub struct GameResult {
    pub status: GameStatus,
    pub num_moves: u32,
}

impl GameResult {
    pub fn victory(&self) -> bool {
        self.status == GameStatus::Victory
    }
}

/// The game engine: mine placement and the reveal protocol.
///
/// The agent never sees this struct directly; it only receives
/// [`RevealResult`] notifications, so the solver cannot cheat.
pub struct Game {
    pub config: GameConfig,
    mines: HashSet<Point>,
    revealed: HashSet<Point>,
    pub status: GameStatus,
}

impl Game {
    /// Creates a game with `num_mines` mines placed uniformly at random.
    pub fn new(config: GameConfig, rng: &mut impl Rng) -> Self {
        let cells = config.width * config.height;
        if config.num_mines >= cells {
            panic!("Total mines must be less than the number of cells on the board.");
        }
        let mines = sample(rng, cells, config.num_mines)
            .into_iter()
            .map(|i| Point {
                x: i % config.width,
                y: i / config.width,
            })
            .collect();
        Self::with_mines(config, mines)
    }

    /// Creates a game with a scripted mine layout. Used by tests and any
    /// harness that wants reproducible boards.
    pub fn with_mines(config: GameConfig, mines: HashSet<Point>) -> Self {
        assert!(mines.len() < config.width * config.height);
        Game {
            config,
            mines,
            revealed: HashSet::new(),
            status: GameStatus::Playing,
        }
    }

    /// The clue for a revealed cell: `Some(count)` once revealed, `None`
    /// while hidden. Only used for rendering; the agent gets its clues
    /// through [`RevealResult`].
    pub fn cell(&self, at: Point) -> Option<u8> {
        if self.revealed.contains(&at) {
            Some(self.adjacent_mines(at))
        } else {
            None
        }
    }

    fn adjacent_mines(&self, at: Point) -> u8 {
        neighbors(self.config.width, self.config.height, at)
            .filter(|n| self.mines.contains(n))
            .count() as u8
    }

    /// Reveals a cell and reports the outcome of the turn.
    ///
    /// Revealing a mine ends the game with [`GameStatus::Defeat`]. Revealing
    /// an already revealed cell (or playing after the game ended) is a no-op
    /// notification with no new squares.
    pub fn reveal(&mut self, at: Point) -> RevealResult {
        if self.status != GameStatus::Playing || self.revealed.contains(&at) {
            return RevealResult {
                status: self.status,
                new_squares: Vec::new(),
            };
        }

        if self.mines.contains(&at) {
            self.status = GameStatus::Defeat;
            return RevealResult {
                status: self.status,
                new_squares: Vec::new(),
            };
        }

        let new_squares = if self.config.auto_expand_clear_areas {
            self.flood_fill_reveal(at)
        } else {
            self.revealed.insert(at);
            vec![Square {
                pos: at,
                num_mines: self.adjacent_mines(at),
            }]
        };

        // Victory once every non-mine cell is revealed.
        let safe_cells = self.config.width * self.config.height - self.mines.len();
        if self.revealed.len() == safe_cells {
            self.status = GameStatus::Victory;
        }

        RevealResult {
            status: self.status,
            new_squares,
        }
    }

    /// Reveals `start` and, while clues are zero, cascades into neighbors.
    fn flood_fill_reveal(&mut self, start: Point) -> Vec<Square> {
        let mut new_squares = Vec::new();
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(point) = queue.pop_front() {
            if self.revealed.contains(&point) {
                continue;
            }
            let num_mines = self.adjacent_mines(point);
            self.revealed.insert(point);
            new_squares.push(Square {
                pos: point,
                num_mines,
            });

            if num_mines == 0 {
                for neighbor in neighbors(self.config.width, self.config.height, point) {
                    if !visited.contains(&neighbor) && !self.mines.contains(&neighbor) {
                        queue.push_back(neighbor);
                        visited.insert(neighbor);
                    }
                }
            }
        }

        new_squares
    }
}

/// All valid 8-connected neighbor coordinates of `at`, handling board edges
/// and corners.
pub fn neighbors(width: usize, height: usize, at: Point) -> impl Iterator<Item = Point> {
    (-1..=1).flat_map(move |dy: isize| {
        (-1..=1).filter_map(move |dx: isize| {
            if dx == 0 && dy == 0 {
                return None;
            }
            let nx = at.x as isize + dx;
            let ny = at.y as isize + dy;
            if nx >= 0 && nx < width as isize && ny >= 0 && ny < height as isize {
                Some(Point {
                    x: nx as usize,
                    y: ny as usize,
                })
            } else {
                None
            }
        })
    })
}

/// Drives `num_games` full games of the turn protocol against `agent`.
///
/// Each game gets a fresh board and a freshly reset agent. A game where the
/// agent runs out of legal moves is recorded as [`GameStatus::Abandoned`].
/// Agent errors are fatal: they indicate an internal inconsistency, and
/// continuing would propagate incorrect deductions.
pub fn run_games(
    config: GameConfig,
    num_games: u32,
    agent: &mut dyn Agent,
    rng: &mut impl Rng,
) -> Result<Vec<GameResult>> {
    let mut results = Vec::with_capacity(num_games as usize);

    for _ in 0..num_games {
        agent.reset(&config);
        let mut game = Game::new(config, rng);
        let mut num_moves = 0u32;

        let status = loop {
            let Some(point) = agent.next_move()? else {
                let result = RevealResult {
                    status: GameStatus::Abandoned,
                    new_squares: Vec::new(),
                };
                agent.update(&result)?;
                break GameStatus::Abandoned;
            };
            num_moves += 1;
            let result = game.reveal(point);
            agent.update(&result)?;
            if result.status != GameStatus::Playing {
                break result.status;
            }
        };

        info!("game over: {:?} after {} moves", status, num_moves);
        results.push(GameResult { status, num_moves });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CspAgent;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(width: usize, height: usize, num_mines: usize) -> GameConfig {
        GameConfig {
            width,
            height,
            num_mines,
            auto_expand_clear_areas: false,
        }
    }

    #[test]
    fn test_game_initialization() {
        let mut rng = StdRng::seed_from_u64(7);
        let game = Game::new(config(5, 5, 3), &mut rng);
        assert_eq!(game.config.width, 5);
        assert_eq!(game.config.height, 5);
        assert_eq!(game.mines.len(), 3);
        assert_eq!(game.status, GameStatus::Playing);

        // Every cell starts hidden.
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(game.cell(Point { x, y }), None);
            }
        }
    }

    #[test]
    #[should_panic(expected = "Total mines must be less than the number of cells on the board.")]
    fn test_game_initialization_too_many_mines() {
        let mut rng = StdRng::seed_from_u64(7);
        Game::new(config(3, 3, 9), &mut rng);
    }

    #[test]
    fn test_get_neighbors() {
        // Corner cell (0,0) should have 3 neighbors.
        assert_eq!(neighbors(3, 3, Point { x: 0, y: 0 }).count(), 3);
        // Center cell (1,1) should have 8 neighbors.
        assert_eq!(neighbors(3, 3, Point { x: 1, y: 1 }).count(), 8);
        // Edge cell (1,0) should have 5 neighbors.
        assert_eq!(neighbors(3, 3, Point { x: 1, y: 0 }).count(), 5);
    }

    #[test]
    fn test_reveal_mine_is_defeat() {
        let mines = HashSet::from([Point { x: 1, y: 1 }]);
        let mut game = Game::with_mines(config(3, 3, 1), mines);
        let result = game.reveal(Point { x: 1, y: 1 });
        assert_eq!(result.status, GameStatus::Defeat);
        assert!(result.new_squares.is_empty());
    }

    #[test]
    fn test_reveal_all_safe_is_victory() {
        let mines = HashSet::from([Point { x: 2, y: 2 }]);
        let mut game = Game::with_mines(config(3, 3, 1), mines);
        let mut last = GameStatus::Playing;
        for y in 0..3 {
            for x in 0..3 {
                let at = Point { x, y };
                if game.mines.contains(&at) {
                    continue;
                }
                last = game.reveal(at).status;
            }
        }
        assert_eq!(last, GameStatus::Victory);
    }

    #[test]
    fn test_reveal_reports_clue() {
        let mines = HashSet::from([Point { x: 0, y: 0 }, Point { x: 2, y: 0 }]);
        let mut game = Game::with_mines(config(3, 3, 2), mines);
        let result = game.reveal(Point { x: 1, y: 0 });
        assert_eq!(result.new_squares.len(), 1);
        assert_eq!(result.new_squares[0].num_mines, 2);
    }

    #[test]
    fn test_flood_fill_reveals_zero_region() {
        // Single mine in the corner of a 4x4 board: revealing the opposite
        // corner floods out the whole zero region in one turn.
        let mut cfg = config(4, 4, 1);
        cfg.auto_expand_clear_areas = true;
        let mines = HashSet::from([Point { x: 0, y: 0 }]);
        let mut game = Game::with_mines(cfg, mines);
        let result = game.reveal(Point { x: 3, y: 3 });
        assert!(result.new_squares.len() > 1);
        // The flooded region never includes the mine.
        assert!(
            result
                .new_squares
                .iter()
                .all(|s| s.pos != Point { x: 0, y: 0 })
        );
    }

    #[test]
    fn test_reveal_revealed_cell_is_noop() {
        let mines = HashSet::from([Point { x: 2, y: 2 }]);
        let mut game = Game::with_mines(config(3, 3, 1), mines);
        game.reveal(Point { x: 0, y: 0 });
        let result = game.reveal(Point { x: 0, y: 0 });
        assert!(result.new_squares.is_empty());
        assert_eq!(result.status, GameStatus::Playing);
    }

    #[test]
    fn test_run_games_smoke() {
        let cfg = config(4, 4, 2);
        let mut agent = CspAgent::new(&cfg, Point { x: 0, y: 0 });
        let mut rng = StdRng::seed_from_u64(42);
        let results = run_games(cfg, 5, &mut agent, &mut rng).unwrap();
        assert_eq!(results.len(), 5);
        for result in results {
            assert_ne!(result.status, GameStatus::Playing);
            assert!(result.num_moves >= 1);
        }
    }
}
