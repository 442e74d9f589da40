//! A minesweeper player that reasons over the count constraints revealed
//! clues impose on their hidden neighbors.
//!
//! Each clue becomes a linear equation "exactly k of these cells are mines";
//! subset elimination between equations derives guaranteed-safe and
//! guaranteed-mine cells, and a risk-scored heuristic picks the least
//! dangerous guess when no certainty exists. A small game engine and a
//! statistics harness drive full games against the agent.

pub mod agent;
pub mod equation;
pub mod game;
pub mod stats;
pub mod variable;

pub use agent::{Agent, AgentKind, CspAgent, RandomAgent};
pub use equation::{Equation, EquationStore};
pub use game::{
    Game, GameConfig, GameResult, GameStatus, Point, RevealResult, Square, neighbors, run_games,
};
pub use stats::{StatsRecord, aggregate, append_csv};
pub use variable::Variable;
