use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;

use crate::agent::AgentKind;
use crate::game::{GameConfig, GameResult};

/// One aggregated row per (board configuration, agent type).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatsRecord {
    /// Board dimensions as "width*height".
    pub size: String,
    pub mines: usize,
    /// Mean move count over won games; 0 when nothing was won.
    pub steps: u32,
    /// Fraction of games won, rounded to two decimals.
    pub win_rate: f64,
    pub games_won: u32,
    pub games_lost: u32,
    /// The strategy name, e.g. "csp".
    pub agent: String,
}

const CSV_HEADER: &str = "size,mines,steps,win_rate,games_won,games_lost,agent";

/// Folds a batch of game outcomes into one record. Abandoned games count as
/// losses; only won games contribute to the mean move count.
pub fn aggregate(config: &GameConfig, kind: AgentKind, results: &[GameResult]) -> StatsRecord {
    let games_won = results.iter().filter(|r| r.victory()).count() as u32;
    let games_lost = results.len() as u32 - games_won;
    let win_steps: u32 = results
        .iter()
        .filter(|r| r.victory())
        .map(|r| r.num_moves)
        .sum();
    let steps = if games_won > 0 { win_steps / games_won } else { 0 };
    let win_rate = if results.is_empty() {
        0.0
    } else {
        (games_won as f64 / results.len() as f64 * 100.0).round() / 100.0
    };

    StatsRecord {
        size: format!("{}*{}", config.width, config.height),
        mines: config.num_mines,
        steps,
        win_rate,
        games_won,
        games_lost,
        agent: kind.name().to_string(),
    }
}

/// Appends records to a CSV file, writing the header only when the file is
/// new or empty, so repeated sweeps accumulate rows.
pub fn append_csv(path: &Path, records: &[StatsRecord]) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", CSV_HEADER)?;
    }
    for record in records {
        let row = [
            record.size.clone(),
            record.mines.to_string(),
            record.steps.to_string(),
            record.win_rate.to_string(),
            record.games_won.to_string(),
            record.games_lost.to_string(),
            record.agent.clone(),
        ]
        .into_iter()
        .join(",");
        writeln!(file, "{}", row)?;
    }
    Ok(())
}
