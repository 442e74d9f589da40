//! sweep: run batches of games per agent type and append win-rate rows to a
//! CSV file, one row per (board configuration, agent) pair.

use std::path::PathBuf;
use std::time::Instant;

use minesweeper_csp::{AgentKind, GameConfig, Point, aggregate, append_csv, run_games};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mut width: usize = 8;
    let mut height: usize = 8;
    let mut mines: usize = 3;
    let mut games: u32 = 100;
    let mut seed: u64 = 42;
    let mut agents = vec![AgentKind::Random, AgentKind::Csp];
    let mut out = PathBuf::from("Statistics.csv");

    // Parse args
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                i += 1;
                width = args[i].parse().expect("Invalid --width");
            }
            "--height" => {
                i += 1;
                height = args[i].parse().expect("Invalid --height");
            }
            "--mines" => {
                i += 1;
                mines = args[i].parse().expect("Invalid --mines");
            }
            "--games" => {
                i += 1;
                games = args[i].parse().expect("Invalid --games");
            }
            "--seed" => {
                i += 1;
                seed = args[i].parse().expect("Invalid --seed");
            }
            "--agents" => {
                i += 1;
                agents = args[i]
                    .split(',')
                    .map(|name| {
                        AgentKind::parse(name.trim()).unwrap_or_else(|| {
                            eprintln!("Unknown agent '{}'. Available: random, csp", name);
                            std::process::exit(1);
                        })
                    })
                    .collect();
            }
            "--out" => {
                i += 1;
                out = PathBuf::from(&args[i]);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = GameConfig {
        width,
        height,
        num_mines: mines,
        auto_expand_clear_areas: false,
    };
    let start = Point { x: 0, y: 0 };

    println!("=== minesweeper sweep ===");
    println!(
        "Board: {}x{}, {} mines, {} games/agent, seed={}",
        width, height, mines, games, seed
    );

    let mut records = Vec::with_capacity(agents.len());
    for (idx, &kind) in agents.iter().enumerate() {
        let t0 = Instant::now();

        // Each agent gets its own deterministic RNG stream.
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
        let mut agent = kind.build(&config, start, StdRng::seed_from_u64(seed));
        let results = run_games(config, games, agent.as_mut(), &mut rng)?;

        let record = aggregate(&config, kind, &results);
        println!(
            "[{}/{}] {:>6}  won {:>4}/{}  win_rate={:.2}  mean_steps={}  {:.1}s",
            idx + 1,
            agents.len(),
            kind.name(),
            record.games_won,
            games,
            record.win_rate,
            record.steps,
            t0.elapsed().as_secs_f64(),
        );
        records.push(record);
    }

    append_csv(&out, &records)?;
    println!("\nAppended {} rows to {}.", records.len(), out.display());

    Ok(())
}

fn print_usage() {
    println!(
        "sweep: run batches of minesweeper games per agent type, append stats to CSV.

USAGE:
    sweep [OPTIONS]

OPTIONS:
    --width <N>        Board width [default: 8]
    --height <N>       Board height [default: 8]
    --mines <N>        Mines per board [default: 3]
    --games <N>        Games per agent [default: 100]
    --seed <S>         Base RNG seed [default: 42]
    --agents <LIST>    Comma-separated agents: random, csp [default: random,csp]
    --out <PATH>       Output CSV path [default: Statistics.csv]
    -h, --help         Print this help"
    );
}
