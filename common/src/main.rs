use minesweeper_csp::*;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // --- 1. Initialization ---
    let config = GameConfig {
        width: 10,
        height: 10,
        num_mines: 15,
        auto_expand_clear_areas: false,
    };
    let mut rng = rand::rng();
    let mut game = Game::new(config, &mut rng);
    let mut agent = CspAgent::new(&config, Point { x: 2, y: 2 });

    println!("--- Constraint-Solving Minesweeper Bot ---");
    println!("Strategy: reveal deduced-safe cells, guess by lowest risk otherwise.");
    println!("Initial Board:");
    print_board(&game, agent.flags());
    thread::sleep(Duration::from_secs(1));

    // --- 2. Game Loop ---
    let mut move_count = 0;
    while game.status == GameStatus::Playing {
        let Some(point) = agent.next_move()? else {
            println!("No valid moves left for the bot to make.");
            break;
        };
        move_count += 1;
        println!("\n--- Move #{} ---", move_count);
        println!("Bot reveals ({}, {})...", point.x, point.y);

        let result = game.reveal(point);
        agent.update(&result)?;
        print_board(&game, agent.flags());

        // Add a delay to make the game watchable.
        thread::sleep(Duration::from_millis(300));
    }

    // --- 3. Final Result ---
    println!("\n--- Game Over ---");
    println!("Game lasted {} moves.", move_count);
    match game.status {
        GameStatus::Victory => println!("Result: The bot won!"),
        GameStatus::Defeat => println!("Result: The bot hit a mine and lost."),
        GameStatus::Abandoned | GameStatus::Playing => {
            println!("Result: The game ended unexpectedly.")
        }
    }

    Ok(())
}

fn print_board(game: &Game, flags: &HashSet<Point>) {
    // Print header
    print!("   ");
    for x in 0..game.config.width {
        print!("{:^3}", x);
    }
    println!("\n  +{}", "---".repeat(game.config.width));

    // Print rows
    for y in 0..game.config.height {
        print!("{:^2}|", y);
        for x in 0..game.config.width {
            let at = Point { x, y };
            let display = if flags.contains(&at) {
                " F ".to_string()
            } else {
                match game.cell(at) {
                    None => " ■ ".to_string(),
                    Some(n) => format!(" {} ", n),
                }
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}
