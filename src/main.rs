//! Headless overworld demo
//!
//! Usage: `overworld [AREA_FILE] [FRAMES]`
//!
//! Loads an area, walks the player around a little and runs every NPC for the
//! given number of 60 Hz frames. Set `RUST_LOG=debug` to watch decisions.

use overworld::prelude::*;

const DEFAULT_AREA: &str = "assets/areas/route_01.ron";
const DEFAULT_FRAMES: u64 = 600;
const DT: f32 = 1.0 / 60.0;

/// Scripted player input: a direction every half second
const PLAYER_SCRIPT: [Direction; 6] = [
    Direction::Right,
    Direction::Right,
    Direction::Up,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

fn run(area_path: &str, frames: u64) -> Result<(), ConfigError> {
    let area = AreaDefinition::load(area_path)?;
    let mut overworld = Overworld::from_area(&area)?;
    println!("{}: {}", overworld.name(), overworld.world().npc_ids().join(", "));

    let mut script = PLAYER_SCRIPT.iter().cycle();
    let mut encounters = 0;

    for frame in 0..frames {
        if frame % 30 == 0 {
            if let Some(&direction) = script.next() {
                if !overworld.move_player(direction) {
                    overworld.player_leap(direction);
                }
            }
        }

        overworld.update(DT);

        for event in overworld.events_mut().drain() {
            match event {
                OverworldEvent::TrainerSpotted { id, player_tile, .. } => {
                    encounters += 1;
                    println!(
                        "frame {:>4}: '{}' challenges the player at {}",
                        frame, id, player_tile
                    );
                }
                OverworldEvent::GaveUp { entity, goal } => {
                    log::warn!("{:?} gave up walking to {}", entity, goal);
                }
                other => log::debug!("{:?}", other),
            }
        }
    }

    let stats = overworld.cache().stats();
    log::info!(
        "Ran {} frames: {} encounters, {} cached paths ({} hits, {} misses)",
        overworld.frame(),
        encounters,
        overworld.cache().len(),
        stats.hits,
        stats.misses
    );

    for (_, (moving, id)) in overworld.world().query::<(&MovingEntity, &NpcId)>().iter() {
        println!("{:<12} {} facing {:?}", id.0, moving.tile(), moving.facing());
    }
    if let Some(tile) = overworld.tile_of(overworld.player()) {
        println!("{:<12} {}", "player", tile);
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let area_path = args.next().unwrap_or_else(|| DEFAULT_AREA.to_string());
    let frames = match args.next().map(|arg| arg.parse::<u64>()) {
        Some(Ok(frames)) => frames,
        Some(Err(e)) => {
            eprintln!("Invalid frame count: {}", e);
            std::process::exit(2);
        }
        None => DEFAULT_FRAMES,
    };

    if let Err(e) = run(&area_path, frames) {
        eprintln!("Overworld error: {}", e);
        std::process::exit(1);
    }
}
