//! Headless боевая симуляция
//!
//! Два бойца враждующих фракций, 1000 тиков (≈16.7s игрового времени)

use bevy::prelude::*;
use kuros_simulation::{
    create_headless_app, spawn_fighter, AttackController, AttackSpec, AttackTemplate, Health,
};

fn main() {
    let seed = 42;
    println!("Starting Kuros headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);

    let fighter_a = spawn_fighter(
        app.world_mut(),
        Vec3::new(-120.0, 0.0, 0.0),
        1,
        AttackController::new(vec![AttackTemplate::melee(AttackSpec {
            name: "Slash".to_string(),
            ..default()
        })]),
    );
    let fighter_b = spawn_fighter(
        app.world_mut(),
        Vec3::new(120.0, 0.0, 0.0),
        2,
        AttackController::new(vec![AttackTemplate::freeze_melee(
            AttackSpec {
                name: "FrostBite".to_string(),
                cooldown_duration: 2.0,
                ..default()
            },
            1.0,
        )]),
    );

    // 1000 тиков симуляции
    for tick in 0..1000 {
        app.update();

        if tick % 100 == 0 {
            let hp = |entity| {
                app.world()
                    .get::<Health>(entity)
                    .map(|h| h.current)
                    .unwrap_or(0)
            };
            println!(
                "Tick {}: A={} hp, B={} hp, {} entities",
                tick,
                hp(fighter_a),
                hp(fighter_b),
                app.world().entities().len()
            );
        }
    }

    println!("Simulation complete!");
}
