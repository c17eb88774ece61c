//! Kuros Simulation Core
//!
//! Детерминированная боевая симуляция акторов на Bevy 0.16 ECS:
//! - FSM актора (Idle/Walk/Attack/Hit/Frozen/CooldownFrozen/Dying/Dead)
//! - Фазовые шаблоны атак (Warmup → Active → Recovery) с вариантами
//! - Таймированные эффекты (заморозка, модификаторы скорости)
//! - Скользящее окно полученных ударов (анти-stunlock)
//!
//! Ядро headless: физика и рендер — забота внешнего слоя. Всё боевое
//! время течёт в FixedUpdate (60 Hz), RNG seeded → тик-в-тик
//! воспроизводимость при одинаковом seed.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

pub mod combat;
pub mod components;
pub mod effects;
pub mod fsm;
pub mod logger;
pub mod movement;

pub use combat::{
    AttackController, AttackKind, AttackPhase, AttackSpec, AttackTemplate, CombatPlugin,
    DamageDealt, EntityDied, EscapeResolved, FreezeRequested, HitTracker, SelectionPolicy,
    StrikeEvent,
};
pub use components::*;
pub use effects::{Effect, EffectController, EffectCtx, EffectKind};
pub use fsm::{ActorFinalized, ActorStateMachine, State, StateChanged, StateId, StateKind};

/// Частота симуляции (Hz)
pub const SIMULATION_HZ: f64 = 60.0;

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Главный plugin симуляции
pub struct SimulationPlugin {
    pub seed: u64,
}

impl Default for SimulationPlugin {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(SIMULATION_HZ))
            .insert_resource(DeterministicRng::new(self.seed))
            .init_resource::<InputSnapshot>()
            .add_plugins(CombatPlugin);
    }
}

/// Создаёт minimal Bevy App для headless симуляции.
///
/// Время продвигается вручную ровно на 1/60s за `app.update()` —
/// один update == один fixed tick, независимо от wall clock.
pub fn create_headless_app(seed: u64) -> App {
    logger::init_logger();
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / SIMULATION_HZ,
        )))
        .add_plugins(SimulationPlugin { seed });
    app
}

/// Полный набор состояний бойца
pub fn default_fighter_states() -> Vec<State> {
    vec![
        State::idle(),
        State::walk(),
        State::attack(),
        State::hit(0.3),
        State::frozen(2.0),
        State::cooldown_frozen(1.0),
        State::dying(0.8),
        State::dead(),
    ]
}

/// Спавнит бойца со стандартным набором состояний и переданными атаками
pub fn spawn_fighter(
    world: &mut World,
    position: Vec3,
    faction_id: u64,
    attacks: AttackController,
) -> Entity {
    let machine = ActorStateMachine::new(default_fighter_states(), attacks, StateId::Idle);
    world
        .spawn((
            Actor { faction_id },
            Health::default(),
            Body::default(),
            AttackTimer::default(),
            ActorConfig::default(),
            machine,
            EffectController::default(),
            HitTracker::default(),
            Transform::from_translation(position),
        ))
        .id()
}

/// Snapshot боевого состояния мира для сравнения детерминизма
pub fn world_snapshot(world: &mut World) -> Vec<u8> {
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &Health, &Transform, &ActorStateMachine)>();
    let mut actors: Vec<_> = query.iter(world).collect();

    // Сортировка по Entity ID для стабильного порядка
    actors.sort_by_key(|(entity, _, _, _)| entity.index());

    for (entity, health, transform, machine) in actors {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(
            format!(
                "hp={}/{} pos={:?} state={}",
                health.current,
                health.max,
                transform.translation,
                machine.current_name()
            )
            .as_bytes(),
        );
    }

    snapshot
}
