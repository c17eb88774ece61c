//! FSM акторов + ECS-обвязка.
//!
//! Ядро (machine/states/context) — plain-структуры без ECS; здесь живут
//! системы, которые собирают `StateCtx` из query, тикают машины и
//! конвертируют буфер `CombatRequest` в Bevy events.

pub mod context;
pub mod machine;
pub mod states;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::combat::attack::{EscapeResolved, FreezeRequested};
use crate::combat::damage::StrikeEvent;
use crate::components::{Actor, ActorConfig, AttackTimer, Body, Health, InputSnapshot};
use crate::logger;
use crate::DeterministicRng;

pub use context::{CombatRequest, StateCtx, TargetView};
pub use machine::{ActorStateMachine, StateId};
pub use states::{State, StateKind};

/// Событие: актор сменил состояние (для анимации/рендера)
#[derive(Event, Debug, Clone)]
pub struct StateChanged {
    pub entity: Entity,
    pub from: Option<StateId>,
    pub to: StateId,
}

/// Событие: актор дошёл до Dead — убрать из симуляции
#[derive(Event, Debug, Clone)]
pub struct ActorFinalized {
    pub entity: Entity,
}

/// Все writer'ы, в которые раскладывается буфер запросов тика
#[derive(SystemParam)]
pub struct RequestWriters<'w> {
    strikes: EventWriter<'w, StrikeEvent>,
    freezes: EventWriter<'w, FreezeRequested>,
    escapes: EventWriter<'w, EscapeResolved>,
    state_changes: EventWriter<'w, StateChanged>,
    finalized: EventWriter<'w, ActorFinalized>,
}

impl RequestWriters<'_> {
    pub fn flush(&mut self, requests: Vec<CombatRequest>) {
        for request in requests {
            match request {
                CombatRequest::Strike {
                    attacker,
                    target,
                    damage,
                } => {
                    self.strikes.write(StrikeEvent {
                        attacker,
                        target,
                        damage,
                    });
                }
                CombatRequest::FreezeTarget { target, duration } => {
                    self.freezes.write(FreezeRequested { target, duration });
                }
                CombatRequest::EscapeResolved {
                    attacker,
                    target,
                    escaped,
                } => {
                    self.escapes.write(EscapeResolved {
                        attacker,
                        target,
                        escaped,
                    });
                }
                CombatRequest::StateChanged { entity, from, to } => {
                    logger::log(&format!(
                        "{:?}: {} → {}",
                        entity,
                        from.map(|f| f.as_str()).unwrap_or("None"),
                        to.as_str()
                    ));
                    self.state_changes.write(StateChanged { entity, from, to });
                }
                CombatRequest::Finalize { entity } => {
                    self.finalized.write(ActorFinalized { entity });
                }
            }
        }
    }
}

/// Read-only снапшот актора для поиска целей
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActorSnapshot {
    pub entity: Entity,
    pub position: Vec3,
    pub faction_id: u64,
    pub alive: bool,
}

/// Ближайший живой враг другой фракции
pub(crate) fn nearest_enemy(
    snapshots: &[ActorSnapshot],
    entity: Entity,
    faction_id: u64,
    position: Vec3,
) -> Option<TargetView> {
    snapshots
        .iter()
        .filter(|s| s.entity != entity && s.faction_id != faction_id && s.alive)
        .min_by(|a, b| {
            let da = a.position.distance_squared(position);
            let db = b.position.distance_squared(position);
            da.total_cmp(&db)
        })
        .map(|s| TargetView {
            entity: s.entity,
            position: s.position,
        })
}

type ActorComponents = (
    Entity,
    &'static Transform,
    &'static mut Body,
    &'static mut AttackTimer,
    &'static ActorConfig,
    &'static mut ActorStateMachine,
    &'static Actor,
    &'static Health,
);

/// Тик FSM всех акторов.
///
/// Порядок детерминирован: снапшот целей собирается до мутаций,
/// акторы тикают в порядке итерации query, RNG — общий seeded ресурс.
pub fn tick_state_machines(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    mut rng: ResMut<DeterministicRng>,
    mut actors: Query<ActorComponents>,
    mut writers: RequestWriters,
) {
    let delta = time.delta_secs();

    let snapshots: Vec<ActorSnapshot> = actors
        .iter()
        .map(
            |(entity, transform, _, _, _, _, actor, health)| ActorSnapshot {
                entity,
                position: transform.translation,
                faction_id: actor.faction_id,
                alive: health.is_alive(),
            },
        )
        .collect();

    for (entity, transform, mut body, mut attack_timer, config, mut machine, actor, _) in
        actors.iter_mut()
    {
        let position = transform.translation;
        let target = nearest_enemy(&snapshots, entity, actor.faction_id, position);

        let mut requests = Vec::new();
        let mut ctx = StateCtx {
            entity,
            position,
            body: &mut body,
            attack_timer: &mut attack_timer,
            config,
            target,
            input: &input,
            rng: &mut rng.rng,
            requests: &mut requests,
        };

        machine.physics_update(&mut ctx, delta);
        writers.flush(requests);
    }
}
