//! Combat-подсистема: шаблоны атак, контроллер, урон, окно ударов.
//!
//! Все системы работают в FixedUpdate (60 Hz) и связаны `.chain()` —
//! порядок фиксирован, писатели событий бегут раньше читателей,
//! события доходят в том же тике.

pub mod attack;
pub mod controller;
pub mod damage;
pub mod hit_tracker;

use bevy::prelude::*;

use crate::components::{Actor, ActorConfig, AttackTimer, Body, Health, InputSnapshot};
use crate::effects::{apply_freeze_requests, tick_effects};
use crate::fsm::{tick_state_machines, ActorFinalized, StateChanged};
use crate::movement::apply_velocity;

pub use attack::{
    AttackKind, AttackPhase, AttackSpec, AttackTemplate, EscapeResolved, FreezeRequested,
};
pub use controller::{AttackController, SelectionPolicy};
pub use damage::{apply_strikes, finalize_dead_actors, react_to_damage, DamageDealt, EntityDied, StrikeEvent};
pub use hit_tracker::HitTracker;

/// Тик общего меж-шаблонного cooldown'а всех акторов
pub fn tick_attack_timers(time: Res<Time>, mut timers: Query<&mut AttackTimer>) {
    let delta = time.delta_secs();
    for mut timer in timers.iter_mut() {
        timer.tick(delta);
    }
}

/// Сброс just_pressed в конце тика симуляции
pub fn end_input_tick(mut input: ResMut<InputSnapshot>) {
    input.end_tick();
}

/// Plugin: события + полный конвейер боевого тика
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<Actor>()
            .register_type::<Health>()
            .register_type::<Body>()
            .register_type::<AttackTimer>()
            .register_type::<ActorConfig>()
            .add_event::<StrikeEvent>()
            .add_event::<DamageDealt>()
            .add_event::<EntityDied>()
            .add_event::<FreezeRequested>()
            .add_event::<EscapeResolved>()
            .add_event::<StateChanged>()
            .add_event::<ActorFinalized>()
            .add_systems(
                FixedUpdate,
                (
                    tick_attack_timers,
                    tick_state_machines,
                    tick_effects,
                    apply_freeze_requests,
                    apply_strikes,
                    react_to_damage,
                    apply_velocity,
                    finalize_dead_actors,
                    end_input_tick,
                )
                    .chain(),
            );
    }
}
