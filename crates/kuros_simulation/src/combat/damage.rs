//! Конвейер урона: Strike → Health → реакция FSM (hit stun,
//! самозаморозка по окну ударов, смерть) → финализация entity.

use bevy::prelude::*;

use crate::combat::hit_tracker::HitTracker;
use crate::components::{ActorConfig, AttackTimer, Body, Health, InputSnapshot};
use crate::effects::{Effect, EffectController, EffectCtx};
use crate::fsm::context::{CombatRequest, StateCtx};
use crate::fsm::machine::{ActorStateMachine, StateId};
use crate::fsm::{ActorFinalized, RequestWriters};
use crate::logger;
use crate::DeterministicRng;

/// Событие: удар дошёл до цели (overlap уже проверен атакой)
#[derive(Event, Debug, Clone)]
pub struct StrikeEvent {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
}

/// Событие: урон применён к Health
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
    pub target_died: bool,
}

/// Событие: актор умер
#[derive(Event, Debug, Clone)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Применение ударов к Health. Удары по мёртвым игнорируются.
pub fn apply_strikes(
    mut strikes: EventReader<StrikeEvent>,
    mut targets: Query<&mut Health>,
    mut dealt: EventWriter<DamageDealt>,
    mut died: EventWriter<EntityDied>,
) {
    for strike in strikes.read() {
        let Ok(mut health) = targets.get_mut(strike.target) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        health.take_damage(strike.damage);
        let target_died = !health.is_alive();

        logger::log(&format!(
            "💥 {:?} hit {:?} for {} ({}/{} hp)",
            strike.attacker, strike.target, strike.damage, health.current, health.max
        ));

        dealt.write(DamageDealt {
            attacker: strike.attacker,
            target: strike.target,
            damage: strike.damage,
            target_died,
        });
        if target_died {
            died.write(EntityDied {
                entity: strike.target,
                killer: Some(strike.attacker),
            });
        }
    }
}

/// Реакция FSM на полученный урон.
///
/// Смерть: все эффекты снимаются, переход в Dying (или сразу Dead).
/// Выживание: удар регистрируется в HitTracker; порог в окне —
/// самозаморозка, иначе hit stun. Stun прерывает только Idle/Walk/Hit:
/// атаку, заморозки и смерть урон не сбивает.
pub fn react_to_damage(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    mut rng: ResMut<DeterministicRng>,
    mut events: EventReader<DamageDealt>,
    mut actors: Query<(
        Entity,
        &Transform,
        &mut Body,
        &mut AttackTimer,
        &ActorConfig,
        &mut ActorStateMachine,
        &mut EffectController,
        &mut HitTracker,
    )>,
    mut writers: RequestWriters,
) {
    let now = time.elapsed_secs();

    for event in events.read() {
        let Ok((
            entity,
            transform,
            mut body,
            mut attack_timer,
            config,
            machine,
            mut effects,
            mut tracker,
        )) = actors.get_mut(event.target)
        else {
            continue;
        };

        let machine = machine.into_inner();
        let current = machine.current_state();
        if matches!(current, Some(StateId::Dying | StateId::Dead)) {
            continue;
        }

        let mut requests = Vec::new();
        let mut ctx = StateCtx {
            entity,
            position: transform.translation,
            body: &mut body,
            attack_timer: &mut attack_timer,
            config,
            target: None,
            input: &input,
            rng: &mut rng.rng,
            requests: &mut requests,
        };
        let mut fx = EffectCtx {
            machine,
            state: &mut ctx,
        };

        if event.target_died {
            effects.clear_all(&mut fx);
            if fx.machine.has_state(StateId::Dying) {
                fx.machine.change_state(StateId::Dying, fx.state);
            } else if fx.machine.has_state(StateId::Dead) {
                fx.machine.change_state(StateId::Dead, fx.state);
            } else {
                fx.state
                    .requests
                    .push(CombatRequest::Finalize { entity });
            }
            writers.flush(requests);
            continue;
        }

        tracker.register_hit(now);
        if tracker.should_freeze(now) {
            tracker.reset();
            let duration = tracker.freeze_duration;
            effects.add_effect(
                Effect::freeze(
                    format!("hit_freeze_{entity:?}"),
                    duration,
                    StateId::Frozen,
                    StateId::Walk,
                    true,
                ),
                &mut fx,
            );
        } else if matches!(
            fx.machine.current_state(),
            Some(StateId::Idle | StateId::Walk | StateId::Hit)
        ) {
            fx.machine.change_state(StateId::Hit, fx.state);
        }

        writers.flush(requests);
    }
}

/// Удаление финализированных акторов из мира
pub fn finalize_dead_actors(mut events: EventReader<ActorFinalized>, mut commands: Commands) {
    for event in events.read() {
        if let Ok(mut entity_commands) = commands.get_entity(event.entity) {
            logger::log(&format!("💀 Actor finalized: {:?}", event.entity));
            entity_commands.despawn();
        }
    }
}
