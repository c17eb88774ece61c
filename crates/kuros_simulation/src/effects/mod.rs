//! Таймированные эффекты акторов (заморозка, модификаторы скорости).
//!
//! Эффект — данные + пара хуков apply/removed; контроллер владеет
//! активным списком и тикает elapsed. Эффекты одного id не дублируются:
//! повторное наложение обновляет существующий (stacks↑, elapsed=0).

use bevy::prelude::*;

use crate::combat::attack::FreezeRequested;
use crate::components::{ActorConfig, AttackTimer, Body, InputSnapshot};
use crate::fsm::context::StateCtx;
use crate::fsm::machine::{ActorStateMachine, StateId};
use crate::fsm::RequestWriters;
use crate::logger;
use crate::DeterministicRng;

/// Запас hold-таймера frozen-состояния над длительностью эффекта:
/// снятие эффекта всегда отрабатывает раньше собственного timeout'а
/// состояния (FSM тикает раньше эффектов в том же тике)
const FROZEN_HOLD_MARGIN: f32 = 0.25;

/// Доступ эффекта к актору: FSM + контекст тика
pub struct EffectCtx<'a, 'w> {
    pub machine: &'a mut ActorStateMachine,
    pub state: &'a mut StateCtx<'w>,
}

/// Вариант эффекта и его runtime-хвост
#[derive(Debug, Clone)]
pub enum EffectKind {
    /// Принудительный перевод в frozen-состояние на время действия
    Freeze {
        frozen_state: StateId,
        fallback_state: StateId,
        /// Возвращаться в состояние до заморозки (иначе всегда fallback)
        resume_previous: bool,
        previous: Option<StateId>,
    },
    /// Множитель walk speed
    Speed { multiplier: f32, original_speed: f32 },
}

#[derive(Debug, Clone)]
pub struct Effect {
    pub id: String,
    /// Длительность в секундах; ≤ 0 — бессрочный (снимается явно)
    pub duration: f32,
    pub elapsed: f32,
    pub stacks: u32,
    pub max_stacks: u32,
    kind: EffectKind,
}

impl Effect {
    pub fn freeze(
        id: impl Into<String>,
        duration: f32,
        frozen_state: StateId,
        fallback_state: StateId,
        resume_previous: bool,
    ) -> Self {
        Self {
            id: id.into(),
            duration,
            elapsed: 0.0,
            stacks: 1,
            max_stacks: 1,
            kind: EffectKind::Freeze {
                frozen_state,
                fallback_state,
                resume_previous,
                previous: None,
            },
        }
    }

    pub fn speed(id: impl Into<String>, duration: f32, multiplier: f32) -> Self {
        Self {
            id: id.into(),
            duration,
            elapsed: 0.0,
            stacks: 1,
            max_stacks: 1,
            kind: EffectKind::Speed {
                multiplier,
                original_speed: 0.0,
            },
        }
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks;
        self
    }

    /// Повторное наложение того же id: стек вверх, таймер с нуля
    fn refresh(&mut self, added_stacks: u32) {
        self.stacks = (self.stacks + added_stacks).clamp(1, self.max_stacks.max(1));
        self.elapsed = 0.0;
    }

    /// Hold frozen-состояния длиннее эффекта; бессрочный эффект
    /// (duration ≤ 0) отключает timeout состояния совсем
    fn frozen_hold(duration: f32) -> f32 {
        if duration > 0.0 {
            duration + FROZEN_HOLD_MARGIN
        } else {
            f32::INFINITY
        }
    }

    /// Хук после refresh: заморозка перезапускает hold-таймер состояния
    /// вместе со своим elapsed, иначе timeout состояния обгонит эффект
    fn on_refreshed(&mut self, fx: &mut EffectCtx) {
        match &self.kind {
            EffectKind::Freeze { frozen_state, .. } => {
                if fx.machine.current_state() == Some(*frozen_state) {
                    let frozen = *frozen_state;
                    fx.machine.set_hold_duration(frozen, Self::frozen_hold(self.duration));
                    // Повторный вход в то же состояние обнуляет его таймер
                    fx.machine.change_state(frozen, fx.state);
                }
                fx.state.attack_timer.raise_to(self.duration);
            }
            EffectKind::Speed { .. } => {}
        }
    }

    /// Применение. false — эффект невалиден для этого актора и отброшен.
    fn on_apply(&mut self, fx: &mut EffectCtx) -> bool {
        match &mut self.kind {
            EffectKind::Freeze {
                frozen_state,
                previous,
                ..
            } => {
                if !fx.machine.has_state(*frozen_state) {
                    logger::log_warning(&format!(
                        "freeze effect '{}': state {} not configured, discarded (entity: {:?})",
                        self.id,
                        frozen_state.as_str(),
                        fx.state.entity
                    ));
                    return false;
                }

                *previous = fx.machine.current_state();
                let frozen = *frozen_state;
                fx.machine.set_hold_duration(frozen, Self::frozen_hold(self.duration));
                fx.machine.change_state(frozen, fx.state);
                fx.state.body.velocity = Vec3::ZERO;
                // Заморожен — значит не атакует минимум до конца эффекта
                fx.state.attack_timer.raise_to(self.duration);

                logger::log(&format!(
                    "❄️ Frozen for {:.2}s (entity: {:?})",
                    self.duration, fx.state.entity
                ));
                true
            }

            EffectKind::Speed {
                multiplier,
                original_speed,
            } => {
                *original_speed = fx.state.body.speed;
                fx.state.body.speed *= *multiplier;
                true
            }
        }
    }

    fn on_removed(&mut self, fx: &mut EffectCtx) {
        match &self.kind {
            EffectKind::Freeze {
                frozen_state,
                fallback_state,
                resume_previous,
                previous,
            } => {
                fx.state.attack_timer.clear();

                // Состояние могло смениться извне (смерть, новый hit) —
                // восстанавливаем только если всё ещё заморожены
                if fx.machine.current_state() == Some(*frozen_state) {
                    let target = if *resume_previous {
                        (*previous)
                            .filter(|p| *p != *frozen_state && fx.machine.has_state(*p))
                            .unwrap_or(*fallback_state)
                    } else {
                        *fallback_state
                    };
                    fx.machine.change_state(target, fx.state);
                }

                fx.machine
                    .attack_controller_mut()
                    .force_queue_next_attack("thaw");
            }

            EffectKind::Speed { original_speed, .. } => {
                fx.state.body.speed = *original_speed;
            }
        }
    }
}

/// Активные эффекты актора
#[derive(Component, Debug, Clone, Default)]
pub struct EffectController {
    effects: Vec<Effect>,
}

impl EffectController {
    pub fn has_effect(&self, id: &str) -> bool {
        self.effects.iter().any(|e| e.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.effects.len()
    }

    /// Наложение: тот же id — refresh, новый — apply (или discard)
    pub fn add_effect(&mut self, mut effect: Effect, fx: &mut EffectCtx) {
        if let Some(existing) = self.effects.iter_mut().find(|e| e.id == effect.id) {
            existing.refresh(effect.stacks.max(1));
            existing.on_refreshed(fx);
            return;
        }

        if effect.on_apply(fx) {
            self.effects.push(effect);
        }
    }

    /// Тик: истёкшие эффекты снимаются с вызовом on_removed
    pub fn tick(&mut self, fx: &mut EffectCtx, delta: f32) {
        let mut index = self.effects.len();
        while index > 0 {
            index -= 1;
            self.effects[index].elapsed += delta;

            let expired = {
                let effect = &self.effects[index];
                effect.duration > 0.0 && effect.elapsed >= effect.duration
            };
            if expired {
                let mut effect = self.effects.remove(index);
                effect.on_removed(fx);
            }
        }
    }

    /// Явное снятие по id. false если эффекта нет.
    pub fn remove_by_id(&mut self, id: &str, fx: &mut EffectCtx) -> bool {
        match self.effects.iter().position(|e| e.id == id) {
            Some(index) => {
                let mut effect = self.effects.remove(index);
                effect.on_removed(fx);
                true
            }
            None => false,
        }
    }

    /// Снятие всех эффектов (смерть актора)
    pub fn clear_all(&mut self, fx: &mut EffectCtx) {
        while let Some(mut effect) = self.effects.pop() {
            effect.on_removed(fx);
        }
    }
}

type EffectHost = (
    Entity,
    &'static Transform,
    &'static mut Body,
    &'static mut AttackTimer,
    &'static ActorConfig,
    &'static mut ActorStateMachine,
    &'static mut EffectController,
);

/// Тик эффектов всех акторов (после FSM: эффект может перебить переход тика)
pub fn tick_effects(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    mut rng: ResMut<DeterministicRng>,
    mut hosts: Query<EffectHost>,
    mut writers: RequestWriters,
) {
    let delta = time.delta_secs();

    for (entity, transform, mut body, mut attack_timer, config, machine, mut effects) in
        hosts.iter_mut()
    {
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
            machine: machine.into_inner(),
            state: &mut ctx,
        };

        effects.tick(&mut fx, delta);
        writers.flush(requests);
    }
}

/// Наложение заморозок по запросам freeze-on-hit атак
pub fn apply_freeze_requests(
    input: Res<InputSnapshot>,
    mut rng: ResMut<DeterministicRng>,
    // RequestWriters содержит EventWriter<FreezeRequested>: доступ к тем же
    // Events разводим через ParamSet (иначе B0002 при инициализации schedule)
    mut params: ParamSet<(EventReader<FreezeRequested>, RequestWriters)>,
    mut hosts: Query<EffectHost>,
) {
    let events: Vec<FreezeRequested> = params.p0().read().cloned().collect();
    for event in events {
        let Ok((entity, transform, mut body, mut attack_timer, config, machine, mut effects)) =
            hosts.get_mut(event.target)
        else {
            continue;
        };

        let machine = machine.into_inner();
        // Мёртвых не замораживаем
        if matches!(
            machine.current_state(),
            Some(StateId::Dying | StateId::Dead)
        ) {
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

        effects.add_effect(
            Effect::freeze(
                "forced_freeze",
                event.duration,
                StateId::Frozen,
                StateId::Walk,
                true,
            ),
            &mut fx,
        );
        params.p1().flush(requests);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::attack::{AttackSpec, AttackTemplate};
    use crate::combat::controller::AttackController;
    use crate::fsm::context::test_support::CtxHarness;
    use crate::fsm::states::State;

    fn full_machine() -> ActorStateMachine {
        let attacks = AttackController::new(vec![AttackTemplate::melee(AttackSpec::default())]);
        ActorStateMachine::new(
            vec![
                State::idle(),
                State::walk(),
                State::attack(),
                State::hit(0.3),
                State::frozen(2.0),
                State::cooldown_frozen(1.0),
                State::dying(0.8),
                State::dead(),
            ],
            attacks,
            StateId::Idle,
        )
    }

    #[test]
    fn test_freeze_apply_and_expire() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();

        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);
        assert_eq!(machine.current_state(), Some(StateId::Idle));

        {
            let mut ctx = harness.ctx();
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            effects.add_effect(
                Effect::freeze("test_freeze", 1.5, StateId::Frozen, StateId::Walk, true),
                &mut fx,
            );
        }

        assert_eq!(machine.current_state(), Some(StateId::Frozen));
        assert!(harness.attack_timer.0 >= 1.5);
        assert_eq!(harness.body.velocity, Vec3::ZERO);

        // Тикаем до истечения: возврат в предыдущее состояние (Idle),
        // общий таймер сброшен, cooldown'ы атак обнулены
        {
            let mut ctx = harness.ctx();
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            for _ in 0..91 {
                effects.tick(&mut fx, 1.0 / 60.0);
            }
        }

        assert_eq!(effects.active_count(), 0);
        assert_eq!(machine.current_state(), Some(StateId::Idle));
        assert!(harness.attack_timer.ready());
    }

    #[test]
    fn test_freeze_outlasts_state_timeout_in_tick_order() {
        // Порядок конвейера: FSM тикает раньше эффектов. Снятие эффекта
        // обязано вернуть прежнее состояние (Walk) напрямую, а не через
        // timeout Frozen→Idle
        let mut harness = CtxHarness::new().with_target_at(Vec3::new(250.0, 0.0, 0.0));
        let mut machine = full_machine();
        let mut effects = EffectController::default();

        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);
        assert_eq!(machine.current_state(), Some(StateId::Walk));

        {
            let mut ctx = harness.ctx();
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            effects.add_effect(
                Effect::freeze("chill", 0.5, StateId::Frozen, StateId::Idle, true),
                &mut fx,
            );
        }
        assert_eq!(machine.current_state(), Some(StateId::Frozen));

        let mut seen = Vec::new();
        for _ in 0..60 {
            let mut ctx = harness.ctx();
            machine.physics_update(&mut ctx, 1.0 / 60.0);
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            effects.tick(&mut fx, 1.0 / 60.0);
            seen.push(machine.current_state());
        }

        assert_eq!(effects.active_count(), 0);
        assert_eq!(machine.current_state(), Some(StateId::Walk));
        assert!(
            !seen.contains(&Some(StateId::Idle)),
            "thaw went through Idle instead of restoring Walk"
        );
    }

    #[test]
    fn test_refresh_restarts_frozen_hold() {
        let mut harness = CtxHarness::new().with_target_at(Vec3::new(250.0, 0.0, 0.0));
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let freeze = || Effect::freeze("chill", 0.4, StateId::Frozen, StateId::Idle, true);
        {
            let mut ctx = harness.ctx();
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            effects.add_effect(freeze(), &mut fx);
        }

        // Повторная заморозка на 20-м тике: суммарное время во Frozen
        // превышает исходный hold, но refresh перезапустил его
        let mut seen = Vec::new();
        for tick in 0..60 {
            let mut ctx = harness.ctx();
            machine.physics_update(&mut ctx, 1.0 / 60.0);
            let mut fx = EffectCtx {
                machine: &mut machine,
                state: &mut ctx,
            };
            if tick == 20 {
                effects.add_effect(freeze(), &mut fx);
            }
            effects.tick(&mut fx, 1.0 / 60.0);
            seen.push(machine.current_state());
        }

        assert_eq!(effects.active_count(), 0);
        assert_eq!(machine.current_state(), Some(StateId::Walk));
        assert!(!seen.contains(&Some(StateId::Idle)));
    }

    #[test]
    fn test_freeze_targeting_cooldown_frozen_after_lag() {
        // После-атаковый лаг: тот же механизм, целевое состояние —
        // CooldownFrozen, возврат всегда в fallback
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };
        effects.add_effect(
            Effect::freeze("after_lag", 0.5, StateId::CooldownFrozen, StateId::Idle, false),
            &mut fx,
        );
        assert_eq!(fx.machine.current_state(), Some(StateId::CooldownFrozen));

        for _ in 0..31 {
            effects.tick(&mut fx, 1.0 / 60.0);
        }
        assert_eq!(effects.active_count(), 0);
        assert_eq!(fx.machine.current_state(), Some(StateId::Idle));
    }

    #[test]
    fn test_same_id_refreshes_instead_of_stacking() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };

        effects.add_effect(
            Effect::freeze("chill", 2.0, StateId::Frozen, StateId::Walk, true).with_max_stacks(3),
            &mut fx,
        );
        effects.tick(&mut fx, 1.0);
        effects.add_effect(
            Effect::freeze("chill", 2.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );

        // Один эффект, stacks 2, elapsed сброшен
        assert_eq!(effects.active_count(), 1);
        assert_eq!(effects.effects[0].stacks, 2);
        assert_eq!(effects.effects[0].elapsed, 0.0);

        // Клампится на max_stacks
        effects.add_effect(
            Effect::freeze("chill", 2.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );
        effects.add_effect(
            Effect::freeze("chill", 2.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );
        assert_eq!(effects.effects[0].stacks, 3);
    }

    #[test]
    fn test_freeze_without_frozen_state_is_discarded() {
        let mut harness = CtxHarness::new();
        let attacks = AttackController::new(vec![]);
        let mut machine =
            ActorStateMachine::new(vec![State::idle(), State::walk()], attacks, StateId::Idle);
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };
        effects.add_effect(
            Effect::freeze("bad", 1.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );

        assert_eq!(effects.active_count(), 0);
        assert_eq!(fx.machine.current_state(), Some(StateId::Idle));
    }

    #[test]
    fn test_freeze_fallback_when_resume_disabled() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);
        assert_eq!(machine.current_state(), Some(StateId::Idle));

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };
        effects.add_effect(
            Effect::freeze("chill", 1.0, StateId::Frozen, StateId::Walk, false),
            &mut fx,
        );
        assert!(effects.remove_by_id("chill", &mut fx));

        // resume отключён → не Idle (предыдущее), а сконфигурированный fallback
        assert_eq!(fx.machine.current_state(), Some(StateId::Walk));
    }

    #[test]
    fn test_freeze_removal_respects_external_transition() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };
        effects.add_effect(
            Effect::freeze("chill", 1.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );

        // Смерть во время заморозки: восстановление не затирает Dying
        fx.machine.change_state(StateId::Dying, fx.state);
        assert!(effects.remove_by_id("chill", &mut fx));
        assert_eq!(fx.machine.current_state(), Some(StateId::Dying));
    }

    #[test]
    fn test_speed_effect_restores_original() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };

        effects.add_effect(Effect::speed("haste", 1.0, 2.0), &mut fx);
        assert_eq!(fx.state.body.speed, 300.0);

        for _ in 0..61 {
            effects.tick(&mut fx, 1.0 / 60.0);
        }
        assert_eq!(fx.state.body.speed, 150.0);
        assert!(!effects.has_effect("haste"));
    }

    #[test]
    fn test_clear_all_removes_everything() {
        let mut harness = CtxHarness::new();
        let mut machine = full_machine();
        let mut effects = EffectController::default();
        machine.physics_update(&mut harness.ctx(), 1.0 / 60.0);

        let mut ctx = harness.ctx();
        let mut fx = EffectCtx {
            machine: &mut machine,
            state: &mut ctx,
        };

        effects.add_effect(Effect::speed("haste", 5.0, 2.0), &mut fx);
        effects.add_effect(
            Effect::freeze("chill", 5.0, StateId::Frozen, StateId::Walk, true),
            &mut fx,
        );
        assert_eq!(effects.active_count(), 2);

        effects.clear_all(&mut fx);
        assert_eq!(effects.active_count(), 0);
        assert_eq!(fx.state.body.speed, 150.0);
    }
}
