//! Состояния актора: поведение каждого StateId.
//!
//! Состояние — plain-структура с enter/physics_update/exit; переход
//! возвращается как `Option<StateId>` и применяется машиной синхронно.
//! Доступ к контроллеру атак передаётся параметром: им пользуются
//! Walk (гейтинг перехода в Attack) и Attack (прокачка фаз).

use bevy::prelude::*;

use crate::combat::controller::AttackController;
use crate::fsm::context::{CombatRequest, StateCtx};
use crate::fsm::machine::StateId;

/// Вариант поведения состояния + его параметры
#[derive(Debug, Clone)]
pub enum StateKind {
    /// Стоим на месте, ждём цель в detection range
    Idle,
    /// Преследование цели; отсюда стартуют атаки
    Walk,
    /// Атака бежит через AttackController
    Attack,
    /// Hit stun после полученного урона
    Hit { stun_duration: f32 },
    /// Принудительная заморозка (эффект или freeze-on-hit атака)
    Frozen { duration: f32 },
    /// Пост-заморозочный cooldown (визуальное "оттаивание")
    CooldownFrozen { duration: f32 },
    /// Анимация смерти перед финализацией
    Dying {
        death_duration: f32,
        freeze_motion: bool,
    },
    /// Терминальное состояние: запрос на удаление из симуляции
    Dead,
}

#[derive(Debug, Clone)]
pub struct State {
    pub id: StateId,
    kind: StateKind,
    timer: f32,
}

impl State {
    pub fn new(id: StateId, kind: StateKind) -> Self {
        Self {
            id,
            kind,
            timer: 0.0,
        }
    }

    pub fn idle() -> Self {
        Self::new(StateId::Idle, StateKind::Idle)
    }

    pub fn walk() -> Self {
        Self::new(StateId::Walk, StateKind::Walk)
    }

    pub fn attack() -> Self {
        Self::new(StateId::Attack, StateKind::Attack)
    }

    pub fn hit(stun_duration: f32) -> Self {
        Self::new(StateId::Hit, StateKind::Hit { stun_duration })
    }

    pub fn frozen(duration: f32) -> Self {
        Self::new(StateId::Frozen, StateKind::Frozen { duration })
    }

    pub fn cooldown_frozen(duration: f32) -> Self {
        Self::new(
            StateId::CooldownFrozen,
            StateKind::CooldownFrozen { duration },
        )
    }

    pub fn dying(death_duration: f32) -> Self {
        Self::new(
            StateId::Dying,
            StateKind::Dying {
                death_duration,
                freeze_motion: true,
            },
        )
    }

    pub fn dead() -> Self {
        Self::new(StateId::Dead, StateKind::Dead)
    }

    /// Перенастроить длительность удержания (hit stun, заморозки, смерти).
    /// Возвращает false для состояний без таймера.
    pub fn set_hold_duration(&mut self, secs: f32) -> bool {
        match &mut self.kind {
            StateKind::Hit { stun_duration } => {
                *stun_duration = secs;
                true
            }
            StateKind::Frozen { duration } | StateKind::CooldownFrozen { duration } => {
                *duration = secs;
                true
            }
            StateKind::Dying { death_duration, .. } => {
                *death_duration = secs;
                true
            }
            _ => false,
        }
    }

    pub fn enter(&mut self, ctx: &mut StateCtx, attacks: &mut AttackController) {
        self.timer = 0.0;
        match &self.kind {
            StateKind::Dead => {
                ctx.body.velocity = Vec3::ZERO;
                ctx.requests.push(CombatRequest::Finalize { entity: ctx.entity });
            }
            StateKind::Idle | StateKind::Hit { .. } => {
                ctx.body.velocity = Vec3::ZERO;
            }
            StateKind::Frozen { .. } | StateKind::CooldownFrozen { .. } => {
                ctx.body.velocity = Vec3::ZERO;
            }
            StateKind::Dying { freeze_motion, .. } => {
                if *freeze_motion {
                    ctx.body.velocity = Vec3::ZERO;
                }
                // Умирающий уже никого не атакует
                ctx.attack_timer.clear();
            }
            StateKind::Attack => {
                // Может не стартовать (угол/range ушли за тик) —
                // physics_update вернёт нас в Walk
                attacks.try_start(ctx);
            }
            StateKind::Walk => {}
        }
    }

    pub fn exit(&mut self, ctx: &mut StateCtx, attacks: &mut AttackController) {
        if let StateKind::Attack = self.kind {
            // Прерывание извне (hit, заморозка, смерть) обнуляет cooldown'ы:
            // прерванная атака не считается совершённой
            attacks.cancel_active(true, ctx);
        }
    }

    pub fn physics_update(
        &mut self,
        ctx: &mut StateCtx,
        attacks: &mut AttackController,
        delta: f32,
    ) -> Option<StateId> {
        self.timer += delta;

        match &self.kind {
            StateKind::Idle => {
                if attacks.can_start_any(ctx) {
                    return Some(StateId::Attack);
                }
                if ctx.target_within_detection(0.0) {
                    return Some(StateId::Walk);
                }
                // Остаточная скорость гасится плавно
                let damp = ctx.body.speed * delta;
                ctx.body.damp_velocity(damp);
                None
            }

            StateKind::Walk => {
                if !ctx.target_within_detection(0.0) {
                    return Some(StateId::Idle);
                }
                if attacks.can_start_any(ctx) {
                    return Some(StateId::Attack);
                }

                let direction = ctx.direction_to_target();
                ctx.body.face_toward(direction);
                let speed = ctx.body.speed;
                ctx.body.velocity = direction * speed;
                None
            }

            StateKind::Attack => {
                if attacks.tick(ctx, delta) {
                    return None;
                }
                // Атака завершилась — цепляем следующую или уходим
                if attacks.try_start(ctx) {
                    return None;
                }
                if ctx.target_within_detection(0.0) {
                    Some(StateId::Walk)
                } else {
                    Some(StateId::Idle)
                }
            }

            StateKind::Hit { stun_duration } => {
                if self.timer >= *stun_duration {
                    return Some(recover_target(ctx));
                }
                None
            }

            StateKind::Frozen { duration } | StateKind::CooldownFrozen { duration } => {
                // Обычно выход форсирует эффект; таймер — подстраховка
                if self.timer >= *duration {
                    return Some(StateId::Idle);
                }
                None
            }

            StateKind::Dying { death_duration, .. } => {
                if self.timer >= *death_duration {
                    return Some(StateId::Dead);
                }
                None
            }

            StateKind::Dead => None,
        }
    }
}

/// Куда возвращаться после stun/заморозки
fn recover_target(ctx: &StateCtx) -> StateId {
    if ctx.target_within_detection(0.0) {
        StateId::Walk
    } else {
        StateId::Idle
    }
}
