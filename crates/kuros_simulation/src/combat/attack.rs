//! Шаблоны атак: phase state machine (Warmup → Active → Recovery).
//!
//! # Attack Flow
//!
//! ```text
//! AttackController.try_start → CanStart gating (cooldowns, range, angle)
//!   ↓
//! Idle → Warmup (velocity zeroed, telegraph)
//!   ↓ phase timer
//! Active (вариант наносит удар: single strike / combo / escape / freeze)
//!   ↓ phase timer (или форс-переход варианта)
//! Recovery (decelerate, vulnerable)
//!   ↓ phase timer
//! Idle (finished, cooldown тикает дальше)
//! ```
//!
//! Фаза с duration ≤ 0 проскакивается немедленно в том же вызове — цикл
//! из четырёх фаз ограничен, бесконечной рекурсии нет. Перешагивание
//! таймера через границу фазы остаток в следующую фазу не переносит.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::InputAction;
use crate::fsm::context::{CombatRequest, StateCtx};
use crate::logger;

/// Фазы атаки (строгий цикл, пропуск только через Cancel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    /// Не атакуем
    Idle,
    /// Замах (telegraph, враг может среагировать)
    Warmup,
    /// Нанесение урона
    Active,
    /// Восстановление (уязвимость)
    Recovery,
}

/// Тайминги и гейтинг одного шаблона атаки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackSpec {
    /// Имя атаки (для анимации и weight-таблиц)
    pub name: String,
    pub warmup_duration: f32,
    pub active_duration: f32,
    pub recovery_duration: f32,
    /// Собственный cooldown шаблона (секунды)
    pub cooldown_duration: f32,
    /// Бонус к detection range при проверке старта
    pub detection_range_bonus: f32,
    /// Максимальный угол между facing и направлением на цель (градусы, 0–180)
    pub max_angle_to_target_deg: f32,
    pub damage: u32,
}

impl Default for AttackSpec {
    fn default() -> Self {
        Self {
            name: "DefaultAttack".to_string(),
            warmup_duration: 0.2,
            active_duration: 0.15,
            recovery_duration: 0.35,
            cooldown_duration: 1.0,
            detection_range_bonus: 0.0,
            max_angle_to_target_deg: 135.0,
            damage: 10,
        }
    }
}

/// Вариант атаки: общий phase-контракт, разная Active-семантика
#[derive(Debug, Clone)]
pub enum AttackKind {
    /// Одиночный удар по overlap-проверке
    Melee,
    /// Серия ударов с фиксированным интервалом; Active не ограничена
    /// таймером, завершается по числу ударов
    MultiStrike {
        strike_count: u32,
        strike_interval: f32,
        // runtime
        strikes_done: u32,
        strike_timer: f32,
        combo_active: bool,
    },
    /// Захват: цель должна в escape-окне набрать нажатия на двух
    /// противоположных осях; исход уходит через EscapeResolved
    ChargeEscape {
        required_left: u32,
        required_right: u32,
        escape_window: f32,
        // runtime
        left_count: u32,
        right_count: u32,
        escape_timer: f32,
        resolved: bool,
    },
    /// Удар + принудительная заморозка цели при попадании
    FreezeMelee { freeze_duration: f32 },
}

/// Шаблон атаки: один экземпляр на сконфигурированный вариант,
/// создаётся при сборке актора и переиспользуется
#[derive(Debug, Clone)]
pub struct AttackTemplate {
    spec: AttackSpec,
    kind: AttackKind,
    phase: AttackPhase,
    phase_timer: f32,
    cooldown_timer: f32,
}

impl AttackTemplate {
    pub fn new(spec: AttackSpec, kind: AttackKind) -> Self {
        Self {
            spec,
            kind,
            phase: AttackPhase::Idle,
            phase_timer: 0.0,
            cooldown_timer: 0.0,
        }
    }

    pub fn melee(spec: AttackSpec) -> Self {
        Self::new(spec, AttackKind::Melee)
    }

    pub fn multi_strike(spec: AttackSpec, strike_count: u32, strike_interval: f32) -> Self {
        Self::new(
            spec,
            AttackKind::MultiStrike {
                strike_count,
                strike_interval,
                strikes_done: 0,
                strike_timer: 0.0,
                combo_active: false,
            },
        )
    }

    pub fn charge_escape(
        spec: AttackSpec,
        required_left: u32,
        required_right: u32,
        escape_window: f32,
    ) -> Self {
        Self::new(
            spec,
            AttackKind::ChargeEscape {
                required_left,
                required_right,
                escape_window,
                left_count: 0,
                right_count: 0,
                escape_timer: 0.0,
                resolved: false,
            },
        )
    }

    pub fn freeze_melee(spec: AttackSpec, freeze_duration: f32) -> Self {
        Self::new(spec, AttackKind::FreezeMelee { freeze_duration })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &AttackSpec {
        &self.spec
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != AttackPhase::Idle
    }

    pub fn is_on_cooldown(&self) -> bool {
        self.cooldown_timer > 0.0
    }

    pub fn clear_cooldown(&mut self) {
        self.cooldown_timer = 0.0;
    }

    /// Гейтинг старта: не бежит, не на cooldown'ах, цель обнаружена,
    /// угол до цели в допуске, вариант-специфичная overlap-проверка
    pub fn can_start(&self, ctx: &StateCtx) -> bool {
        if self.is_running() || self.is_on_cooldown() {
            return false;
        }
        if !ctx.attack_timer.ready() {
            return false;
        }
        if !ctx.target_within_detection(self.spec.detection_range_bonus) {
            return false;
        }
        let Some(angle) = ctx.angle_to_target_deg() else {
            return false;
        };
        if angle > self.spec.max_angle_to_target_deg {
            return false;
        }

        match self.kind {
            // Контактные варианты требуют overlap прямо сейчас
            AttackKind::Melee | AttackKind::FreezeMelee { .. } => ctx.target_in_attack_range(),
            AttackKind::MultiStrike { .. } | AttackKind::ChargeEscape { .. } => true,
        }
    }

    /// Успешный старт немедленно взводит оба cooldown'а: собственный
    /// и общий AttackTimer актора (одна атака на актора)
    pub fn try_start(&mut self, ctx: &mut StateCtx) -> bool {
        if !self.can_start(ctx) {
            return false;
        }

        self.cooldown_timer = self.spec.cooldown_duration;
        ctx.attack_timer.raise_to(self.spec.cooldown_duration);

        self.reset_runtime();
        logger::log(&format!(
            "⚔️ Attack started: {} (entity: {:?})",
            self.spec.name, ctx.entity
        ));
        self.set_phase(AttackPhase::Warmup, ctx);
        true
    }

    /// Тик только cooldown'а (для неактивных шаблонов в контроллере)
    pub fn tick_cooldown(&mut self, delta: f32) {
        if self.cooldown_timer > 0.0 {
            self.cooldown_timer -= delta;
        }
    }

    /// Тик: cooldown уменьшается всегда, фазы — только пока атака бежит
    pub fn tick(&mut self, ctx: &mut StateCtx, delta: f32) {
        self.tick_cooldown(delta);

        if self.phase == AttackPhase::Idle {
            return;
        }

        self.step_variant(ctx, delta);

        if self.phase == AttackPhase::Idle {
            return;
        }

        self.phase_timer -= delta;
        if self.phase_timer <= 0.0 {
            self.advance_phase(ctx);
        }
    }

    /// Принудительный возврат в Idle (прерывание извне)
    pub fn cancel(&mut self, clear_cooldown: bool, ctx: &mut StateCtx) {
        if clear_cooldown {
            self.cooldown_timer = 0.0;
            ctx.attack_timer.clear();
        }

        if self.phase != AttackPhase::Idle {
            self.set_phase(AttackPhase::Idle, ctx);
        }
    }

    fn reset_runtime(&mut self) {
        match &mut self.kind {
            AttackKind::MultiStrike {
                strikes_done,
                strike_timer,
                combo_active,
                ..
            } => {
                *strikes_done = 0;
                *strike_timer = 0.0;
                *combo_active = false;
            }
            AttackKind::ChargeEscape {
                left_count,
                right_count,
                escape_timer,
                resolved,
                ..
            } => {
                *left_count = 0;
                *right_count = 0;
                *escape_timer = 0.0;
                *resolved = false;
            }
            AttackKind::Melee | AttackKind::FreezeMelee { .. } => {}
        }
    }

    /// Active длительность: MultiStrike держит фазу открытой до выполнения
    /// серии, ChargeEscape — на длину escape-окна
    fn effective_active_duration(&self) -> f32 {
        match self.kind {
            AttackKind::MultiStrike { .. } => f32::INFINITY,
            AttackKind::ChargeEscape { escape_window, .. } => escape_window.max(0.01),
            _ => self.spec.active_duration,
        }
    }

    fn set_phase(&mut self, phase: AttackPhase, ctx: &mut StateCtx) {
        self.phase = phase;
        match phase {
            AttackPhase::Warmup => {
                self.phase_timer = self.spec.warmup_duration;
                ctx.body.velocity = Vec3::ZERO;
            }
            AttackPhase::Active => {
                self.phase_timer = self.effective_active_duration();
                self.on_active_phase(ctx);
            }
            AttackPhase::Recovery => {
                self.phase_timer = self.spec.recovery_duration;
                self.on_recovery_started(ctx);
            }
            AttackPhase::Idle => {
                self.phase_timer = 0.0;
            }
        }

        // Нулевые/отрицательные длительности проскакиваем сразу
        if self.phase != AttackPhase::Idle && self.phase_timer <= 0.0 {
            self.advance_phase(ctx);
        }
    }

    fn advance_phase(&mut self, ctx: &mut StateCtx) {
        match self.phase {
            AttackPhase::Warmup => self.set_phase(AttackPhase::Active, ctx),
            AttackPhase::Active => self.set_phase(AttackPhase::Recovery, ctx),
            AttackPhase::Recovery => self.set_phase(AttackPhase::Idle, ctx),
            AttackPhase::Idle => {}
        }
    }

    fn force_enter_recovery(&mut self, ctx: &mut StateCtx) {
        if self.phase == AttackPhase::Active {
            self.set_phase(AttackPhase::Recovery, ctx);
        }
    }

    fn on_active_phase(&mut self, ctx: &mut StateCtx) {
        match &mut self.kind {
            AttackKind::Melee => {
                strike_target(&self.spec, ctx);
            }
            AttackKind::FreezeMelee { freeze_duration } => {
                let duration = *freeze_duration;
                if strike_target(&self.spec, ctx) {
                    if let Some(target) = ctx.target {
                        ctx.requests.push(CombatRequest::FreezeTarget {
                            target: target.entity,
                            duration,
                        });
                        logger::log(&format!(
                            "❄️ {} freezes target {:?} for {:.2}s",
                            self.spec.name, target.entity, duration
                        ));
                    }
                }
            }
            AttackKind::MultiStrike {
                strike_timer,
                combo_active,
                ..
            } => {
                *combo_active = true;
                *strike_timer = 0.0;
            }
            AttackKind::ChargeEscape {
                escape_window,
                left_count,
                right_count,
                escape_timer,
                resolved,
                ..
            } => {
                *left_count = 0;
                *right_count = 0;
                *escape_timer = *escape_window;
                *resolved = false;
            }
        }
    }

    fn on_recovery_started(&mut self, ctx: &mut StateCtx) {
        let speed = ctx.body.speed;
        ctx.body.damp_velocity(speed);

        if let AttackKind::MultiStrike { combo_active, .. } = &mut self.kind {
            *combo_active = false;
        }
    }

    /// Пошаговая логика вариантов, живущая поверх фазового таймера.
    /// Форс-переход в Recovery применяется после матча, когда займ kind отпущен.
    fn step_variant(&mut self, ctx: &mut StateCtx, delta: f32) {
        let phase = self.phase;
        let spec = &self.spec;

        let force_recovery = match &mut self.kind {
            AttackKind::MultiStrike {
                strike_count,
                strike_interval,
                strikes_done,
                strike_timer,
                combo_active,
            } => {
                if !*combo_active {
                    false
                } else {
                    *strike_timer -= delta;
                    let mut finished = false;
                    while *combo_active && *strike_timer <= 0.0 {
                        strike_target(spec, ctx);
                        *strikes_done += 1;

                        if *strikes_done >= *strike_count {
                            *combo_active = false;
                            finished = true;
                        } else {
                            *strike_timer += *strike_interval;
                        }
                    }
                    finished
                }
            }

            AttackKind::ChargeEscape {
                required_left,
                required_right,
                left_count,
                right_count,
                escape_timer,
                resolved,
                ..
            } => {
                if phase != AttackPhase::Active || *resolved {
                    false
                } else {
                    *escape_timer -= delta;

                    if ctx.input.just_pressed(InputAction::MoveLeft) {
                        *left_count += 1;
                    }
                    if ctx.input.just_pressed(InputAction::MoveRight) {
                        *right_count += 1;
                    }

                    let mut outcome = None;
                    if *left_count >= *required_left && *right_count >= *required_right {
                        *resolved = true;
                        outcome = Some(true);
                    } else if *escape_timer <= 0.0 {
                        *resolved = true;
                        outcome = Some(false);
                    }

                    match outcome {
                        Some(escaped) => {
                            if let Some(target) = ctx.target {
                                ctx.requests.push(CombatRequest::EscapeResolved {
                                    attacker: ctx.entity,
                                    target: target.entity,
                                    escaped,
                                });
                                logger::log_info(&format!(
                                    "{} escape sequence resolved: escaped={} (target: {:?})",
                                    spec.name, escaped, target.entity
                                ));
                            }
                            if !escaped {
                                // Захват удался — удар проходит
                                strike_target(spec, ctx);
                            }
                            true
                        }
                        None => false,
                    }
                }
            }

            AttackKind::Melee | AttackKind::FreezeMelee { .. } => false,
        };

        if force_recovery {
            self.force_enter_recovery(ctx);
        }
    }
}

/// Удар по цели: overlap-проверка, затем Strike-запрос.
/// Возвращает true если удар прошёл.
fn strike_target(spec: &AttackSpec, ctx: &mut StateCtx) -> bool {
    let Some(target) = ctx.target else {
        return false;
    };
    if !ctx.target_in_attack_range() {
        return false;
    }

    ctx.requests.push(CombatRequest::Strike {
        attacker: ctx.entity,
        target: target.entity,
        damage: spec.damage,
    });
    true
}

/// Событие: заморозить цель (freeze-on-hit атака попала)
#[derive(Event, Debug, Clone)]
pub struct FreezeRequested {
    pub target: Entity,
    pub duration: f32,
}

/// Событие: исход escape-последовательности захвата
#[derive(Event, Debug, Clone)]
pub struct EscapeResolved {
    pub attacker: Entity,
    pub target: Entity,
    pub escaped: bool,
}
