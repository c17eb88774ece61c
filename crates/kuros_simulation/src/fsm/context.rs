//! Контекст тика актора.
//!
//! Состояния и шаблоны атак — plain-структуры с методами; весь доступ
//! к полям актора и миру идёт через `StateCtx`, который система собирает
//! из ECS query на каждый тик. Так ядро тестируется без `App`.

use bevy::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::components::{ActorConfig, AttackTimer, Body, InputSnapshot};
use crate::fsm::machine::StateId;

/// Снапшот цели (ближайший живой враг другой фракции)
#[derive(Debug, Clone, Copy)]
pub struct TargetView {
    pub entity: Entity,
    pub position: Vec3,
}

/// Исходящие запросы тика: ядро не мутирует чужие entity напрямую,
/// а буферизует запросы, которые система конвертирует в Bevy events.
#[derive(Debug, Clone)]
pub enum CombatRequest {
    /// Удар по цели (overlap уже проверен на стороне атаки)
    Strike {
        attacker: Entity,
        target: Entity,
        damage: u32,
    },
    /// Заморозить цель (freeze-on-hit атака)
    FreezeTarget { target: Entity, duration: f32 },
    /// Исход escape-последовательности
    EscapeResolved {
        attacker: Entity,
        target: Entity,
        escaped: bool,
    },
    /// Смена состояния (для анимации/рендера)
    StateChanged {
        entity: Entity,
        from: Option<StateId>,
        to: StateId,
    },
    /// Актор завершён (Dead) — убрать из симуляции
    Finalize { entity: Entity },
}

/// Мутабельный доступ к полям актора + read-only вид на мир
pub struct StateCtx<'a> {
    pub entity: Entity,
    pub position: Vec3,
    pub body: &'a mut Body,
    pub attack_timer: &'a mut AttackTimer,
    pub config: &'a ActorConfig,
    pub target: Option<TargetView>,
    pub input: &'a InputSnapshot,
    pub rng: &'a mut ChaCha8Rng,
    pub requests: &'a mut Vec<CombatRequest>,
}

impl<'a> StateCtx<'a> {
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    pub fn distance_to_target(&self) -> Option<f32> {
        self.target.map(|t| self.position.distance(t.position))
    }

    /// Цель в радиусе обнаружения (+ бонус шаблона атаки)?
    pub fn target_within_detection(&self, extra_margin: f32) -> bool {
        match self.distance_to_target() {
            Some(distance) => distance <= self.config.detection_range + extra_margin,
            None => false,
        }
    }

    /// Overlap-проверка "регион атаки пересекает цель" (fallback по дистанции)
    pub fn target_in_attack_range(&self) -> bool {
        match self.distance_to_target() {
            Some(distance) => distance <= self.config.attack_range,
            None => false,
        }
    }

    /// Нормализованное направление к цели (ZERO если цели нет или она в нас)
    pub fn direction_to_target(&self) -> Vec3 {
        let Some(target) = self.target else {
            return Vec3::ZERO;
        };
        let to_target = target.position - self.position;
        if to_target.length_squared() <= f32::EPSILON {
            Vec3::ZERO
        } else {
            to_target.normalize()
        }
    }

    /// Угол между facing и направлением к цели (градусы, [0, 180])
    pub fn angle_to_target_deg(&self) -> Option<f32> {
        let direction = self.direction_to_target();
        if direction == Vec3::ZERO {
            return None;
        }
        Some(self.body.facing.angle_between(direction).to_degrees())
    }
}
