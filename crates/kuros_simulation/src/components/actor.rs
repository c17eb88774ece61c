//! Базовые компоненты акторов: Actor, Health, Body, AttackTimer, ActorConfig

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Актор (NPC, игрок, враг) — базовый компонент для живых существ
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct Actor {
    /// Stable ID фракции (акторы одной фракции друг друга не атакуют)
    pub faction_id: u64,
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(50)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = (self.current + amount).min(self.max);
    }
}

/// Кинематическое тело актора: скорость, facing, walk speed.
///
/// Интеграция velocity → Transform выполняется системой движения,
/// состояния и атаки пишут только velocity/facing.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Body {
    /// Текущая скорость (m/s)
    pub velocity: Vec3,
    /// Направление взгляда (normalized)
    pub facing: Vec3,
    /// Базовая walk speed (может быть изменена эффектами)
    pub speed: f32,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            facing: Vec3::X,
            speed: 150.0,
        }
    }
}

impl Body {
    /// Плавное гашение скорости к нулю (не больше `max_delta` за вызов)
    pub fn damp_velocity(&mut self, max_delta: f32) {
        self.velocity = move_toward(self.velocity, Vec3::ZERO, max_delta);
    }

    /// Повернуться в сторону направления (no-op для нулевого вектора)
    pub fn face_toward(&mut self, direction: Vec3) {
        if direction.length_squared() > f32::EPSILON {
            self.facing = direction.normalize();
        }
    }
}

/// Смещает вектор к target не более чем на max_delta
pub fn move_toward(from: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let to = target - from;
    let distance = to.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        target
    } else {
        from + to / distance * max_delta
    }
}

/// Общий меж-шаблонный cooldown актора.
///
/// Пока таймер > 0 ни один шаблон атаки не может стартовать —
/// это единственная точка, гарантирующая "одна атака на актора".
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct AttackTimer(pub f32);

impl AttackTimer {
    /// Готов ли актор к следующей атаке
    pub fn ready(&self) -> bool {
        self.0 <= 0.0
    }

    /// Поднять таймер минимум до `secs` (никогда не уменьшает)
    pub fn raise_to(&mut self, secs: f32) {
        self.0 = self.0.max(secs);
    }

    pub fn clear(&mut self) {
        self.0 = 0.0;
    }

    pub fn tick(&mut self, delta: f32) {
        if self.0 > 0.0 {
            self.0 = (self.0 - delta).max(0.0);
        }
    }
}

/// Параметры актора (detection/attack ranges)
#[derive(Component, Debug, Clone, Copy, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct ActorConfig {
    /// Радиус обнаружения цели (world units)
    pub detection_range: f32,
    /// Радиус атаки — fallback overlap-проверка по дистанции
    pub attack_range: f32,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            detection_range: 300.0,
            attack_range: 80.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage() {
        let mut health = Health::new(50);
        assert_eq!(health.current, 50);

        health.take_damage(30);
        assert_eq!(health.current, 20);
        assert!(health.is_alive());

        health.take_damage(100); // Saturating sub
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_heal_clamped() {
        let mut health = Health::new(50);
        health.take_damage(40);
        health.heal(20);
        assert_eq!(health.current, 30);

        health.heal(100);
        assert_eq!(health.current, 50);
    }

    #[test]
    fn test_attack_timer_raise_never_lowers() {
        let mut timer = AttackTimer::default();
        assert!(timer.ready());

        timer.raise_to(2.0);
        timer.raise_to(0.5); // Не уменьшает
        assert_eq!(timer.0, 2.0);
        assert!(!timer.ready());

        timer.tick(1.5);
        assert_eq!(timer.0, 0.5);
        timer.tick(1.0); // Clamp до нуля
        assert!(timer.ready());
    }

    #[test]
    fn test_body_damp_velocity() {
        let mut body = Body {
            velocity: Vec3::new(10.0, 0.0, 0.0),
            ..default()
        };

        body.damp_velocity(4.0);
        assert!((body.velocity.x - 6.0).abs() < 1e-5);

        body.damp_velocity(100.0); // Гасит полностью
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_body_face_toward_ignores_zero() {
        let mut body = Body::default();
        body.face_toward(Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(body.facing, Vec3::NEG_Z);

        body.face_toward(Vec3::ZERO); // No-op
        assert_eq!(body.facing, Vec3::NEG_Z);
    }
}
