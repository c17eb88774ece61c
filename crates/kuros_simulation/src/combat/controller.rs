//! Контроллер атак: владеет набором AttackTemplate, выбирает следующую
//! атаку и прокачивает активную по фазам.
//!
//! Инвариант: активен максимум один шаблон; все cooldown'ы тикают
//! каждый тик независимо от того, какой шаблон бежит.

use std::collections::HashMap;

use rand::Rng;

use crate::combat::attack::AttackTemplate;
use crate::fsm::context::StateCtx;
use crate::logger;

/// Политика выбора из нескольких стартуемых шаблонов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Первый стартуемый в порядке конфигурации
    #[default]
    FirstEligible,
    /// Взвешенный случайный выбор (вес по умолчанию 1.0)
    Weighted,
}

#[derive(Debug, Clone)]
pub struct AttackController {
    templates: Vec<AttackTemplate>,
    weights: HashMap<String, f32>,
    active: Option<usize>,
    policy: SelectionPolicy,
}

impl AttackController {
    pub fn new(templates: Vec<AttackTemplate>) -> Self {
        Self {
            templates,
            weights: HashMap::new(),
            active: None,
            policy: SelectionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Имя активной атаки (для анимации)
    pub fn current_attack_name(&self) -> Option<&str> {
        self.active.map(|i| self.templates[i].name())
    }

    pub fn templates(&self) -> &[AttackTemplate] {
        &self.templates
    }

    /// Вес шаблона для Weighted-политики. Неизвестное имя — warning, no-op.
    pub fn set_attack_weight(&mut self, name: &str, weight: f32) {
        if !self.templates.iter().any(|t| t.name() == name) {
            logger::log_warning(&format!(
                "set_attack_weight: unknown attack '{name}', ignored"
            ));
            return;
        }
        self.weights.insert(name.to_string(), weight.max(0.0));
    }

    /// Сброс всех cooldown'ов шаблонов — актор готов атаковать немедленно
    pub fn force_queue_next_attack(&mut self, reason: &str) {
        for template in &mut self.templates {
            template.clear_cooldown();
        }
        logger::log(&format!("⚔️ Attack cooldowns cleared ({reason})"));
    }

    /// Есть ли хоть один стартуемый шаблон (гейтинг перехода в Attack)
    pub fn can_start_any(&self, ctx: &StateCtx) -> bool {
        !self.is_busy() && self.templates.iter().any(|t| t.can_start(ctx))
    }

    /// Попытка старта по политике выбора. Возвращает true если атака пошла.
    pub fn try_start(&mut self, ctx: &mut StateCtx) -> bool {
        if self.active.is_some() {
            return false;
        }

        let eligible: Vec<usize> = (0..self.templates.len())
            .filter(|&i| self.templates[i].can_start(ctx))
            .collect();
        if eligible.is_empty() {
            return false;
        }

        let chosen = match self.policy {
            SelectionPolicy::FirstEligible => eligible[0],
            SelectionPolicy::Weighted => self.pick_weighted(&eligible, ctx),
        };

        if self.templates[chosen].try_start(ctx) {
            self.active = Some(chosen);
            true
        } else {
            false
        }
    }

    fn pick_weighted(&self, eligible: &[usize], ctx: &mut StateCtx) -> usize {
        let weights: Vec<f32> = eligible
            .iter()
            .map(|&i| {
                self.weights
                    .get(self.templates[i].name())
                    .copied()
                    .unwrap_or(1.0)
            })
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return eligible[0];
        }

        let mut roll = ctx.rng.gen_range(0.0..total);
        for (slot, &index) in eligible.iter().enumerate() {
            if roll < weights[slot] {
                return index;
            }
            roll -= weights[slot];
        }
        eligible[eligible.len() - 1]
    }

    /// Тик контроллера: cooldown'ы всех шаблонов + фазы активного.
    /// Возвращает true пока активная атака ещё бежит.
    pub fn tick(&mut self, ctx: &mut StateCtx, delta: f32) -> bool {
        for (index, template) in self.templates.iter_mut().enumerate() {
            if Some(index) == self.active {
                template.tick(ctx, delta);
            } else {
                template.tick_cooldown(delta);
            }
        }

        if let Some(index) = self.active {
            if !self.templates[index].is_running() {
                self.active = None;
            }
        }

        self.active.is_some()
    }

    /// Прерывание активной атаки (смена состояния, заморозка, смерть)
    pub fn cancel_active(&mut self, clear_cooldown: bool, ctx: &mut StateCtx) {
        if let Some(index) = self.active.take() {
            self.templates[index].cancel(clear_cooldown, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::attack::{AttackPhase, AttackSpec};
    use crate::fsm::context::test_support::CtxHarness;
    use crate::fsm::context::CombatRequest;
    use bevy::prelude::*;

    fn melee(name: &str, cooldown: f32) -> AttackTemplate {
        AttackTemplate::melee(AttackSpec {
            name: name.to_string(),
            cooldown_duration: cooldown,
            ..default()
        })
    }

    fn in_range_harness() -> CtxHarness {
        CtxHarness::new().with_target_at(Vec3::new(50.0, 0.0, 0.0))
    }

    #[test]
    fn test_first_eligible_order() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 1.0), melee("hook", 1.0)]);

        assert!(controller.try_start(&mut harness.ctx()));
        assert_eq!(controller.current_attack_name(), Some("jab"));
    }

    #[test]
    fn test_single_active_attack() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 1.0), melee("hook", 1.0)]);

        assert!(controller.try_start(&mut harness.ctx()));
        // Вторая атака не стартует пока первая бежит
        assert!(!controller.try_start(&mut harness.ctx()));
        assert!(controller.is_busy());
    }

    #[test]
    fn test_attack_runs_to_completion() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 1.0)]);

        assert!(controller.try_start(&mut harness.ctx()));

        // Warmup 0.2 + Active 0.15 + Recovery 0.35 = 0.7s
        let mut busy_ticks = 0;
        while controller.tick(&mut harness.ctx(), 0.05) {
            busy_ticks += 1;
            assert!(busy_ticks < 100, "attack never finished");
        }

        assert!(!controller.is_busy());
        assert_eq!(controller.current_attack_name(), None);
        let strikes = harness
            .requests
            .iter()
            .filter(|r| matches!(r, CombatRequest::Strike { .. }))
            .count();
        assert_eq!(strikes, 1);
    }

    #[test]
    fn test_cooldowns_tick_for_inactive_templates() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 0.4), melee("hook", 0.4)]);

        assert!(controller.try_start(&mut harness.ctx()));
        // jab взвёл и свой cooldown, и общий AttackTimer: hook тоже заперт
        assert_eq!(controller.current_attack_name(), Some("jab"));

        for _ in 0..40 {
            controller.tick(&mut harness.ctx(), 0.05);
            harness.attack_timer.tick(0.05);
        }

        // Оба cooldown'а (0.4s) истекли за 2s, включая неактивный hook
        assert!(controller.templates()[0].can_start(&harness.ctx()));
        assert!(controller.templates()[1].can_start(&harness.ctx()));
    }

    #[test]
    fn test_force_queue_clears_cooldowns() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 5.0)]);

        assert!(controller.try_start(&mut harness.ctx()));
        for _ in 0..20 {
            controller.tick(&mut harness.ctx(), 0.05);
        }
        assert!(!controller.is_busy());
        assert!(controller.templates()[0].is_on_cooldown());

        controller.force_queue_next_attack("test");
        harness.attack_timer.clear();
        assert!(controller.try_start(&mut harness.ctx()));
    }

    #[test]
    fn test_unknown_weight_is_noop() {
        let mut controller = AttackController::new(vec![melee("jab", 1.0)]);
        controller.set_attack_weight("uppercut", 3.0);
        assert!(controller.weights.is_empty());
    }

    #[test]
    fn test_weighted_policy_picks_eligible() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 1.0), melee("hook", 1.0)])
            .with_policy(SelectionPolicy::Weighted);
        controller.set_attack_weight("jab", 0.0);
        controller.set_attack_weight("hook", 10.0);

        assert!(controller.try_start(&mut harness.ctx()));
        assert_eq!(controller.current_attack_name(), Some("hook"));
    }

    #[test]
    fn test_cancel_active_resets_phase() {
        let mut harness = in_range_harness();
        let mut controller = AttackController::new(vec![melee("jab", 1.0)]);

        assert!(controller.try_start(&mut harness.ctx()));
        controller.cancel_active(true, &mut harness.ctx());

        assert!(!controller.is_busy());
        assert_eq!(controller.templates()[0].phase(), AttackPhase::Idle);
        assert!(!controller.templates()[0].is_on_cooldown());
    }
}
