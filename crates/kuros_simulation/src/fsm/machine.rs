//! FSM актора: владеет состояниями и контроллером атак, применяет
//! переходы синхронно (Exit старого полностью до Enter нового).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::controller::AttackController;
use crate::fsm::context::{CombatRequest, StateCtx};
use crate::fsm::states::State;
use crate::logger;

/// Идентификатор состояния актора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    Idle,
    Walk,
    Attack,
    Hit,
    Frozen,
    CooldownFrozen,
    Dying,
    Dead,
}

impl StateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateId::Idle => "Idle",
            StateId::Walk => "Walk",
            StateId::Attack => "Attack",
            StateId::Hit => "Hit",
            StateId::Frozen => "Frozen",
            StateId::CooldownFrozen => "CooldownFrozen",
            StateId::Dying => "Dying",
            StateId::Dead => "Dead",
        }
    }
}

#[derive(Component, Debug, Clone)]
pub struct ActorStateMachine {
    states: Vec<State>,
    attacks: AttackController,
    current: Option<usize>,
    initial: StateId,
}

impl ActorStateMachine {
    /// Дубликаты id отбрасываются с warning'ом (первый выигрывает)
    pub fn new(states: Vec<State>, attacks: AttackController, initial: StateId) -> Self {
        let mut deduped: Vec<State> = Vec::with_capacity(states.len());
        for state in states {
            if deduped.iter().any(|s| s.id == state.id) {
                logger::log_warning(&format!(
                    "duplicate state {} ignored",
                    state.id.as_str()
                ));
                continue;
            }
            deduped.push(state);
        }

        Self {
            states: deduped,
            attacks,
            current: None,
            initial,
        }
    }

    pub fn has_state(&self, id: StateId) -> bool {
        self.state_index(id).is_some()
    }

    fn state_index(&self, id: StateId) -> Option<usize> {
        self.states.iter().position(|s| s.id == id)
    }

    pub fn current_state(&self) -> Option<StateId> {
        self.current.map(|i| self.states[i].id)
    }

    /// Имя текущего состояния (для анимации/логов)
    pub fn current_name(&self) -> &'static str {
        self.current_state().map(|id| id.as_str()).unwrap_or("None")
    }

    /// Имя активной атаки, если текущее состояние — Attack
    pub fn current_attack_name(&self) -> Option<&str> {
        self.attacks.current_attack_name()
    }

    pub fn attack_controller(&self) -> &AttackController {
        &self.attacks
    }

    pub fn attack_controller_mut(&mut self) -> &mut AttackController {
        &mut self.attacks
    }

    /// Перенастроить длительность удержания состояния (перед входом в него).
    /// Отсутствующее состояние или состояние без таймера — warning, no-op.
    pub fn set_hold_duration(&mut self, id: StateId, secs: f32) {
        match self.state_index(id) {
            Some(index) => {
                if !self.states[index].set_hold_duration(secs) {
                    logger::log_warning(&format!(
                        "set_hold_duration: state {} has no hold timer",
                        id.as_str()
                    ));
                }
            }
            None => logger::log_warning(&format!(
                "set_hold_duration: state {} not configured",
                id.as_str()
            )),
        }
    }

    /// Принудительный переход. Отсутствующая цель — warning, no-op
    /// (текущее состояние сохраняется). Переход в текущее состояние
    /// законен: Exit и Enter отрабатывают заново.
    pub fn change_state(&mut self, id: StateId, ctx: &mut StateCtx) {
        let Some(next) = self.state_index(id) else {
            logger::log_warning(&format!(
                "change_state: state {} not configured (entity: {:?})",
                id.as_str(),
                ctx.entity
            ));
            return;
        };

        let from = self.current.map(|i| self.states[i].id);
        if let Some(index) = self.current {
            self.states[index].exit(ctx, &mut self.attacks);
        }

        ctx.requests.push(CombatRequest::StateChanged {
            entity: ctx.entity,
            from,
            to: id,
        });

        self.current = Some(next);
        self.states[next].enter(ctx, &mut self.attacks);
    }

    /// Тик машины: ленивый вход в initial на первом тике, затем update
    /// текущего состояния; возвращённый переход применяется сразу.
    pub fn physics_update(&mut self, ctx: &mut StateCtx, delta: f32) {
        if self.current.is_none() {
            let initial = self.initial;
            self.change_state(initial, ctx);
        }

        let Some(index) = self.current else {
            return;
        };
        if let Some(next) = self.states[index].physics_update(ctx, &mut self.attacks, delta) {
            self.change_state(next, ctx);
        }
    }
}
