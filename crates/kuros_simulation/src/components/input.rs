//! Снапшот входа игрока.
//!
//! Ядро читает вход как чистый запрос "нажато ли действие на этом тике";
//! заполнение снапшота — обязанность внешнего слоя (или теста).

use bevy::prelude::*;
use std::collections::HashSet;

/// Именованные действия, которые ядро умеет опрашивать
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
}

/// Снапшот входа на текущий тик
///
/// Для headless тестов — mock input через `press`/`hold`.
/// Для игры — заполняется из реального input polling перед FixedUpdate.
#[derive(Resource, Debug, Clone, Default)]
pub struct InputSnapshot {
    just_pressed: HashSet<InputAction>,
    held: HashSet<InputAction>,
}

impl InputSnapshot {
    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.just_pressed.contains(&action)
    }

    pub fn held(&self, action: InputAction) -> bool {
        self.held.contains(&action)
    }

    /// Зарегистрировать нажатие (just_pressed + held)
    pub fn press(&mut self, action: InputAction) {
        self.just_pressed.insert(action);
        self.held.insert(action);
    }

    pub fn release(&mut self, action: InputAction) {
        self.held.remove(&action);
    }

    /// Сброс just_pressed в конце тика (held сохраняется)
    pub fn end_tick(&mut self) {
        self.just_pressed.clear();
    }

    pub fn clear(&mut self) {
        self.just_pressed.clear();
        self.held.clear();
    }
}
