//! Скользящее окно полученных ударов: N попаданий за window секунд
//! триггерят короткую самозаморозку (анти-stunlock и телеграф игроку).

use std::collections::VecDeque;

use bevy::prelude::*;

/// Компонент-счётчик недавних попаданий по актору
#[derive(Component, Debug, Clone)]
pub struct HitTracker {
    /// Таймстампы попаданий (секунды от старта симуляции), по возрастанию
    timestamps: VecDeque<f32>,
    /// Сколько попаданий в окне триггерят заморозку
    pub hits_to_freeze: u32,
    /// Ширина окна (секунды)
    pub hit_window_seconds: f32,
    /// Длительность самозаморозки при триггере
    pub freeze_duration: f32,
}

impl Default for HitTracker {
    fn default() -> Self {
        Self {
            timestamps: VecDeque::new(),
            hits_to_freeze: 2,
            hit_window_seconds: 2.0,
            freeze_duration: 0.5,
        }
    }
}

impl HitTracker {
    pub fn new(hits_to_freeze: u32, hit_window_seconds: f32, freeze_duration: f32) -> Self {
        Self {
            timestamps: VecDeque::new(),
            hits_to_freeze,
            hit_window_seconds,
            freeze_duration,
        }
    }

    pub fn register_hit(&mut self, now: f32) {
        self.timestamps.push_back(now);
    }

    /// Выкидывает из окна удары старше `now - window` и проверяет порог.
    /// Проверка отделена от регистрации: вызывающий решает, когда спросить.
    pub fn should_freeze(&mut self, now: f32) -> bool {
        while let Some(&oldest) = self.timestamps.front() {
            if now - oldest > self.hit_window_seconds {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        self.timestamps.len() as u32 >= self.hits_to_freeze
    }

    /// Полный сброс окна (после триггера заморозки)
    pub fn reset(&mut self) {
        self.timestamps.clear();
    }

    pub fn recent_hits(&self) -> usize {
        self.timestamps.len()
    }
}
