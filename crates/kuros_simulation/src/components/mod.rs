//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: базовые характеристики (faction, health, body, attack timer)
//! - input: снапшот действий игрока (pure query для escape-атак)

pub mod actor;
pub mod input;

pub use actor::*;
pub use input::*;
