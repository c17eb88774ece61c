//! Интеграция velocity → Transform (kinematic движение без физики)

use bevy::prelude::*;

use crate::components::Body;

/// Работает в FixedUpdate (60 Hz) после FSM и эффектов:
/// состояния пишут velocity, здесь она становится позицией.
pub fn apply_velocity(time: Res<Time>, mut movers: Query<(&Body, &mut Transform)>) {
    let delta = time.delta_secs();
    for (body, mut transform) in movers.iter_mut() {
        if body.velocity != Vec3::ZERO {
            transform.translation += body.velocity * delta;
        }
    }
}
