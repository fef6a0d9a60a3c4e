pub mod audio;
pub mod blocks;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod events;
pub mod harness;
pub mod input;
pub mod runtime;
pub mod runtime_log;
pub mod scene;
pub mod stage;
pub mod time;
pub mod value;
pub mod variables;

pub use compiler::{compile_program, CompiledProgram};
pub use runtime::{RunState, Runtime};
pub use runtime_log::debug;
pub use scene::SceneDescription;

/// Wraps radians into [-PI, PI). Non-finite input stays non-finite.
pub(crate) fn wrap_angle(radians: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (radians + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::wrap_angle;
    use std::f32::consts::PI;

    #[test]
    fn wrap_angle_handles_huge_and_negative_input() {
        assert!((wrap_angle(3.0 * PI) + PI).abs() < 1e-4 || (wrap_angle(3.0 * PI) - PI).abs() < 1e-4);
        assert!((wrap_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-6);
        let huge = wrap_angle(1.7e10);
        assert!((-PI..=PI).contains(&huge), "{huge}");
        assert!(wrap_angle(f32::INFINITY).is_nan());
    }
}
