use crate::wrap_angle;
use glam::Vec2;

/// Converts between user space (canvas center origin, +Y up, degrees
/// counter-clockwise) and engine space (top-left origin, +Y down, radians
/// clockwise) for a fixed canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSpace {
    pub width: f32,
    pub height: f32,
}

impl CanvasSpace {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    pub fn user_to_engine(&self, point: Vec2) -> Vec2 {
        Vec2::new(point.x + self.width * 0.5, self.height * 0.5 - point.y)
    }

    pub fn engine_to_user(&self, point: Vec2) -> Vec2 {
        Vec2::new(point.x - self.width * 0.5, self.height * 0.5 - point.y)
    }

    /// Velocities and offsets only flip the Y axis.
    pub fn user_vector_to_engine(vector: Vec2) -> Vec2 {
        Vec2::new(vector.x, -vector.y)
    }

    pub fn engine_vector_to_user(vector: Vec2) -> Vec2 {
        Vec2::new(vector.x, -vector.y)
    }

    pub fn user_rotation_to_engine(degrees: f32) -> f32 {
        -degrees.to_radians()
    }

    /// Engine radians to user degrees in (-180, 180].
    pub fn engine_rotation_to_user(radians: f32) -> f32 {
        let degrees = -wrap_angle(radians).to_degrees();
        if degrees <= -180.0 {
            degrees + 360.0
        } else {
            degrees
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x <= self.width && point.y <= self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_maps_to_canvas_middle() {
        let canvas = CanvasSpace::new(480.0, 360.0);
        assert_eq!(canvas.user_to_engine(Vec2::ZERO), Vec2::new(240.0, 180.0));
        assert_eq!(canvas.user_to_engine(Vec2::new(-240.0, 180.0)), Vec2::ZERO);
        assert_eq!(canvas.engine_to_user(Vec2::new(480.0, 360.0)), Vec2::new(240.0, -180.0));
    }

    #[test]
    fn rotation_flips_handedness() {
        let radians = CanvasSpace::user_rotation_to_engine(90.0);
        assert!((radians + std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((CanvasSpace::engine_rotation_to_user(radians) - 90.0).abs() < 1e-4);
        let turned = CanvasSpace::user_rotation_to_engine(370.0);
        assert!((CanvasSpace::engine_rotation_to_user(turned) - 10.0).abs() < 1e-3);
    }
}
