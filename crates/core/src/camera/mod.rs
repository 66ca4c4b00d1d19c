//! Perspective camera and the damped orbit controller that drives it.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::{Mat4, Vec3};

/// Vertical field of view in degrees.
pub const FOV_DEGREES: f32 = 50.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
/// Where the camera starts, looking at the origin.
pub const INITIAL_POSITION: Vec3 = Vec3::new(0.0, 15.0, 25.0);

/// Fraction of the pending input applied per nominal frame.
pub const DAMPING_FACTOR: f32 = 0.05;
/// Revolutions per minute at nominal frame rate, matching the reference
/// orbit-control convention of `speed * (TAU / 60)` radians per second.
pub const AUTO_ROTATE_SPEED: f32 = 1.2;
pub const MIN_DISTANCE: f32 = 15.0;
pub const MAX_DISTANCE: f32 = 50.0;

const NOMINAL_FRAME_RATE: f32 = 60.0;
const ZOOM_STEP: f32 = 0.1;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Right-handed perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl PerspectiveCamera {
    /// Camera at the initial viewing position for the given aspect ratio.
    pub fn new(aspect: f32) -> Self {
        Self {
            fov_y_degrees: FOV_DEGREES,
            aspect,
            near: NEAR_PLANE,
            far: FAR_PLANE,
            position: INITIAL_POSITION,
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Orbit controller with inertial damping and idle auto-rotation.
///
/// Input is accumulated as pending yaw/pitch velocity; each `update` applies
/// a damped share of it so motion eases out instead of stopping dead. The
/// closed form `pending * (1 - (1 - k)^(60 * dt))` reproduces the classic
/// per-frame `k` decay at any frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitController {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub zoom_enabled: bool,
    pub pan_enabled: bool,
    pub touch_enabled: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl OrbitController {
    /// Builds a controller orbiting the camera's current target at its
    /// current offset.
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.length().max(f32::EPSILON);
        Self {
            target: camera.target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            damping_factor: DAMPING_FACTOR,
            auto_rotate: true,
            auto_rotate_speed: AUTO_ROTATE_SPEED,
            zoom_enabled: true,
            pan_enabled: false,
            touch_enabled: true,
            min_distance: MIN_DISTANCE,
            max_distance: MAX_DISTANCE,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
        }
    }

    /// Queues a pointer or touch drag as pending rotation, in radians.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw_velocity += yaw_delta;
        self.pitch_velocity += pitch_delta;
    }

    /// Dollies along the view direction. Positive steps move away from the
    /// target. Ignored while zooming is disabled.
    pub fn zoom(&mut self, steps: f32) {
        if !self.zoom_enabled {
            return;
        }
        self.distance =
            (self.distance * (1.0 + steps * ZOOM_STEP)).clamp(self.min_distance, self.max_distance);
    }

    /// Moves the orbit target laterally. Ignored while panning is disabled.
    pub fn pan(&mut self, offset: Vec3) {
        if !self.pan_enabled {
            return;
        }
        self.target += offset;
    }

    /// Advances damping and auto-rotation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let retain = (1.0 - self.damping_factor).powf(NOMINAL_FRAME_RATE * dt);
        self.yaw += self.yaw_velocity * (1.0 - retain);
        self.pitch += self.pitch_velocity * (1.0 - retain);
        self.yaw_velocity *= retain;
        self.pitch_velocity *= retain;

        if self.auto_rotate {
            self.yaw += self.auto_rotate_speed * (TAU / NOMINAL_FRAME_RATE) * dt;
        }

        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Camera position implied by the current spherical state.
    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(
                self.distance * cos_pitch * sin_yaw,
                self.distance * sin_pitch,
                self.distance * cos_pitch * cos_yaw,
            )
    }

    /// Writes the controller state back into the camera.
    pub fn apply_to(&self, camera: &mut PerspectiveCamera) {
        camera.position = self.eye();
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn manual_controller() -> OrbitController {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        let mut controller = OrbitController::from_camera(&camera);
        controller.auto_rotate = false;
        controller
    }

    #[test]
    fn controller_defaults_match_the_viewing_rig() {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        let controller = OrbitController::from_camera(&camera);
        assert!(controller.auto_rotate);
        assert!(controller.zoom_enabled);
        assert!(!controller.pan_enabled);
        assert!(controller.touch_enabled);
        assert_eq!(controller.damping_factor, DAMPING_FACTOR);
        assert_eq!(controller.min_distance, MIN_DISTANCE);
        assert_eq!(controller.max_distance, MAX_DISTANCE);
    }

    #[test]
    fn from_camera_round_trips_the_initial_position() {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        let controller = OrbitController::from_camera(&camera);
        assert!((controller.eye() - INITIAL_POSITION).length() < 1e-4);
    }

    #[test]
    fn one_nominal_frame_applies_the_damping_factor() {
        let mut controller = manual_controller();
        let start = controller.yaw;
        controller.rotate(0.5, 0.0);
        controller.update(FRAME);
        let applied = controller.yaw - start;
        assert!((applied - 0.5 * DAMPING_FACTOR).abs() < 1e-5);
    }

    #[test]
    fn damped_rotation_converges_to_the_queued_delta() {
        let mut controller = manual_controller();
        let start = controller.yaw;
        controller.rotate(0.5, 0.0);
        for _ in 0..600 {
            controller.update(FRAME);
        }
        assert!((controller.yaw - start - 0.5).abs() < 1e-3);
    }

    #[test]
    fn variable_dt_matches_fixed_stepping() {
        let mut fixed = manual_controller();
        let mut coarse = manual_controller();
        fixed.rotate(0.4, -0.2);
        coarse.rotate(0.4, -0.2);

        for _ in 0..6 {
            fixed.update(FRAME);
        }
        coarse.update(6.0 * FRAME);

        assert!((fixed.yaw - coarse.yaw).abs() < 1e-5);
        assert!((fixed.pitch - coarse.pitch).abs() < 1e-5);
    }

    #[test]
    fn auto_rotate_advances_yaw_at_the_reference_rate() {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        let mut controller = OrbitController::from_camera(&camera);
        let start = controller.yaw;
        controller.update(1.0);
        let advanced = controller.yaw - start;
        assert!((advanced - AUTO_ROTATE_SPEED * TAU / 60.0).abs() < 1e-5);
    }

    #[test]
    fn zoom_clamps_to_the_distance_range() {
        let mut controller = manual_controller();
        controller.zoom(-100.0);
        assert_eq!(controller.distance, MIN_DISTANCE);
        controller.zoom(100.0);
        assert_eq!(controller.distance, MAX_DISTANCE);
    }

    #[test]
    fn disabled_zoom_is_ignored() {
        let mut controller = manual_controller();
        controller.zoom_enabled = false;
        let before = controller.distance;
        controller.zoom(5.0);
        assert_eq!(controller.distance, before);
    }

    #[test]
    fn pan_is_disabled_by_default() {
        let mut controller = manual_controller();
        controller.pan(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(controller.target, Vec3::ZERO);
    }

    #[test]
    fn pitch_never_reaches_the_poles() {
        let mut controller = manual_controller();
        controller.rotate(0.0, 10.0);
        for _ in 0..600 {
            controller.update(FRAME);
        }
        assert!(controller.pitch <= FRAC_PI_2 - 0.01 + 1e-6);
        assert!(controller.eye().is_finite());
    }

    #[test]
    fn view_matrix_moves_the_eye_to_the_origin() {
        let camera = PerspectiveCamera::new(1.5);
        let eye_in_view = camera.view_matrix().transform_point3(camera.position);
        assert!(eye_in_view.length() < 1e-5);
    }
}
