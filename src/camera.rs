//! Perspective camera and orbit controls.
//!
//! The controls orbit the camera around a target point in spherical
//! coordinates (polar angle measured from +Y). Pointer and wheel input only
//! accumulate pending deltas; `OrbitControls::update` applies them once per
//! frame, keeping a fraction back when damping is enabled so motion eases out
//! over the following frames.

use std::f32::consts::{PI, TAU};

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Vector3};

use crate::config::CameraConfig;

/// Maps OpenGL clip space (z in -1..1) to wgpu's (z in 0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 1e-6;
// smallest camera movement reported as a change
const MOVE_EPS: f32 = 1e-5;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Point3::from(config.position),
            target: Point3::from(config.target),
            up: Vector3::unit_y(),
            fov_degrees: config.fov_degrees,
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.fov_degrees), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Radius / polar / azimuth relative to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self { radius: 0.0, phi: 0.0, theta: 0.0 };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_r = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_r * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_r * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    // pending input, consumed by update()
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
}

impl OrbitControls {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Pointer drag in CSS pixels over a viewport height also in CSS pixels.
    pub fn drag(&mut self, camera: &Camera, dx: f32, dy: f32, viewport_height: f32, mode: DragMode) {
        if viewport_height <= 0.0 {
            return;
        }
        match mode {
            DragMode::Rotate => {
                self.rotate_left(TAU * dx / viewport_height * self.rotate_speed);
                self.rotate_up(TAU * dy / viewport_height * self.rotate_speed);
            }
            DragMode::Pan => self.pan(camera, dx, dy, viewport_height),
        }
    }

    fn pan(&mut self, camera: &Camera, dx: f32, dy: f32, viewport_height: f32) {
        let offset = camera.position - camera.target;
        // half the visible height at the target's depth
        let target_distance = offset.magnitude() * (camera.fov_degrees.to_radians() / 2.0).tan();
        let forward = -offset.normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);
        if !right.x.is_finite() {
            return;
        }

        let left = 2.0 * dx * target_distance / viewport_height * self.pan_speed;
        let upward = 2.0 * dy * target_distance / viewport_height * self.pan_speed;
        self.pan_offset += -right * left + up * upward;
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    /// Wheel input; positive `delta_y` (scrolling down) moves away from the target.
    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y > 0.0 {
            self.scale /= self.zoom_scale();
        } else if delta_y < 0.0 {
            self.scale *= self.zoom_scale();
        }
    }

    /// Applies pending input to the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }
        // keep theta bounded so repeated orbits don't lose precision
        spherical.theta = (spherical.theta + PI).rem_euclid(TAU) - PI;
        spherical.phi = spherical.phi.clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            camera.target += self.pan_offset * self.damping_factor;
        } else {
            camera.target += self.pan_offset;
        }

        let previous = camera.position;
        camera.position = camera.target + spherical.to_offset();

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.delta_theta *= keep;
            self.delta_phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        (camera.position - previous).magnitude2() > MOVE_EPS * MOVE_EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(camera: &Camera) -> f32 {
        (camera.position - camera.target).magnitude()
    }

    fn setup(damping: bool) -> (Camera, OrbitControls) {
        let mut config = CameraConfig::default();
        config.enable_damping = damping;
        (Camera::from_config(&config, 1.5), OrbitControls::from_config(&config))
    }

    #[test]
    fn starts_at_configured_position() {
        let (camera, _) = setup(true);
        assert_eq!(camera.position, Point3::new(1.0, 1.0, 1.0));
        assert!((distance(&camera) - 3f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn idle_update_does_not_move() {
        let (mut camera, mut controls) = setup(true);
        assert!(!controls.update(&mut camera));
        assert!((camera.position - Point3::new(1.0, 1.0, 1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn rotation_keeps_distance() {
        let (mut camera, mut controls) = setup(false);
        controls.drag(&camera.clone(), 120.0, 30.0, 600.0, DragMode::Rotate);
        assert!(controls.update(&mut camera));
        assert!((distance(&camera) - 3f32.sqrt()).abs() < 1e-5);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn damping_eases_out() {
        let (mut camera, mut controls) = setup(true);
        controls.rotate_left(1.0);

        let start = camera.position;
        assert!(controls.update(&mut camera));
        let first_step = (camera.position - start).magnitude();

        let before = camera.position;
        controls.update(&mut camera);
        let second_step = (camera.position - before).magnitude();
        assert!(second_step < first_step);

        for _ in 0..2000 {
            controls.update(&mut camera);
        }
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn polar_angle_is_clamped() {
        let (mut camera, mut controls) = setup(false);
        controls.rotate_up(10.0);
        controls.update(&mut camera);
        // pinned just short of the pole instead of flipping under the target
        assert!(camera.position.y > 0.0);
        assert!((distance(&camera) - 3f32.sqrt()).abs() < 1e-4);
        assert!(camera.position.x.is_finite() && camera.position.z.is_finite());
    }

    #[test]
    fn wheel_down_zooms_out() {
        let (mut camera, mut controls) = setup(false);
        let before = distance(&camera);
        controls.wheel(100.0);
        controls.update(&mut camera);
        assert!(distance(&camera) > before);

        let before = distance(&camera);
        controls.wheel(-100.0);
        controls.update(&mut camera);
        assert!(distance(&camera) < before);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let (mut camera, mut controls) = setup(false);
        let offset = camera.position - camera.target;
        controls.drag(&camera.clone(), 50.0, 0.0, 600.0, DragMode::Pan);
        controls.update(&mut camera);
        assert!(camera.target != Point3::new(0.0, 0.0, 0.0));
        assert!(((camera.position - camera.target) - offset).magnitude() < 1e-5);
    }

    #[test]
    fn aspect_ignores_zero_sizes() {
        let (mut camera, _) = setup(true);
        camera.set_aspect(0.0, 100.0);
        assert_eq!(camera.aspect, 1.5);
        camera.set_aspect(800.0, 400.0);
        assert_eq!(camera.aspect, 2.0);
    }
}
