//! The per-frame path: scene ownership, camera motion, idle animation, and
//! the draw call.
//!
//! A [`RenderLoop`] owns exactly one [`SceneHandle`] and does a bounded
//! amount of work per frame. It knows nothing about loading beyond whether a
//! model is currently mounted.

use std::fmt;
use std::time::Duration;

use glam::{Quat, Vec3};

use crate::camera::{OrbitController, PerspectiveCamera};
use crate::host::{DrawError, FrameStats, RenderContext};
use crate::scene::resources::ResourceTicket;
use crate::scene::{SceneGraph, SceneNode};

/// Idle bob height in world units.
pub const IDLE_BOB_AMPLITUDE: f32 = 1.2;
/// Idle bob angular rate in radians per second.
pub const IDLE_BOB_RATE: f32 = 1.8;
/// Idle spin rate around the vertical axis in radians per second.
pub const IDLE_SPIN_RATE: f32 = 0.5;
/// Fractional amplitude of the idle scale pulse.
pub const IDLE_PULSE_AMPLITUDE: f32 = 0.08;
/// Idle scale pulse angular rate in radians per second.
pub const IDLE_PULSE_RATE: f32 = 2.5;

/// Converts host timestamps into seconds since the loop started.
///
/// The origin is captured on the first sample after construction or reset,
/// so idle animation phase always starts at zero for a fresh session.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    origin: Option<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the first sampled timestamp. A timestamp earlier than
    /// the origin reads as zero.
    pub fn elapsed(&mut self, now: Duration) -> f32 {
        let origin = *self.origin.get_or_insert(now);
        now.checked_sub(origin).unwrap_or_default().as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.origin = None;
    }
}

/// Everything one rendering session owns: the context, the camera rig, the
/// stage graph, and the mounted model, plus the ledger ticket for the
/// context itself. Release is explicit and final.
pub struct SceneHandle {
    context: Box<dyn RenderContext>,
    context_ticket: ResourceTicket,
    pub camera: PerspectiveCamera,
    pub controller: OrbitController,
    stage: SceneGraph,
    model_index: Option<usize>,
    released: bool,
}

impl fmt::Debug for SceneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneHandle")
            .field("context_id", &self.context.context_id())
            .field("camera", &self.camera)
            .field("has_model", &self.has_model())
            .field("released", &self.released)
            .finish()
    }
}

impl SceneHandle {
    pub fn new(
        context: Box<dyn RenderContext>,
        context_ticket: ResourceTicket,
        camera: PerspectiveCamera,
        controller: OrbitController,
        stage: SceneGraph,
    ) -> Self {
        Self {
            context,
            context_ticket,
            camera,
            controller,
            stage,
            model_index: None,
            released: false,
        }
    }

    /// Mounts a model subtree under the stage, disposing the previous one
    /// if a model was already mounted.
    pub fn mount_model(&mut self, model: SceneNode) {
        match self.model_index {
            Some(index) => {
                self.stage.root.children[index].dispose();
                self.stage.root.children[index] = model;
            }
            None => {
                self.stage.root.children.push(model);
                self.model_index = Some(self.stage.root.children.len() - 1);
            }
        }
    }

    pub fn has_model(&self) -> bool {
        self.model_index.is_some()
    }

    pub fn model(&self) -> Option<&SceneNode> {
        self.model_index.map(|index| &self.stage.root.children[index])
    }

    pub fn model_mut(&mut self) -> Option<&mut SceneNode> {
        self.model_index
            .map(|index| &mut self.stage.root.children[index])
    }

    pub fn stage(&self) -> &SceneGraph {
        &self.stage
    }

    /// Resizes the drawable surface and keeps the camera aspect in step.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
        if height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    pub fn context_id(&self) -> u64 {
        self.context.context_id()
    }

    pub fn draw(&mut self) -> Result<FrameStats, DrawError> {
        self.context.draw(&self.stage, &self.camera)
    }

    /// Disposes the whole scene and the context. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stage.dispose();
        self.context.dispose();
        self.context_ticket.release();
    }
}

/// Drives a [`SceneHandle`] frame by frame.
#[derive(Debug)]
pub struct RenderLoop {
    pub handle: SceneHandle,
    clock: FrameClock,
    idle_animation: bool,
    last_elapsed: f32,
}

impl RenderLoop {
    pub fn new(handle: SceneHandle) -> Self {
        Self {
            handle,
            clock: FrameClock::new(),
            idle_animation: true,
            last_elapsed: 0.0,
        }
    }

    pub fn idle_animation(&self) -> bool {
        self.idle_animation
    }

    /// Enables or disables idle motion. Takes effect on the next frame;
    /// when disabled the model simply keeps its last transform.
    pub fn set_idle_animation(&mut self, enabled: bool) {
        self.idle_animation = enabled;
    }

    /// Runs one frame: camera damping and auto-rotation, idle model motion,
    /// then a single draw.
    pub fn on_frame(&mut self, now: Duration) -> Result<FrameStats, DrawError> {
        let elapsed = self.clock.elapsed(now);
        let dt = (elapsed - self.last_elapsed).max(0.0);
        self.last_elapsed = elapsed;

        self.handle.controller.auto_rotate = self.idle_animation;
        self.handle.controller.update(dt);
        self.handle.controller.apply_to(&mut self.handle.camera);

        if self.idle_animation {
            if let Some(model) = self.handle.model_mut() {
                apply_idle(model, elapsed);
            }
        }

        self.handle.draw()
    }
}

/// Writes the idle pose for time `t` into the model root. The pose is
/// absolute: bob height, spin angle, and scale pulse replace the previous
/// vertical offset, rotation, and scale, while lateral position is kept.
fn apply_idle(model: &mut SceneNode, t: f32) {
    model.transform.translation.y = IDLE_BOB_AMPLITUDE * (t * IDLE_BOB_RATE).sin();
    model.transform.rotation = Quat::from_rotation_y(t * IDLE_SPIN_RATE);
    model.transform.scale = Vec3::splat(1.0 + IDLE_PULSE_AMPLITUDE * (t * IDLE_PULSE_RATE).sin());
}
