//! Render surface lifecycle: mount, coalesced updates, tick, teardown.

use std::time::Instant;

use tracing::{debug, warn};

use crate::backend::RenderBackend;
use crate::bridge::{BuiltinUniforms, UniformBridge};
use crate::camera::CameraHandle;
use crate::clock::FrameClock;
use crate::compile::{wrap_fragment, UniformRegistry};
use crate::error::{ErrorSink, SurfaceError};
use crate::types::{QualityMode, SurfaceConfig, SurfaceSize, UniformMap};

/// Where the surface sits in its lifecycle.
///
/// `Ready` is the only phase in which `tick` draws. `Failed` is terminal:
/// context acquisition or the initial compile failed, or the context was
/// lost; recovery requires a fresh `mount`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unmounted,
    Mounting,
    Ready,
    Recompiling,
    Failed,
}

struct ActiveProgram<P> {
    source: String,
    registry: UniformRegistry,
    program: P,
}

/// Owns the drawing context, the compiled program, and the frame loop
/// bookkeeping for one backdrop surface.
///
/// The host drives it explicitly: `mount` once, `update`/`resize`/
/// `set_fragment_source` as its own state changes, `tick` from its
/// per-frame callback, `unmount` (or drop) to tear down. All failures
/// flow through the `on_error` sink; no call panics across the boundary.
pub struct SurfaceManager<B: RenderBackend> {
    backend: Option<B>,
    phase: LifecyclePhase,
    active: Option<ActiveProgram<B::Program>>,
    clock: FrameClock,
    bridge: UniformBridge,
    camera: CameraHandle,
    config: SurfaceConfig,
    uniforms: UniformMap,
    container: SurfaceSize,
    surface_size: SurfaceSize,
    pending_source: Option<String>,
    pending_resize: Option<SurfaceSize>,
    on_error: ErrorSink,
}

impl<B: RenderBackend> SurfaceManager<B> {
    /// Acquires a context sized to the container (scaled by the derived
    /// quality mode) and compiles the initial program.
    ///
    /// Failure never propagates: a factory or compile error is reported
    /// through `on_error` and yields a `Failed` surface that draws
    /// nothing. Resources acquired before the failure are released
    /// before `mount` returns.
    pub fn mount<F>(
        factory: F,
        container: SurfaceSize,
        fragment_src: &str,
        config: SurfaceConfig,
        camera: CameraHandle,
        on_error: ErrorSink,
    ) -> Self
    where
        F: FnOnce(SurfaceSize) -> Result<B, SurfaceError>,
    {
        let mut manager = Self {
            backend: None,
            phase: LifecyclePhase::Mounting,
            active: None,
            clock: FrameClock::new(),
            bridge: UniformBridge::new(),
            camera,
            config,
            uniforms: UniformMap::new(),
            container,
            surface_size: SurfaceSize::new(1, 1),
            pending_source: None,
            pending_resize: None,
            on_error,
        };

        let physical = QualityMode::derive(&config).physical_size(container, config.pixel_ratio);
        let mut backend = match factory(physical) {
            Ok(backend) => backend,
            Err(err) => {
                warn!(error = %err, "context acquisition failed");
                (manager.on_error)(&err);
                manager.phase = LifecyclePhase::Failed;
                return manager;
            }
        };

        let wrapped = wrap_fragment(fragment_src);
        match backend.create_program(&wrapped) {
            Ok(program) => {
                manager.active = Some(ActiveProgram {
                    source: fragment_src.to_owned(),
                    registry: wrapped.uniforms,
                    program,
                });
                manager.backend = Some(backend);
                manager.surface_size = physical;
                manager.phase = LifecyclePhase::Ready;
                debug!(
                    width = physical.width,
                    height = physical.height,
                    "surface mounted"
                );
            }
            Err(err) => {
                // Backend drops here, releasing the context acquired above.
                warn!(error = %err, "initial program failed to compile");
                (manager.on_error)(&err);
                manager.phase = LifecyclePhase::Failed;
            }
        }
        manager
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Current physical backing-store size.
    pub fn surface_size(&self) -> SurfaceSize {
        self.surface_size
    }

    /// Requests a recompile with new fragment source.
    ///
    /// Coalesced: rapid successive calls keep only the most recent source,
    /// applied at the next tick. A source identical to the active
    /// program's is dropped without recompiling.
    pub fn set_fragment_source(&mut self, source: &str) {
        match self.phase {
            LifecyclePhase::Ready | LifecyclePhase::Recompiling => {}
            _ => return,
        }
        if self.pending_source.is_none()
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.source == source)
        {
            return;
        }
        self.pending_source = Some(source.to_owned());
    }

    /// Notes a new container size. Coalesced: at most one backing-store
    /// reallocation happens before the next draw.
    pub fn resize(&mut self, container: SurfaceSize) {
        if container.is_empty() {
            return;
        }
        self.pending_resize = Some(container);
    }

    /// Atomically replaces the flag struct and the uniform map.
    ///
    /// A change that affects the derived quality mode (or the pixel
    /// ratio) schedules a coalesced reallocation of the backing store.
    pub fn update(&mut self, config: SurfaceConfig, uniforms: UniformMap) {
        let quality_changed = QualityMode::derive(&config) != QualityMode::derive(&self.config)
            || config.pixel_ratio != self.config.pixel_ratio;
        self.config = config;
        self.uniforms = uniforms;
        if quality_changed {
            self.pending_resize = Some(self.container);
        }
    }

    /// The per-frame step: applies coalesced resize and source changes,
    /// advances the clock, pushes uniforms, and issues one draw.
    ///
    /// Returns whether the host should schedule another frame. Only the
    /// `Ready` phase draws; paused surfaces draw when explicitly ticked
    /// (so a repaint after resize stays possible) but return `false`.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.phase {
            LifecyclePhase::Ready => {}
            _ => return false,
        }
        if self.backend.is_none() {
            return false;
        }

        self.apply_pending_resize();
        self.apply_pending_source();

        let Some(active) = self.active.as_ref() else {
            return false;
        };
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };

        let sample = self.clock.tick(now, self.config.is_playing);
        let camera = self.camera.snapshot();

        let mut builtin = bytemuck::Zeroable::zeroed();
        let mut user_bytes = vec![0u8; active.registry.byte_len()];
        let on_error = &mut self.on_error;
        self.bridge.push_frame(
            &mut builtin,
            &mut user_bytes,
            &active.registry,
            sample,
            self.surface_size,
            &camera,
            &self.uniforms,
            &self.config,
            &mut |err| on_error(&err),
        );

        match backend.draw(&active.program, &builtin, &user_bytes) {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                warn!(error = %err, "context lost; surface failed");
                (self.on_error)(&err);
                self.release_resources();
                self.phase = LifecyclePhase::Failed;
                return false;
            }
            Err(err) => {
                (self.on_error)(&err);
            }
        }

        self.config.is_playing
    }

    /// Scoped teardown: releases the program and the context, cancels
    /// pending work. No draw and no `on_error` callback fires afterwards,
    /// even if a tick was already scheduled.
    pub fn unmount(&mut self) {
        self.release_resources();
        if self.phase != LifecyclePhase::Unmounted {
            debug!("surface unmounted");
        }
        self.phase = LifecyclePhase::Unmounted;
    }

    fn apply_pending_resize(&mut self) {
        let Some(container) = self.pending_resize.take() else {
            return;
        };
        self.container = container;
        let physical =
            QualityMode::derive(&self.config).physical_size(container, self.config.pixel_ratio);
        if physical == self.surface_size {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(physical);
            self.surface_size = physical;
            debug!(
                width = physical.width,
                height = physical.height,
                "reallocated backing store"
            );
        }
    }

    fn apply_pending_source(&mut self) {
        let Some(source) = self.pending_source.take() else {
            return;
        };
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.source == source)
        {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        self.phase = LifecyclePhase::Recompiling;
        let wrapped = wrap_fragment(&source);
        match backend.create_program(&wrapped) {
            Ok(program) => {
                if let Some(old) = self.active.take() {
                    backend.destroy_program(old.program);
                }
                self.active = Some(ActiveProgram {
                    source,
                    registry: wrapped.uniforms,
                    program,
                });
                // A shader swap must not inherit the old program's timing
                // or its diagnostic ledger.
                self.clock.reset();
                self.bridge.reset();
                debug!("installed new fragment program");
            }
            Err(err) => {
                warn!(error = %err, "recompile failed; keeping previous program");
                (self.on_error)(&err);
            }
        }
        self.phase = LifecyclePhase::Ready;
    }

    fn release_resources(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(backend) = self.backend.as_mut() {
                backend.destroy_program(active.program);
            }
        }
        self.backend = None;
        self.pending_source = None;
        self.pending_resize = None;
    }
}

impl<B: RenderBackend> Drop for SurfaceManager<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::camera::CameraState;
    use crate::compile::WrappedShader;
    use crate::types::UniformValue;

    const VALID: &str = "uniform float speed;\nvoid mainImage(out vec4 o, in vec2 f) { o = vec4(speed); }\n";
    const VALID_2: &str = "void mainImage(out vec4 o, in vec2 f) { o = vec4(uTime); }\n";
    const BROKEN: &str = "void mainImage(out vec4 o, in vec2 f) { @broken@ }\n";

    struct DrawRecord {
        program: u64,
        time: f32,
        camera_x: f32,
    }

    #[derive(Default)]
    struct Counters {
        compiled: usize,
        live: Vec<u64>,
        destroyed: Vec<u64>,
        draws: Vec<DrawRecord>,
        resizes: Vec<SurfaceSize>,
        fail_next_draw: bool,
    }

    struct FakeBackend {
        counters: Rc<RefCell<Counters>>,
        next_id: u64,
    }

    struct FakeProgram {
        id: u64,
    }

    impl RenderBackend for FakeBackend {
        type Program = FakeProgram;

        fn create_program(&mut self, shader: &WrappedShader) -> Result<FakeProgram, SurfaceError> {
            if shader.source.contains("@broken@") {
                return Err(SurfaceError::ShaderCompileError {
                    diagnostic: "unexpected token '@'".into(),
                });
            }
            let id = self.next_id;
            self.next_id += 1;
            let mut counters = self.counters.borrow_mut();
            counters.compiled += 1;
            counters.live.push(id);
            Ok(FakeProgram { id })
        }

        fn destroy_program(&mut self, program: FakeProgram) {
            let mut counters = self.counters.borrow_mut();
            counters.live.retain(|id| *id != program.id);
            counters.destroyed.push(program.id);
        }

        fn resize(&mut self, size: SurfaceSize) {
            self.counters.borrow_mut().resizes.push(size);
        }

        fn draw(
            &mut self,
            program: &FakeProgram,
            builtin: &BuiltinUniforms,
            _user_bytes: &[u8],
        ) -> Result<(), SurfaceError> {
            let mut counters = self.counters.borrow_mut();
            if counters.fail_next_draw {
                counters.fail_next_draw = false;
                return Err(SurfaceError::ContextLost);
            }
            counters.draws.push(DrawRecord {
                program: program.id,
                time: builtin.time,
                camera_x: builtin.camera_position[0],
            });
            Ok(())
        }
    }

    type Harness = (
        SurfaceManager<FakeBackend>,
        Rc<RefCell<Counters>>,
        Rc<RefCell<Vec<SurfaceError>>>,
        CameraHandle,
    );

    fn mount(source: &str) -> Harness {
        mount_with(source, SurfaceConfig::default())
    }

    fn mount_with(source: &str, config: SurfaceConfig) -> Harness {
        let counters = Rc::new(RefCell::new(Counters::default()));
        let errors: Rc<RefCell<Vec<SurfaceError>>> = Rc::new(RefCell::new(Vec::new()));
        let camera = CameraHandle::default();

        let sink = {
            let errors = errors.clone();
            Box::new(move |err: &SurfaceError| errors.borrow_mut().push(err.clone()))
        };
        let factory = {
            let counters = counters.clone();
            move |_size: SurfaceSize| {
                Ok(FakeBackend {
                    counters,
                    next_id: 1,
                })
            }
        };
        let manager = SurfaceManager::mount(
            factory,
            SurfaceSize::new(640, 360),
            source,
            config,
            camera.clone(),
            sink,
        );
        (manager, counters, errors, camera)
    }

    fn ticks(base: Instant, frame: u64) -> Instant {
        base + Duration::from_millis(16 * frame)
    }

    #[test]
    fn mount_reaches_ready_and_draws() {
        let (mut manager, counters, errors, _) = mount(VALID);
        assert_eq!(manager.phase(), LifecyclePhase::Ready);

        let keep_going = manager.tick(Instant::now());
        assert!(keep_going);
        assert_eq!(counters.borrow().draws.len(), 1);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn context_unavailable_reports_and_renders_nothing() {
        let errors: Rc<RefCell<Vec<SurfaceError>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let errors = errors.clone();
            Box::new(move |err: &SurfaceError| errors.borrow_mut().push(err.clone()))
        };
        let mut manager: SurfaceManager<FakeBackend> = SurfaceManager::mount(
            |_size| {
                Err(SurfaceError::ContextUnavailable {
                    reason: "no adapter".into(),
                })
            },
            SurfaceSize::new(640, 360),
            VALID,
            SurfaceConfig::default(),
            CameraHandle::default(),
            sink,
        );
        assert_eq!(manager.phase(), LifecyclePhase::Failed);
        assert_eq!(errors.borrow().len(), 1);
        assert!(!manager.tick(Instant::now()));
    }

    #[test]
    fn initial_compile_failure_is_terminal_and_releases_context() {
        let (mut manager, counters, errors, _) = mount(BROKEN);
        assert_eq!(manager.phase(), LifecyclePhase::Failed);
        assert_eq!(errors.borrow().len(), 1);
        assert!(counters.borrow().live.is_empty());
        assert!(!manager.tick(Instant::now()));
        assert!(counters.borrow().draws.is_empty());
    }

    #[test]
    fn source_swap_activates_new_program_and_releases_old() {
        let (mut manager, counters, errors, _) = mount(VALID);
        let base = Instant::now();
        manager.tick(base);

        manager.set_fragment_source(VALID_2);
        manager.tick(ticks(base, 1));

        let counters = counters.borrow();
        assert_eq!(counters.compiled, 2);
        assert_eq!(counters.live, vec![2]);
        assert_eq!(counters.destroyed, vec![1]);
        assert_eq!(counters.draws.last().unwrap().program, 2);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn program_swap_resets_the_clock() {
        let (mut manager, counters, _, _) = mount(VALID);
        let base = Instant::now();
        manager.tick(base);
        manager.tick(ticks(base, 60));

        manager.set_fragment_source(VALID_2);
        manager.tick(ticks(base, 61));
        manager.tick(ticks(base, 62));

        let counters = counters.borrow();
        // First draw of the new program starts from zero elapsed time.
        assert_eq!(counters.draws[2].time, 0.0);
        assert!(counters.draws[3].time < 0.1);
    }

    #[test]
    fn failed_recompile_keeps_previous_program_and_reports_once() {
        let (mut manager, counters, errors, _) = mount(VALID);
        let base = Instant::now();
        manager.tick(base);

        manager.set_fragment_source(BROKEN);
        manager.tick(ticks(base, 1));
        manager.tick(ticks(base, 2));

        let counters = counters.borrow();
        assert_eq!(counters.draws.len(), 3);
        assert!(counters.draws.iter().all(|draw| draw.program == 1));
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SurfaceError::ShaderCompileError { .. }));
        assert_eq!(manager.phase(), LifecyclePhase::Ready);
    }

    #[test]
    fn rapid_source_edits_compile_only_the_last() {
        let (mut manager, counters, _, _) = mount(VALID);
        manager.set_fragment_source("void mainImage(out vec4 o, in vec2 f) { o = vec4(1.0); }\n");
        manager.set_fragment_source("void mainImage(out vec4 o, in vec2 f) { o = vec4(2.0); }\n");
        manager.set_fragment_source(VALID_2);
        manager.tick(Instant::now());

        assert_eq!(counters.borrow().compiled, 2);
    }

    #[test]
    fn source_identical_to_active_is_ignored() {
        let (mut manager, counters, _, _) = mount(VALID);
        manager.set_fragment_source(VALID);
        manager.tick(Instant::now());
        assert_eq!(counters.borrow().compiled, 1);
    }

    #[test]
    fn rapid_resizes_reallocate_once() {
        let (mut manager, counters, _, _) = mount(VALID);
        for width in 0..10 {
            manager.resize(SurfaceSize::new(700 + width, 400));
        }
        manager.tick(Instant::now());

        let counters = counters.borrow();
        assert_eq!(counters.resizes.len(), 1);
        assert_eq!(counters.resizes[0], SurfaceSize::new(709, 400));
        assert_eq!(manager.surface_size(), SurfaceSize::new(709, 400));
    }

    #[test]
    fn resize_to_same_physical_size_skips_reallocation() {
        let (mut manager, counters, _, _) = mount(VALID);
        manager.resize(SurfaceSize::new(640, 360));
        manager.tick(Instant::now());
        assert!(counters.borrow().resizes.is_empty());
    }

    #[test]
    fn quality_flag_change_schedules_reallocation() {
        let (mut manager, counters, _, _) = mount(VALID);
        manager.update(
            SurfaceConfig {
                is_hd_enabled: true,
                pixel_ratio: 2.0,
                ..SurfaceConfig::default()
            },
            UniformMap::new(),
        );
        manager.tick(Instant::now());

        let counters = counters.borrow();
        assert_eq!(counters.resizes, vec![SurfaceSize::new(1280, 720)]);
    }

    #[test]
    fn paused_surface_draws_on_demand_but_requests_no_frame() {
        let (mut manager, counters, _, _) = mount(VALID);
        manager.update(
            SurfaceConfig {
                is_playing: false,
                ..SurfaceConfig::default()
            },
            UniformMap::new(),
        );

        let base = Instant::now();
        assert!(!manager.tick(base));
        assert!(!manager.tick(ticks(base, 60)));

        let counters = counters.borrow();
        assert_eq!(counters.draws.len(), 2);
        // Clock is frozen while paused.
        assert_eq!(counters.draws[1].time, 0.0);
    }

    #[test]
    fn resuming_playback_requests_frames_again() {
        let (mut manager, _, _, _) = mount(VALID);
        manager.update(
            SurfaceConfig {
                is_playing: false,
                ..SurfaceConfig::default()
            },
            UniformMap::new(),
        );
        assert!(!manager.tick(Instant::now()));

        manager.update(SurfaceConfig::default(), UniformMap::new());
        assert!(manager.tick(Instant::now()));
    }

    #[test]
    fn camera_changes_are_visible_on_the_next_tick() {
        let (mut manager, counters, _, camera) = mount(VALID);
        let base = Instant::now();
        manager.tick(base);

        camera.update(|state| state.position = [3.0, 0.0, 0.0]);
        manager.tick(ticks(base, 1));

        let counters = counters.borrow();
        assert_eq!(counters.draws[0].camera_x, 0.0);
        assert_eq!(counters.draws[1].camera_x, 3.0);
    }

    #[test]
    fn context_loss_is_fatal_and_reported_once() {
        let (mut manager, counters, errors, _) = mount(VALID);
        counters.borrow_mut().fail_next_draw = true;

        assert!(!manager.tick(Instant::now()));
        assert_eq!(manager.phase(), LifecyclePhase::Failed);
        assert!(counters.borrow().live.is_empty());

        // Further ticks neither draw nor report.
        assert!(!manager.tick(Instant::now()));
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], SurfaceError::ContextLost);
    }

    #[test]
    fn unmount_releases_everything_and_silences_callbacks() {
        let (mut manager, counters, errors, _) = mount(VALID);
        manager.tick(Instant::now());
        manager.set_fragment_source(BROKEN);
        manager.unmount();

        // A tick that was already scheduled before unmount fires anyway;
        // it must do nothing.
        assert!(!manager.tick(Instant::now()));

        let counters = counters.borrow();
        assert!(counters.live.is_empty());
        assert_eq!(counters.destroyed, vec![1]);
        assert_eq!(counters.draws.len(), 1);
        assert!(errors.borrow().is_empty());
        assert_eq!(manager.phase(), LifecyclePhase::Unmounted);
    }

    #[test]
    fn valid_then_invalid_source_scenario() {
        // Mount with a valid source and a user uniform, tick, then feed a
        // broken edit: the draw keeps using the original program and
        // exactly one compile error is reported.
        let (mut manager, counters, errors, _) = mount(VALID);
        let mut uniforms = UniformMap::new();
        uniforms.insert("speed".into(), UniformValue::Float(1.0));
        manager.update(SurfaceConfig::default(), uniforms);

        let base = Instant::now();
        manager.tick(base);
        assert_eq!(counters.borrow().draws.len(), 1);
        assert!(errors.borrow().is_empty());

        manager.set_fragment_source(BROKEN);
        manager.tick(ticks(base, 1));

        assert_eq!(counters.borrow().draws.len(), 2);
        assert_eq!(counters.borrow().draws[1].program, 1);
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SurfaceError::ShaderCompileError { .. }));
    }

    #[test]
    fn camera_state_defaults_look_down_negative_z() {
        let camera = CameraState::default();
        assert_eq!(camera.forward, [0.0, 0.0, -1.0]);
    }
}
