use crate::config::{ConfigError, EngineConfig};
use crate::display::{DisplayError, DisplaySurface};
use crate::step::FixedTimestep;
use crate::timer::{DeltaSource, Timer};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that stop the game loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
    #[error("game initialization failed")]
    Init(#[source] BoxedError),
    #[error("frame failed")]
    Frame(#[source] BoxedError),
}

/// Game-specific behaviour driven by [`GameEngine`].
///
/// `update` runs at the fixed simulation rate and receives the tick length
/// in seconds; `input` and `render` run once per loop iteration.
pub trait GameLogic<D: DisplaySurface> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn init(&mut self, display: &mut D) -> Result<(), Self::Error>;

    fn input(&mut self, display: &mut D);

    fn update(&mut self, interval: f32);

    fn render(&mut self, display: &mut D) -> Result<(), Self::Error>;

    /// Release everything the game owns. Called exactly once when the loop
    /// exits, including after a failed `init`, and always before the display
    /// is destroyed.
    fn cleanup(&mut self, display: &mut D);
}

/// Counters reported when the loop exits normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Loop iterations, each of which rendered one frame.
    pub iterations: u64,
    /// Fixed-rate simulation ticks.
    pub updates: u64,
}

/// Owns the display and the game and runs the fixed-timestep loop.
pub struct GameEngine<D, L> {
    config: EngineConfig,
    display: D,
    logic: L,
    clock: Option<Box<dyn DeltaSource>>,
}

impl<D, L> GameEngine<D, L>
where
    D: DisplaySurface,
    L: GameLogic<D>,
{
    pub fn new(config: EngineConfig, display: D, logic: L) -> Self {
        Self {
            config,
            display,
            logic,
            clock: None,
        }
    }

    /// Replace the wall-clock timer, e.g. with a scripted source in tests.
    pub fn with_delta_source(mut self, source: impl DeltaSource + 'static) -> Self {
        self.clock = Some(Box::new(source));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Initialize, loop until the display asks to close, then clean up.
    ///
    /// Game cleanup and display teardown happen exactly once on every exit
    /// path.
    pub fn run(mut self) -> Result<LoopStats, EngineError> {
        let result = self.start_and_loop();
        if let Err(err) = &result {
            tracing::error!(error = %err, "game loop stopped with an error");
        }
        self.logic.cleanup(&mut self.display);
        self.display.destroy();
        result
    }

    fn start_and_loop(&mut self) -> Result<LoopStats, EngineError> {
        self.config.validate()?;
        self.display.init()?;
        let mut clock: Box<dyn DeltaSource> = match self.clock.take() {
            Some(source) => source,
            None => Box::new(Timer::new()),
        };
        self.logic
            .init(&mut self.display)
            .map_err(|e| EngineError::Init(Box::new(e)))?;
        tracing::info!(
            title = %self.config.title,
            target_ups = self.config.target_ups,
            vsync = self.config.vsync,
            "game loop starting"
        );
        let stats = self.game_loop(clock.as_mut())?;
        tracing::info!(
            iterations = stats.iterations,
            updates = stats.updates,
            "game loop finished"
        );
        Ok(stats)
    }

    fn game_loop(&mut self, clock: &mut dyn DeltaSource) -> Result<LoopStats, EngineError> {
        let mut step = FixedTimestep::new(self.config.tick_interval())
            .with_max_ticks(self.config.max_catch_up_ticks);
        let mut stats = LoopStats::default();

        while !self.display.should_close() {
            step.accumulate(clock.delta());

            self.logic.input(&mut self.display);

            let logic = &mut self.logic;
            let ticks = step.drain(|interval| logic.update(interval));
            if ticks > self.config.target_ups {
                tracing::warn!(
                    ticks,
                    target_ups = self.config.target_ups,
                    "simulation fell more than a second behind"
                );
            }
            stats.updates += u64::from(ticks);

            self.logic
                .render(&mut self.display)
                .map_err(|e| EngineError::Frame(Box::new(e)))?;
            self.display.swap_buffers();
            self.display.poll_events();
            stats.iterations += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use hearth_input::{KeyboardState, MouseState};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct ScriptedDisplay {
        log: Log,
        polls_until_close: u32,
        fail_init: bool,
        closed: bool,
        keyboard: KeyboardState,
        mouse: MouseState,
    }

    impl ScriptedDisplay {
        fn new(log: &Log, polls_until_close: u32) -> Self {
            Self {
                log: log.clone(),
                polls_until_close,
                fail_init: false,
                closed: polls_until_close == 0,
                keyboard: KeyboardState::new(),
                mouse: MouseState::new(),
            }
        }
    }

    impl DisplaySurface for ScriptedDisplay {
        fn init(&mut self) -> Result<(), DisplayError> {
            self.log.borrow_mut().push("display.init".into());
            if self.fail_init {
                return Err(DisplayError::Creation("no adapter".into()));
            }
            Ok(())
        }
        fn destroy(&mut self) {
            self.log.borrow_mut().push("display.destroy".into());
        }
        fn should_close(&self) -> bool {
            self.closed
        }
        fn request_close(&mut self) {
            self.closed = true;
        }
        fn size(&self) -> (u32, u32) {
            (640, 480)
        }
        fn take_resized(&mut self) -> bool {
            false
        }
        fn swap_buffers(&mut self) {
            self.log.borrow_mut().push("swap".into());
        }
        fn poll_events(&mut self) {
            self.log.borrow_mut().push("poll".into());
            self.polls_until_close = self.polls_until_close.saturating_sub(1);
            if self.polls_until_close == 0 {
                self.closed = true;
            }
        }
        fn keyboard(&self) -> &KeyboardState {
            &self.keyboard
        }
        fn mouse(&self) -> &MouseState {
            &self.mouse
        }
        fn take_mouse_displacement(&mut self) -> Vec2 {
            self.mouse.take_displacement()
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("scripted failure")]
    struct ScriptedFailure;

    struct RecordingGame {
        log: Log,
        fail_init: bool,
        fail_render_at: Option<usize>,
        renders: usize,
    }

    impl RecordingGame {
        fn new(log: &Log) -> Self {
            Self {
                log: log.clone(),
                fail_init: false,
                fail_render_at: None,
                renders: 0,
            }
        }
    }

    impl GameLogic<ScriptedDisplay> for RecordingGame {
        type Error = ScriptedFailure;

        fn init(&mut self, _display: &mut ScriptedDisplay) -> Result<(), ScriptedFailure> {
            self.log.borrow_mut().push("init".into());
            if self.fail_init {
                return Err(ScriptedFailure);
            }
            Ok(())
        }
        fn input(&mut self, _display: &mut ScriptedDisplay) {
            self.log.borrow_mut().push("input".into());
        }
        fn update(&mut self, interval: f32) {
            self.log.borrow_mut().push(format!("update {interval}"));
        }
        fn render(&mut self, _display: &mut ScriptedDisplay) -> Result<(), ScriptedFailure> {
            self.log.borrow_mut().push("render".into());
            self.renders += 1;
            if self.fail_render_at == Some(self.renders) {
                return Err(ScriptedFailure);
            }
            Ok(())
        }
        fn cleanup(&mut self, _display: &mut ScriptedDisplay) {
            self.log.borrow_mut().push("cleanup".into());
        }
    }

    struct ScriptedDelta(VecDeque<f64>);

    impl ScriptedDelta {
        fn new(deltas: &[f64]) -> Self {
            Self(deltas.iter().copied().collect())
        }
    }

    impl DeltaSource for ScriptedDelta {
        fn delta(&mut self) -> f64 {
            self.0.pop_front().unwrap_or(0.0)
        }
    }

    fn config(target_ups: u32) -> EngineConfig {
        EngineConfig {
            target_ups,
            ..EngineConfig::default()
        }
    }

    fn count(log: &Log, entry: &str) -> usize {
        log.borrow().iter().filter(|e| *e == entry).count()
    }

    #[test]
    fn iteration_order_and_tick_counts() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 3);
        let game = RecordingGame::new(&log);
        // 4 updates per second: 0.25 s ticks.
        let stats = GameEngine::new(config(4), display, game)
            .with_delta_source(ScriptedDelta::new(&[0.125, 0.5, 0.375]))
            .run()
            .unwrap();

        assert_eq!(
            stats,
            LoopStats {
                iterations: 3,
                updates: 4
            }
        );

        let expected = [
            "display.init",
            "init",
            // 0.125 accumulated
            "input",
            "render",
            "swap",
            "poll",
            // 0.625 accumulated
            "input",
            "update 0.25",
            "update 0.25",
            "render",
            "swap",
            "poll",
            // 0.5 accumulated
            "input",
            "update 0.25",
            "update 0.25",
            "render",
            "swap",
            "poll",
            "cleanup",
            "display.destroy",
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn renders_once_per_iteration_regardless_of_ticks() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 5);
        let game = RecordingGame::new(&log);
        let stats = GameEngine::new(config(30), display, game)
            .with_delta_source(ScriptedDelta::new(&[0.0, 2.0, 0.0, 0.001, 0.1]))
            .run()
            .unwrap();

        assert_eq!(stats.iterations, 5);
        assert_eq!(count(&log, "render"), 5);
        assert_eq!(count(&log, "swap"), 5);
        let tick = format!("update {}", (1.0f64 / 30.0) as f32);
        assert_eq!(stats.updates as usize, count(&log, &tick));
        assert!(stats.updates >= 60);
    }

    #[test]
    fn catch_up_cap_limits_ticks() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 1);
        let game = RecordingGame::new(&log);
        let config = EngineConfig {
            target_ups: 4,
            max_catch_up_ticks: Some(3),
            ..EngineConfig::default()
        };
        let stats = GameEngine::new(config, display, game)
            .with_delta_source(ScriptedDelta::new(&[10.0]))
            .run()
            .unwrap();
        assert_eq!(stats.updates, 3);
    }

    #[test]
    fn already_closed_display_runs_no_frames() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 0);
        let game = RecordingGame::new(&log);
        let stats = GameEngine::new(config(30), display, game)
            .with_delta_source(ScriptedDelta::new(&[]))
            .run()
            .unwrap();

        assert_eq!(stats, LoopStats::default());
        assert_eq!(
            *log.borrow(),
            ["display.init", "init", "cleanup", "display.destroy"]
        );
    }

    #[test]
    fn init_failure_still_cleans_up_once() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 3);
        let mut game = RecordingGame::new(&log);
        game.fail_init = true;
        let err = GameEngine::new(config(30), display, game)
            .with_delta_source(ScriptedDelta::new(&[]))
            .run()
            .unwrap_err();

        assert!(matches!(err, EngineError::Init(_)));
        assert_eq!(count(&log, "render"), 0);
        assert_eq!(count(&log, "cleanup"), 1);
        assert_eq!(count(&log, "display.destroy"), 1);
    }

    #[test]
    fn display_failure_skips_game_init() {
        let log = Log::default();
        let mut display = ScriptedDisplay::new(&log, 3);
        display.fail_init = true;
        let game = RecordingGame::new(&log);
        let err = GameEngine::new(config(30), display, game).run().unwrap_err();

        assert!(matches!(err, EngineError::Display(DisplayError::Creation(_))));
        assert_eq!(count(&log, "init"), 0);
        assert_eq!(count(&log, "cleanup"), 1);
        assert_eq!(count(&log, "display.destroy"), 1);
    }

    #[test]
    fn render_failure_stops_the_loop() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 10);
        let mut game = RecordingGame::new(&log);
        game.fail_render_at = Some(2);
        let err = GameEngine::new(config(30), display, game)
            .with_delta_source(ScriptedDelta::new(&[]))
            .run()
            .unwrap_err();

        assert!(matches!(err, EngineError::Frame(_)));
        assert_eq!(count(&log, "render"), 2);
        // The failing frame is never presented.
        assert_eq!(count(&log, "swap"), 1);
        assert_eq!(count(&log, "cleanup"), 1);
        assert_eq!(count(&log, "display.destroy"), 1);
    }

    #[test]
    fn invalid_config_rejected_before_display_init() {
        let log = Log::default();
        let display = ScriptedDisplay::new(&log, 3);
        let game = RecordingGame::new(&log);
        let err = GameEngine::new(config(0), display, game).run().unwrap_err();

        assert!(matches!(err, EngineError::Config(ConfigError::Invalid(_))));
        assert_eq!(count(&log, "display.init"), 0);
        assert_eq!(count(&log, "display.destroy"), 1);
    }
}
