use std::cell::{Cell, RefCell};

use chrono::Local;

use super::events::{SessionEvent, SessionObserver, SessionSnapshot, StatusTone};
use super::{BusyGuard, Session, SessionState};
use crate::camera::{CameraAcquirer, CameraBackend, CameraStatus, StreamRequest};
use crate::capture::FrameCapturer;
use crate::config::{BoothConfig, CameraPolicy};
use crate::error::{BoothError, Result};
use crate::overlay::{Overlay, OverlayCatalog};
use crate::strip::{PhotoStrip, StripAssembler};

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Delivered(PhotoStrip),
    /// Another session was running; nothing happened.
    AlreadyRunning,
}

/// Drives one capture session at a time: countdowns, captures, assembly.
///
/// All methods take `&self` so the host can keep issuing requests (start,
/// reset, overlay changes) while a session is suspended at a timer. The
/// session's busy flag is the only mutual exclusion.
pub struct SessionController<B: CameraBackend> {
    config: BoothConfig,
    camera: CameraAcquirer<B>,
    overlays: RefCell<OverlayCatalog>,
    capturer: FrameCapturer,
    assembler: StripAssembler,
    session: Session,
    state: Cell<SessionState>,
    observer: Box<dyn SessionObserver>,
}

impl<B: CameraBackend> SessionController<B> {
    pub fn new(config: BoothConfig, backend: B, observer: Box<dyn SessionObserver>) -> Result<Self> {
        config.validate()?;

        let overlays = OverlayCatalog::new(
            config.overlays.assets_dir.clone(),
            config.overlays.frames.clone(),
        )?;
        let camera = CameraAcquirer::new(
            backend,
            StreamRequest::from(&config.camera),
            std::time::Duration::from_millis(config.camera.metadata_timeout_ms),
        );

        Ok(Self {
            capturer: FrameCapturer::from_config(&config),
            assembler: StripAssembler::from_config(&config),
            overlays: RefCell::new(overlays),
            camera,
            config,
            session: Session::default(),
            state: Cell::new(SessionState::Idle),
            observer,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn shots_taken(&self) -> usize {
        self.session.shots_taken()
    }

    /// The strip offered for download, if a session has completed.
    pub fn strip(&self) -> Option<PhotoStrip> {
        self.session.strip()
    }

    pub fn camera_ready(&self) -> bool {
        self.camera.is_ready()
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        self.overlays.borrow().overlays().to_vec()
    }

    pub fn selected_overlay(&self) -> usize {
        self.overlays.borrow().selected_index()
    }

    /// Explicit camera acquisition step.
    pub async fn begin(&self) -> CameraStatus {
        self.acquire_camera().await
    }

    pub fn select_overlay(&self, index: usize) -> Result<()> {
        let name = self.overlays.borrow_mut().select(index)?.name.clone();
        tracing::info!("Selected overlay {} ({})", index, name);
        self.emit(SessionEvent::OverlaySelected { index, name });
        Ok(())
    }

    /// Run a full session. A request while one is running is a no-op.
    ///
    /// On delivery the strip stays available through [`Self::strip`] and the
    /// controller is back in `Idle` when this returns.
    pub async fn start(&self) -> Result<StartOutcome> {
        if self.session.busy.replace(true) {
            tracing::debug!("Start ignored, a session is already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        let busy = BusyGuard(&self.session.busy);

        self.state.set(SessionState::AwaitingCamera);
        if let Err(e) = self.ensure_camera().await {
            self.state.set(SessionState::Idle);
            return Err(e);
        }

        self.session.clear();
        match self.run().await {
            Ok(strip) => {
                drop(busy);
                self.state.set(SessionState::Idle);
                self.status(StatusTone::Ok, "Done");
                Ok(StartOutcome::Delivered(strip))
            }
            Err(e) => {
                tracing::error!("Session failed: {}", e);
                self.session.clear();
                self.state.set(SessionState::Idle);
                self.status(StatusTone::Bad, "Capture failed");
                self.emit(SessionEvent::Alert(format!("Something went wrong: {}", e)));
                Err(e)
            }
        }
    }

    /// Discard the current strip and shots. Refused while a session runs.
    pub fn start_over(&self) -> Result<()> {
        if self.session.is_busy() {
            return Err(BoothError::SessionBusy);
        }

        self.session.clear();
        self.state.set(SessionState::Idle);
        self.emit(SessionEvent::Cleared);

        if self.camera.is_ready() {
            self.emit(SessionEvent::CameraReady);
            self.status(StatusTone::Ok, "Camera ready");
        } else {
            self.status(StatusTone::Warn, self.idle_prompt());
        }
        Ok(())
    }

    async fn ensure_camera(&self) -> Result<()> {
        match self.config.camera.policy {
            CameraPolicy::RequireBegin if !self.camera.is_ready() => {
                self.status(StatusTone::Warn, self.idle_prompt());
                self.emit(SessionEvent::Alert("Camera is not started. Tap Begin first.".into()));
                Err(BoothError::CameraNotStarted)
            }
            CameraPolicy::RequireBegin => Ok(()),
            CameraPolicy::AcquireOnStart => match self.acquire_camera().await {
                CameraStatus::Ready => Ok(()),
                CameraStatus::Blocked(reason) => Err(BoothError::CameraDenied(reason)),
            },
        }
    }

    async fn acquire_camera(&self) -> CameraStatus {
        let status = self.camera.acquire().await;
        match &status {
            CameraStatus::Ready => {
                self.emit(SessionEvent::CameraReady);
                self.status(StatusTone::Ok, "Camera ready");
            }
            CameraStatus::Blocked(_) => {
                self.emit(SessionEvent::CameraBlocked);
                self.status(StatusTone::Bad, "Camera blocked");
                self.emit(SessionEvent::Alert(
                    "Camera blocked. Allow camera access, then try again.".into(),
                ));
            }
        }
        status
    }

    async fn run(&self) -> Result<PhotoStrip> {
        let shots = self.config.shots;

        self.emit(SessionEvent::GetReady);
        self.status(StatusTone::Warn, "Capturing…");
        tokio::time::sleep(self.config.preroll()).await;

        for shot in 1..=shots {
            for remaining in (1..=self.config.countdown_seconds).rev() {
                self.state.set(SessionState::CountdownForShot { shot, remaining });
                self.emit(SessionEvent::Countdown { shot, remaining });
                tokio::time::sleep(self.config.tick()).await;
            }

            self.state.set(SessionState::Capturing { shot });
            self.emit(SessionEvent::CountdownFinished { shot });
            self.emit(SessionEvent::Flash { shot });

            let overlay = {
                let catalog = self.overlays.borrow();
                catalog.resolve(catalog.selected())
            };
            let still = self.capturer.capture(&self.camera, &overlay).await?;
            self.session.shots.borrow_mut().push(still);
            self.emit(SessionEvent::Captured { shot, total: shots });

            self.state.set(SessionState::InterShotPause { shot });
            tokio::time::sleep(self.config.inter_shot_pause()).await;
        }

        self.state.set(SessionState::Assembling);
        self.status(StatusTone::Warn, "Building strip…");
        self.emit(SessionEvent::Assembling);

        let stills = std::mem::take(&mut *self.session.shots.borrow_mut());
        if stills.len() != shots as usize {
            return Err(BoothError::Capture(format!(
                "expected {} stills, have {}",
                shots,
                stills.len()
            )));
        }
        let strip = self.assembler.assemble(&stills, Local::now()).await?;

        *self.session.strip.borrow_mut() = Some(strip.clone());
        self.state.set(SessionState::Delivered);
        self.emit(SessionEvent::Presented);
        tracing::info!("Session complete");
        Ok(strip)
    }

    fn idle_prompt(&self) -> &'static str {
        match self.config.camera.policy {
            CameraPolicy::RequireBegin => "Tap Begin",
            CameraPolicy::AcquireOnStart => "Tap Start",
        }
    }

    fn status(&self, tone: StatusTone, text: &str) {
        self.emit(SessionEvent::Status {
            tone,
            text: text.to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        let snapshot = SessionSnapshot {
            state: self.state.get(),
            busy: self.session.is_busy(),
            shots_taken: self.session.shots_taken(),
        };
        self.observer.on_event(&event, &snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayPolicy;
    use crate::overlay::Overlay;
    use crate::test_support::{FakeCamera, RecordingObserver};
    use std::time::Duration;

    fn config(policy: CameraPolicy) -> BoothConfig {
        let mut config = BoothConfig::default();
        config.camera.policy = policy;
        config.overlays.assets_dir = "/nonexistent".into();
        config.overlays.frames = vec![
            Overlay::new("First", "first.png"),
            Overlay::new("Second", "second.png"),
        ];
        config
    }

    fn controller(
        config: BoothConfig,
        camera: FakeCamera,
    ) -> (SessionController<FakeCamera>, RecordingObserver) {
        let observer = RecordingObserver::default();
        let controller =
            SessionController::new(config, camera, Box::new(observer.clone())).unwrap();
        (controller, observer)
    }

    fn camera() -> FakeCamera {
        FakeCamera::solid(160, 90, [40, 80, 120])
    }

    fn is_milestone(event: &SessionEvent) -> bool {
        matches!(
            event,
            SessionEvent::CountdownFinished { .. }
                | SessionEvent::Captured { .. }
                | SessionEvent::Assembling
                | SessionEvent::Presented
        )
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_runs_in_order() {
        let (controller, observer) = controller(config(CameraPolicy::RequireBegin), camera());
        assert!(controller.begin().await.is_ready());

        let outcome = controller.start().await.unwrap();
        let StartOutcome::Delivered(strip) = outcome else {
            panic!("session did not deliver");
        };

        let events = observer.events();
        let milestones: Vec<_> = events
            .iter()
            .map(|(e, _)| e.clone())
            .filter(is_milestone)
            .collect();
        assert_eq!(
            milestones,
            vec![
                SessionEvent::CountdownFinished { shot: 1 },
                SessionEvent::Captured { shot: 1, total: 3 },
                SessionEvent::CountdownFinished { shot: 2 },
                SessionEvent::Captured { shot: 2, total: 3 },
                SessionEvent::CountdownFinished { shot: 3 },
                SessionEvent::Captured { shot: 3, total: 3 },
                SessionEvent::Assembling,
                SessionEvent::Presented,
            ]
        );

        let countdowns: Vec<_> = events
            .iter()
            .filter_map(|(e, _)| match e {
                SessionEvent::Countdown { shot: 1, remaining } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(countdowns, vec![3, 2, 1]);

        // Busy from the get-ready prompt through presentation
        let first = events
            .iter()
            .position(|(e, _)| *e == SessionEvent::GetReady)
            .unwrap();
        let presented = events
            .iter()
            .position(|(e, _)| *e == SessionEvent::Presented)
            .unwrap();
        assert!(events[first..=presented].iter().all(|(_, s)| s.busy));
        // begin() happens outside any session, "Done" after the guard drops
        assert_eq!(events[0].0, SessionEvent::CameraReady);
        assert!(events[..first].iter().all(|(_, s)| !s.busy));
        assert!(!events[presented + 1..].is_empty());
        assert!(events[presented + 1..].iter().all(|(_, s)| !s.busy));
        assert_eq!(events[presented].1.state, SessionState::Delivered);
        assert_eq!(
            events.last().unwrap().0,
            SessionEvent::Status {
                tone: StatusTone::Ok,
                text: "Done".into()
            }
        );
        assert_eq!(controller.state(), SessionState::Idle);

        let assembling = events
            .iter()
            .find(|(e, _)| *e == SessionEvent::Assembling)
            .unwrap();
        assert_eq!(assembling.1.shots_taken, 3);

        assert!(!controller.is_busy());
        assert_eq!(controller.strip(), Some(strip));
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_busy_is_a_no_op() {
        let (controller, observer) = controller(config(CameraPolicy::RequireBegin), camera());
        controller.begin().await;

        let (first, second) = tokio::join!(controller.start(), controller.start());

        assert!(matches!(first.unwrap(), StartOutcome::Delivered(_)));
        assert_eq!(second.unwrap(), StartOutcome::AlreadyRunning);
        let presented = observer
            .events()
            .iter()
            .filter(|(e, _)| *e == SessionEvent::Presented)
            .count();
        assert_eq!(presented, 1);
        let captured = observer
            .events()
            .iter()
            .filter(|(e, _)| matches!(e, SessionEvent::Captured { .. }))
            .count();
        assert_eq!(captured, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_begin_aborts() {
        let (controller, observer) = controller(config(CameraPolicy::RequireBegin), camera());

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, BoothError::CameraNotStarted));
        assert!(!controller.is_busy());
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(observer
            .events()
            .iter()
            .all(|(e, _)| !matches!(e, SessionEvent::Captured { .. } | SessionEvent::Countdown { .. })));
        assert!(observer
            .events()
            .iter()
            .any(|(e, _)| matches!(e, SessionEvent::Alert(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_acquisition_on_start() {
        let (controller, observer) = controller(config(CameraPolicy::AcquireOnStart), camera());

        let outcome = controller.start().await.unwrap();

        assert!(matches!(outcome, StartOutcome::Delivered(_)));
        assert!(controller.camera_ready());
        assert_eq!(observer.events()[0].0, SessionEvent::CameraReady);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_camera_on_start_resets_busy() {
        let (controller, observer) =
            controller(config(CameraPolicy::AcquireOnStart), FakeCamera::denied());

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, BoothError::CameraDenied(_)));
        assert!(!controller.is_busy());
        assert!(observer
            .events()
            .iter()
            .any(|(e, _)| *e == SessionEvent::CameraBlocked));
        assert!(observer
            .events()
            .iter()
            .all(|(e, _)| !matches!(e, SessionEvent::Captured { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_failure_ends_session_without_strip() {
        let (controller, observer) = controller(
            config(CameraPolicy::RequireBegin),
            camera().failing_frames(),
        );
        controller.begin().await;

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, BoothError::Capture(_)));
        assert!(!controller.is_busy());
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.shots_taken(), 0);
        assert!(controller.strip().is_none());
        assert!(observer
            .events()
            .iter()
            .all(|(e, _)| *e != SessionEvent::Presented));
    }

    #[tokio::test(start_paused = true)]
    async fn strict_overlay_failure_ends_session() {
        let mut config = config(CameraPolicy::RequireBegin);
        config.overlays.policy = OverlayPolicy::Strict;
        let (controller, _observer) = controller(config, camera());
        controller.begin().await;

        let err = controller.start().await.unwrap_err();

        assert!(matches!(err, BoothError::OverlayLoad { .. }));
        assert!(!controller.is_busy());
        assert!(controller.strip().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_over_discards_strip() {
        let (controller, observer) = controller(config(CameraPolicy::RequireBegin), camera());
        controller.begin().await;
        controller.start().await.unwrap();
        assert!(controller.strip().is_some());

        controller.start_over().unwrap();

        assert!(controller.strip().is_none());
        assert_eq!(controller.shots_taken(), 0);
        assert_eq!(controller.state(), SessionState::Idle);
        let events = observer.events();
        let tail: Vec<_> = events.iter().rev().take(3).map(|(e, _)| e.clone()).collect();
        assert_eq!(
            tail,
            vec![
                SessionEvent::Status {
                    tone: StatusTone::Ok,
                    text: "Camera ready".into()
                },
                SessionEvent::CameraReady,
                SessionEvent::Cleared,
            ]
        );

        // The next session starts from zero shots
        controller.start().await.unwrap();
        let events = observer.events();
        let restart = events
            .iter()
            .rposition(|(e, _)| *e == SessionEvent::GetReady)
            .unwrap();
        assert_eq!(events[restart].1.shots_taken, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_over_refused_mid_session() {
        let (controller, _observer) = controller(config(CameraPolicy::RequireBegin), camera());
        controller.begin().await;

        let (outcome, reset) = tokio::join!(controller.start(), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            controller.start_over()
        });

        assert!(matches!(reset, Err(BoothError::SessionBusy)));
        assert!(matches!(outcome.unwrap(), StartOutcome::Delivered(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_selection() {
        let (controller, observer) = controller(config(CameraPolicy::RequireBegin), camera());

        let names: Vec<_> = controller.overlays().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["First", "Second"]);

        controller.select_overlay(1).unwrap();
        assert_eq!(controller.selected_overlay(), 1);
        assert!(controller.select_overlay(5).is_err());
        assert_eq!(controller.selected_overlay(), 1);
        assert_eq!(
            observer.events()[0].0,
            SessionEvent::OverlaySelected {
                index: 1,
                name: "Second".into()
            }
        );
    }
}
