use crate::config::Settings;
use crate::links;
use crate::model::{ScanConfig, ScannerPhase, SessionState, TrackId, View};
use crate::resolver;
use crate::scanner::{DeviceEvent, DeviceSession, ScannerDevice};
use tracing::{debug, info, warn};

pub const CAMERA_ACCESS_MESSAGE: &str = "Allow camera access to scan cards";
pub const SCANNER_START_MESSAGE: &str = "Scanner failed to start. Try again.";
pub const DEVICE_LOST_MESSAGE: &str = "Camera stopped unexpectedly. Scan again.";

/// Owns the game state and the scanning device.
///
/// Every mutation goes through a command method or [`Self::handle_device_event`].
/// The device is driven with two pending slots, one for an in-flight acquisition
/// and one for an in-flight release, and every device event is matched against
/// those slots by [`DeviceSession`] so late events from an abandoned session are
/// dropped.
pub struct SessionController {
    state: SessionState,
    device: Box<dyn ScannerDevice>,
    scan_target: String,
    scan_config: ScanConfig,
    card_image_size: u32,
    last_session: u64,
    pending_acquire: Option<DeviceSession>,
    active: Option<DeviceSession>,
    pending_release: Option<DeviceSession>,
    deferred_start: bool,
    accepting: bool,
    pub status: String,
    pub dirty: bool,
}

impl SessionController {
    pub fn new(device: Box<dyn ScannerDevice>, settings: &Settings) -> Self {
        Self {
            state: SessionState::default(),
            device,
            scan_target: settings.scan_target.clone(),
            scan_config: settings.scan_config(),
            card_image_size: settings.card_image_size,
            last_session: 0,
            pending_acquire: None,
            active: None,
            pending_release: None,
            deferred_start: false,
            accepting: false,
            status: String::from("Ready"),
            dirty: true,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn pending_acquisition(&self) -> Option<DeviceSession> {
        self.pending_acquire
    }

    pub fn pending_release(&self) -> Option<DeviceSession> {
        self.pending_release
    }

    pub fn embed_url(&self) -> Option<String> {
        self.state.current_track.as_ref().map(links::embed_url)
    }

    /// A device session is acquired, being acquired, or queued behind a release.
    fn device_busy(&self) -> bool {
        self.pending_acquire.is_some() || self.active.is_some() || self.deferred_start
    }

    /// True while there is a scan the user can still cancel. Stays false while an
    /// accepted session is only waiting for its release.
    pub fn is_scanning(&self) -> bool {
        self.device_busy()
    }

    pub fn start_scan(&mut self) {
        if self.device_busy() {
            debug!(phase = ?self.state.scanner_phase, "start ignored, scanner already busy");
            return;
        }

        self.state.scan_error_message = None;
        self.state.scanner_phase = ScannerPhase::Starting;
        self.dirty = true;

        if let Some(releasing) = self.pending_release {
            info!(waiting_on = %releasing, "start deferred until previous release completes");
            self.deferred_start = true;
            self.status = String::from("Waiting for camera...");
            return;
        }

        self.begin_acquisition();
    }

    fn begin_acquisition(&mut self) {
        self.last_session += 1;
        let session = DeviceSession(self.last_session);
        self.pending_acquire = Some(session);
        self.accepting = false;
        self.state.scanner_phase = ScannerPhase::Starting;
        self.dirty = true;

        match self
            .device
            .acquire(session, &self.scan_target, &self.scan_config)
        {
            Ok(()) => {
                info!(%session, device = self.device.name(), "scanner acquisition requested");
                self.status = String::from("Starting camera...");
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(%session, %error, "scanner acquisition could not start");
                self.pending_acquire = None;
                self.state.scanner_phase = ScannerPhase::Error;
                self.state.scan_error_message = Some(String::from(SCANNER_START_MESSAGE));
                self.status = String::from(SCANNER_START_MESSAGE);
            }
        }
    }

    pub fn stop_scan(&mut self) {
        if let Some(session) = self.pending_acquire.take() {
            info!(%session, "cancelling scanner acquisition");
            self.accepting = false;
            self.state.scanner_phase = ScannerPhase::Idle;
            self.status = String::from("Scan cancelled");
            self.request_release(session);
        } else if let Some(session) = self.active.take() {
            info!(%session, "stopping scanner");
            self.accepting = false;
            self.status = String::from("Scan cancelled");
            self.request_release(session);
        } else if self.deferred_start {
            info!("dropping deferred scanner start");
            self.deferred_start = false;
            self.state.scanner_phase = ScannerPhase::Idle;
            self.status = String::from("Scan cancelled");
        } else {
            debug!(phase = ?self.state.scanner_phase, "stop ignored, no scanner session");
            return;
        }
        self.dirty = true;
    }

    fn request_release(&mut self, session: DeviceSession) {
        if let Some(previous) = self.pending_release.replace(session) {
            debug!(%previous, %session, "release already pending, tracking newest");
        }
        self.device.release(session);
    }

    pub fn reveal(&mut self) {
        if self.state.current_track.is_none() || self.state.revealed {
            return;
        }
        self.state.revealed = true;
        self.status = String::from("Revealed");
        self.dirty = true;
    }

    pub fn draw_next_card(&mut self) {
        if self.state.current_track.is_none() {
            return;
        }
        self.clear_round();
        self.status = String::from("Draw a card and scan it");
    }

    pub fn rescan(&mut self) {
        if self.state.current_track.is_none() {
            return;
        }
        self.clear_round();
        self.start_scan();
    }

    fn clear_round(&mut self) {
        self.state.current_track = None;
        self.state.revealed = false;
        self.dirty = true;
    }

    pub fn navigate(&mut self, view: View) {
        if self.state.view == view {
            return;
        }
        if self.state.view == View::Game {
            if self.device_busy() {
                self.stop_scan();
            }
            if view == View::Home {
                self.clear_round();
            }
        }
        debug!(from = ?self.state.view, to = ?view, "navigate");
        self.state.view = view;
        self.dirty = true;
    }

    /// Loads a track from a typed or pasted card link instead of the camera.
    pub fn enter_track(&mut self, input: &str) {
        match resolver::resolve(input.trim()) {
            Ok(id) => {
                if self.device_busy() {
                    self.stop_scan();
                }
                info!(track = %id, "track entered manually");
                self.accept_track(id);
            }
            Err(rejection) => {
                debug!(%rejection, "manual track entry rejected");
                self.status = String::from("Not a track link");
                self.dirty = true;
            }
        }
    }

    fn accept_track(&mut self, id: TrackId) {
        self.state.current_track = Some(id);
        self.state.revealed = false;
        self.state.scan_error_message = None;
        self.status = String::from("Card loaded. Listen and guess!");
        self.dirty = true;
    }

    /// Creator flow: builds the printable card image link for a pasted track link.
    pub fn create_card(&mut self, input: &str) {
        self.state.creator_input = input.to_string();
        self.dirty = true;

        let id = match resolver::resolve(input.trim()) {
            Ok(id) => id,
            Err(rejection) => {
                debug!(%rejection, "card input rejected");
                self.status = String::from("Invalid track link");
                return;
            }
        };

        match links::card_image_url(&id, self.card_image_size) {
            Ok(url) => {
                info!(track = %id, "card generated");
                self.state.generated_card_image = Some(url);
                self.status = String::from("Card ready");
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(track = %id, %error, "card url failed");
                self.status = format!("card error: {error}");
            }
        }
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Acquired { session } => self.on_acquired(session),
            DeviceEvent::AcquireFailed { session, reason } => {
                self.on_acquire_failed(session, &reason)
            }
            DeviceEvent::Decoded { session, text } => self.on_decoded(session, &text),
            DeviceEvent::Lost { session, reason } => self.on_lost(session, &reason),
            DeviceEvent::Released { session, result } => self.on_released(session, result),
        }
    }

    fn on_acquired(&mut self, session: DeviceSession) {
        if self.pending_acquire != Some(session) {
            debug!(%session, "stale acquisition ignored");
            return;
        }
        info!(%session, "scanner running");
        self.pending_acquire = None;
        self.active = Some(session);
        self.accepting = true;
        self.state.scanner_phase = ScannerPhase::Running;
        self.status = String::from("Scanning... hold the card in view");
        self.dirty = true;
    }

    fn on_acquire_failed(&mut self, session: DeviceSession, reason: &str) {
        if self.pending_acquire != Some(session) {
            debug!(%session, reason, "stale acquisition failure ignored");
            return;
        }
        warn!(%session, reason, "scanner acquisition failed");
        self.pending_acquire = None;
        self.state.scanner_phase = ScannerPhase::Error;
        self.state.scan_error_message = Some(String::from(CAMERA_ACCESS_MESSAGE));
        self.status = String::from(CAMERA_ACCESS_MESSAGE);
        self.dirty = true;
        self.request_release(session);
    }

    fn on_decoded(&mut self, session: DeviceSession, text: &str) {
        if self.active != Some(session)
            || !self.accepting
            || self.state.scanner_phase != ScannerPhase::Running
        {
            debug!(%session, "decode outside an accepting session dropped");
            return;
        }

        let id = match resolver::resolve(text) {
            Ok(id) => id,
            Err(rejection) => {
                debug!(%session, %rejection, "decode rejected, still scanning");
                return;
            }
        };

        // Close the session before asking the device to let go, so anything the
        // device emits until the release lands is dropped above.
        self.accepting = false;
        self.active = None;
        info!(%session, track = %id, "card scanned");
        self.accept_track(id);
        self.request_release(session);
    }

    fn on_lost(&mut self, session: DeviceSession, reason: &str) {
        if self.active != Some(session) {
            debug!(%session, reason, "stale device loss ignored");
            return;
        }
        warn!(%session, reason, "scanner lost");
        self.active = None;
        self.accepting = false;
        self.state.scanner_phase = ScannerPhase::Error;
        self.state.scan_error_message = Some(String::from(DEVICE_LOST_MESSAGE));
        self.status = String::from(DEVICE_LOST_MESSAGE);
        self.dirty = true;
        self.request_release(session);
    }

    fn on_released(&mut self, session: DeviceSession, result: Result<(), String>) {
        if let Err(err) = &result {
            warn!(%session, error = %err, "scanner release failed");
        }
        if self.pending_release != Some(session) {
            debug!(%session, "release for untracked session");
            return;
        }
        debug!(%session, "scanner released");
        self.pending_release = None;
        self.dirty = true;

        if self.deferred_start {
            self.deferred_start = false;
            self.begin_acquisition();
        } else if self.state.scanner_phase == ScannerPhase::Running {
            self.state.scanner_phase = ScannerPhase::Stopped;
        }
    }

    /// Lets go of every device session. Completion events are not awaited.
    pub fn shutdown(&mut self) {
        self.deferred_start = false;
        if let Some(session) = self.pending_acquire.take() {
            self.device.release(session);
        }
        if let Some(session) = self.active.take() {
            self.device.release(session);
        }
        self.accepting = false;
        info!("session controller shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use std::cell::RefCell;
    use std::rc::Rc;

    const ID: &str = "4uLU6hMCjMI75M1A2tKUQC";
    const URI: &str = "spotify:track:4uLU6hMCjMI75M1A2tKUQC";
    const OTHER_URI: &str = "spotify:track:7qiZfU4dY1lWllzX7mPBI3";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Acquire(DeviceSession),
        Release(DeviceSession),
    }

    #[derive(Default)]
    struct Log {
        calls: Vec<Call>,
        refuse: bool,
    }

    struct RecordingScanner {
        log: Rc<RefCell<Log>>,
    }

    impl ScannerDevice for RecordingScanner {
        fn acquire(
            &mut self,
            session: DeviceSession,
            _target: &str,
            _config: &ScanConfig,
        ) -> Result<()> {
            let mut log = self.log.borrow_mut();
            if log.refuse {
                bail!("no camera");
            }
            log.calls.push(Call::Acquire(session));
            Ok(())
        }

        fn release(&mut self, session: DeviceSession) {
            self.log.borrow_mut().calls.push(Call::Release(session));
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn controller() -> (SessionController, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let device = RecordingScanner {
            log: Rc::clone(&log),
        };
        let mut controller = SessionController::new(Box::new(device), &Settings::default());
        controller.navigate(View::Game);
        (controller, log)
    }

    fn acquisitions(log: &Rc<RefCell<Log>>) -> Vec<DeviceSession> {
        log.borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Acquire(session) => Some(*session),
                Call::Release(_) => None,
            })
            .collect()
    }

    fn releases(log: &Rc<RefCell<Log>>) -> Vec<DeviceSession> {
        log.borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Release(session) => Some(*session),
                Call::Acquire(_) => None,
            })
            .collect()
    }

    fn running(controller: &mut SessionController) -> DeviceSession {
        controller.start_scan();
        let session = controller.pending_acquisition().expect("pending acquisition");
        controller.handle_device_event(DeviceEvent::Acquired { session });
        session
    }

    fn decode(controller: &mut SessionController, session: DeviceSession, text: &str) {
        controller.handle_device_event(DeviceEvent::Decoded {
            session,
            text: text.to_string(),
        });
    }

    #[test]
    fn starts_at_defaults() {
        let (controller, _) = controller();
        let state = controller.state();
        assert_eq!(state.scanner_phase, ScannerPhase::Idle);
        assert_eq!(state.current_track, None);
        assert!(!state.revealed);
        assert_eq!(state.scan_error_message, None);
        assert_eq!(state.generated_card_image, None);
    }

    #[test]
    fn double_start_requests_one_acquisition() {
        let (mut controller, log) = controller();
        controller.start_scan();
        controller.start_scan();
        assert_eq!(acquisitions(&log).len(), 1);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);

        let session = controller.pending_acquisition().expect("pending");
        controller.handle_device_event(DeviceEvent::Acquired { session });
        controller.start_scan();
        assert_eq!(acquisitions(&log).len(), 1);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Running);
    }

    #[test]
    fn acquisition_failure_is_recoverable() {
        let (mut controller, log) = controller();
        controller.start_scan();
        let session = controller.pending_acquisition().expect("pending");
        controller.handle_device_event(DeviceEvent::AcquireFailed {
            session,
            reason: String::from("permission denied"),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Error);
        assert_eq!(
            controller.state().scan_error_message.as_deref(),
            Some(CAMERA_ACCESS_MESSAGE)
        );

        assert_eq!(releases(&log), vec![session]);
        controller.handle_device_event(DeviceEvent::Released {
            session,
            result: Ok(()),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Error);

        controller.start_scan();
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);
        assert_eq!(controller.state().scan_error_message, None);
        assert_eq!(acquisitions(&log).len(), 2);
    }

    #[test]
    fn every_failed_acquisition_is_released() {
        let (mut controller, log) = controller();
        let mut failed = Vec::new();
        for _ in 0..5 {
            controller.start_scan();
            let session = controller.pending_acquisition().expect("pending");
            controller.handle_device_event(DeviceEvent::AcquireFailed {
                session,
                reason: String::from("decoder missing"),
            });
            controller.handle_device_event(DeviceEvent::Released {
                session,
                result: Ok(()),
            });
            failed.push(session);
        }
        assert_eq!(releases(&log), failed);
        assert_eq!(acquisitions(&log), failed);
        assert_eq!(controller.pending_release(), None);
    }

    #[test]
    fn retry_right_after_failure_waits_for_release() {
        let (mut controller, log) = controller();
        controller.start_scan();
        let first = controller.pending_acquisition().expect("pending");
        controller.handle_device_event(DeviceEvent::AcquireFailed {
            session: first,
            reason: String::from("denied"),
        });
        controller.start_scan();
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);
        assert_eq!(acquisitions(&log), vec![first]);

        controller.handle_device_event(DeviceEvent::Released {
            session: first,
            result: Ok(()),
        });
        assert_eq!(acquisitions(&log).len(), 2);
    }

    #[test]
    fn immediate_acquire_error_sets_start_message() {
        let (mut controller, log) = controller();
        log.borrow_mut().refuse = true;
        controller.start_scan();
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Error);
        assert_eq!(
            controller.state().scan_error_message.as_deref(),
            Some(SCANNER_START_MESSAGE)
        );
        assert_eq!(controller.pending_acquisition(), None);
    }

    #[test]
    fn rejected_decodes_keep_scanning() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        decode(&mut controller, session, "hello world");
        decode(&mut controller, session, "https://open.spotify.com/track/");
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Running);
        assert_eq!(controller.state().current_track, None);
        assert_eq!(controller.state().scan_error_message, None);
        assert!(releases(&log).is_empty());
    }

    #[test]
    fn accepted_decode_releases_and_stops() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        decode(&mut controller, session, URI);

        assert_eq!(
            controller.state().current_track.as_ref().map(TrackId::as_str),
            Some(ID)
        );
        assert!(!controller.is_accepting());
        assert!(!controller.is_scanning());
        assert_eq!(releases(&log), vec![session]);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Running);

        controller.handle_device_event(DeviceEvent::Released {
            session,
            result: Ok(()),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Stopped);
        assert_eq!(controller.pending_release(), None);
    }

    #[test]
    fn late_decode_does_not_overwrite_accepted_track() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        decode(&mut controller, session, URI);
        decode(&mut controller, session, OTHER_URI);

        assert_eq!(
            controller.state().current_track.as_ref().map(TrackId::as_str),
            Some(ID)
        );
        assert_eq!(releases(&log), vec![session]);
    }

    #[test]
    fn release_failure_is_swallowed() {
        let (mut controller, _) = controller();
        let session = running(&mut controller);
        decode(&mut controller, session, URI);
        controller.handle_device_event(DeviceEvent::Released {
            session,
            result: Err(String::from("device busy")),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Stopped);
        assert_eq!(controller.state().scan_error_message, None);
        assert!(controller.state().current_track.is_some());
    }

    #[test]
    fn stop_before_acquisition_goes_idle_and_ignores_late_events() {
        let (mut controller, log) = controller();
        controller.start_scan();
        let session = controller.pending_acquisition().expect("pending");
        controller.stop_scan();

        assert_eq!(controller.state().scanner_phase, ScannerPhase::Idle);
        assert_eq!(releases(&log), vec![session]);

        controller.handle_device_event(DeviceEvent::Acquired { session });
        decode(&mut controller, session, URI);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Idle);
        assert_eq!(controller.state().current_track, None);

        controller.handle_device_event(DeviceEvent::Released {
            session,
            result: Ok(()),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Idle);
    }

    #[test]
    fn stop_while_running_stops_on_release() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        controller.stop_scan();
        assert_eq!(releases(&log), vec![session]);
        decode(&mut controller, session, URI);
        assert_eq!(controller.state().current_track, None);

        controller.handle_device_event(DeviceEvent::Released {
            session,
            result: Ok(()),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Stopped);
    }

    #[test]
    fn stop_without_session_is_noop() {
        let (mut controller, log) = controller();
        controller.stop_scan();
        assert!(log.borrow().calls.is_empty());
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Idle);
    }

    #[test]
    fn reveal_requires_track() {
        let (mut controller, _) = controller();
        controller.reveal();
        assert!(!controller.state().revealed);

        controller.enter_track(ID);
        controller.reveal();
        assert!(controller.state().revealed);
    }

    #[test]
    fn draw_next_card_clears_track_and_reveal_together() {
        let (mut controller, _) = controller();
        controller.enter_track(URI);
        controller.reveal();
        controller.draw_next_card();
        assert_eq!(controller.state().current_track, None);
        assert!(!controller.state().revealed);
    }

    #[test]
    fn rescan_clears_round_and_starts() {
        let (mut controller, log) = controller();
        controller.enter_track(URI);
        controller.reveal();
        controller.rescan();

        assert_eq!(controller.state().current_track, None);
        assert!(!controller.state().revealed);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);
        assert_eq!(acquisitions(&log).len(), 1);
    }

    #[test]
    fn rescan_waits_for_pending_release() {
        let (mut controller, log) = controller();
        let first = running(&mut controller);
        decode(&mut controller, first, URI);
        controller.rescan();

        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);
        assert_eq!(acquisitions(&log), vec![first]);

        controller.handle_device_event(DeviceEvent::Released {
            session: first,
            result: Ok(()),
        });
        let second = controller.pending_acquisition().expect("deferred start issued");
        assert_ne!(first, second);
        assert_eq!(acquisitions(&log), vec![first, second]);
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Starting);
    }

    #[test]
    fn leaving_game_while_running_releases_device() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        controller.navigate(View::Creator);
        assert_eq!(releases(&log), vec![session]);
        assert_eq!(controller.state().view, View::Creator);
        assert!(!controller.is_accepting());
    }

    #[test]
    fn returning_home_ends_round() {
        let (mut controller, _) = controller();
        controller.enter_track(URI);
        controller.reveal();
        controller.navigate(View::Home);
        assert_eq!(controller.state().current_track, None);
        assert!(!controller.state().revealed);
    }

    #[test]
    fn manual_entry_stops_active_scan() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        controller.enter_track(OTHER_URI);
        assert_eq!(releases(&log), vec![session]);
        decode(&mut controller, session, URI);
        assert_eq!(
            controller.state().current_track.as_ref().map(TrackId::as_str),
            Some("7qiZfU4dY1lWllzX7mPBI3")
        );
    }

    #[test]
    fn lost_device_surfaces_error() {
        let (mut controller, log) = controller();
        let session = running(&mut controller);
        controller.handle_device_event(DeviceEvent::Lost {
            session,
            reason: String::from("exited"),
        });
        assert_eq!(controller.state().scanner_phase, ScannerPhase::Error);
        assert_eq!(
            controller.state().scan_error_message.as_deref(),
            Some(DEVICE_LOST_MESSAGE)
        );
        assert_eq!(releases(&log), vec![session]);
    }

    #[test]
    fn creator_builds_card_image() {
        let (mut controller, _) = controller();
        controller.navigate(View::Creator);
        controller.create_card("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x");
        assert_eq!(
            controller.state().generated_card_image.as_deref(),
            Some(
                "https://api.qrserver.com/v1/create-qr-code/?size=400x400&data=https%3A%2F%2Fopen.spotify.com%2Ftrack%2F4uLU6hMCjMI75M1A2tKUQC"
            )
        );

        controller.create_card("not a link");
        assert!(controller.state().generated_card_image.is_some());
        assert_eq!(controller.status, "Invalid track link");
        assert_eq!(controller.state().current_track, None);
    }

    #[test]
    fn shutdown_releases_in_flight_acquisition() {
        let (mut controller, log) = controller();
        controller.start_scan();
        let session = controller.pending_acquisition().expect("pending");
        controller.shutdown();
        assert_eq!(releases(&log), vec![session]);
    }

    proptest::proptest! {
        #[test]
        fn invariants_hold_after_random_ops(ops in proptest::collection::vec(0u8..12, 1..200)) {
            let (mut controller, log) = controller();
            let mut last_seen = DeviceSession(0);

            for op in ops {
                let issued_before = acquisitions(&log).len();
                if let Some(session) = controller.pending_acquisition() {
                    last_seen = session;
                }
                match op {
                    0 => controller.start_scan(),
                    1 => controller.stop_scan(),
                    2 => controller.reveal(),
                    3 => controller.draw_next_card(),
                    4 => controller.rescan(),
                    5 => controller.navigate(View::Home),
                    6 => controller.navigate(View::Game),
                    7 => controller.handle_device_event(DeviceEvent::Acquired { session: last_seen }),
                    8 => decode(&mut controller, last_seen, URI),
                    9 => decode(&mut controller, last_seen, "garbage"),
                    10 => controller.handle_device_event(DeviceEvent::Released { session: last_seen, result: Ok(()) }),
                    _ => controller.handle_device_event(DeviceEvent::AcquireFailed { session: last_seen, reason: String::from("denied") }),
                }

                let state = controller.state();
                proptest::prop_assert!(!state.revealed || state.current_track.is_some());
                if state.scanner_phase == ScannerPhase::Error {
                    proptest::prop_assert!(state.scan_error_message.is_some());
                }
                if controller.is_accepting() {
                    proptest::prop_assert_eq!(state.scanner_phase, ScannerPhase::Running);
                }
                if acquisitions(&log).len() > issued_before {
                    proptest::prop_assert_eq!(controller.pending_release(), None);
                }
            }
        }
    }
}
