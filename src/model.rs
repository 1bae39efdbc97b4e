use std::fmt;

pub const TRACK_ID_LEN: usize = 22;

/// Canonical track token. Only the resolver constructs one, so every value in
/// circulation has already been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub(crate) fn new(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Game,
    Creator,
}

impl View {
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Game => "Game",
            Self::Creator => "Card factory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScannerPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Error,
    Stopped,
}

impl ScannerPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "scanning",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBox {
    pub width: u32,
    pub height: u32,
}

/// Options handed to the scanning device on acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub fps: u32,
    pub scan_box: ScanBox,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            scan_box: ScanBox {
                width: 250,
                height: 250,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub view: View,
    pub scanner_phase: ScannerPhase,
    pub current_track: Option<TrackId>,
    pub revealed: bool,
    pub scan_error_message: Option<String>,
    pub generated_card_image: Option<String>,
    pub creator_input: String,
}
