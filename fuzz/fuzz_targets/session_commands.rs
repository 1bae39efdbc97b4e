#![no_main]

use bellaster::config::Settings;
use bellaster::model::View;
use bellaster::resolver::resolve;
use bellaster::scanner::{DeviceEvent, DeviceSession, NullScanner};
use bellaster::session::SessionController;
use libfuzzer_sys::fuzz_target;
use std::sync::mpsc;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let _ = resolve(&text);

    let (tx, rx) = mpsc::channel();
    let mut controller = SessionController::new(Box::new(NullScanner::new(tx)), &Settings::default());
    controller.navigate(View::Game);

    for byte in data {
        let session = DeviceSession(u64::from(byte >> 4));
        match byte % 10 {
            0 => controller.start_scan(),
            1 => controller.stop_scan(),
            2 => controller.reveal(),
            3 => controller.draw_next_card(),
            4 => controller.rescan(),
            5 => controller.navigate(View::Home),
            6 => controller.navigate(View::Game),
            7 => controller.handle_device_event(DeviceEvent::Acquired { session }),
            8 => controller.handle_device_event(DeviceEvent::Decoded {
                session,
                text: text.to_string(),
            }),
            _ => {
                while let Ok(event) = rx.try_recv() {
                    controller.handle_device_event(event);
                }
            }
        }
        assert!(!controller.state().revealed || controller.state().current_track.is_some());
    }
});
