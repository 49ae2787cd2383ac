#![no_main]

use libfuzzer_sys::fuzz_target;
use sluice_core::flags::PollEvents;
use sluice_core::monitor::{MonitorEvent, EVENT_FRAME_LEN};

fuzz_target!(|data: &[u8]| {
    // Event frame followed by an arbitrary address frame
    let split = data.len().min(EVENT_FRAME_LEN);
    let (frame, rest) = data.split_at(split);
    let address = String::from_utf8_lossy(rest);

    match MonitorEvent::parse(frame, &address) {
        Ok(event) => {
            assert_eq!(frame.len(), EVENT_FRAME_LEN);
            assert_eq!(event.event.to_raw(), u16::from_le_bytes([frame[0], frame[1]]));
            let _ = event.to_string();
        }
        Err(_) => assert_ne!(frame.len(), EVENT_FRAME_LEN),
    }

    if data.len() >= 2 {
        let events = PollEvents::from_bits(i16::from_le_bytes([data[0], data[1]]));
        let _ = events.to_string();
    }
});
