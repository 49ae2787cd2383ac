#![no_main]

use libfuzzer_sys::fuzz_target;
use sluice_core::pool::NativeBufferPool;

// Each input is a sequence of (rent size, keep) operations.
fuzz_target!(|data: &[u8]| {
    let pool = NativeBufferPool::new();
    let mut held = Vec::new();

    for chunk in data.chunks(3) {
        if chunk.len() < 3 {
            break;
        }
        let size = usize::from(u16::from_le_bytes([chunk[0], chunk[1]])) * 16;
        let mut buffer = pool.rent(size);
        assert!(buffer.capacity() >= size);
        buffer.as_mut_slice()[..size].fill(chunk[2]);
        if chunk[2] & 1 == 0 {
            pool.release(buffer);
        } else {
            held.push(buffer);
        }
    }

    for buffer in held {
        pool.release(buffer);
    }
    let stats = pool.statistics();
    assert_eq!(stats.outstanding, 0);
});
