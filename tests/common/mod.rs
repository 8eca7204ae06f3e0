//! Sample inputs shared by the integration tests and benches

#![allow(dead_code)]

/// Log-like text: repetitive enough for every codec to shrink it
pub fn log_lines(size: usize) -> Vec<u8> {
    let levels = ["INFO", "DEBUG", "WARN"];
    let mut data = Vec::with_capacity(size + 64);
    let mut line = 0usize;
    while data.len() < size {
        let entry = format!(
            "{:08} {} worker={} flushed block of {} bytes\n",
            line,
            levels[line % levels.len()],
            line % 16,
            (line * 4096) % 131_072
        );
        data.extend_from_slice(entry.as_bytes());
        line += 1;
    }
    data.truncate(size);
    data
}

/// Xorshift noise; close to incompressible
pub fn noise(size: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..size)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
