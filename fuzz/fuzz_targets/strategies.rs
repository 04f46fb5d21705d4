#![no_main]

use libfuzzer_sys::fuzz_target;
use stringscope::deobfuscation::{EncodedBlob, EngineConfig, Population, StrategyEngine};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let constant = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let blob = EncodedBlob::from_bytes(data[4..].to_vec());
    let config = EngineConfig::aggressive();
    let engine = StrategyEngine::new(&blob, &config);

    for population in [Population::Full, Population::Short] {
        let _ = engine.decode(constant, None, population);
    }
});
