#![no_main]

use libfuzzer_sys::fuzz_target;
use pycscope::CompiledModule;

fuzz_target!(|data: &[u8]| {
    let _ = CompiledModule::from_mem(data.to_vec());
});
