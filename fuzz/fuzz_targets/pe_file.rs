#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::{File, ParserConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = File::from_mem_with_config(data.to_vec(), ParserConfig::strict()) {
        let _ = file.directories();
    }
});
