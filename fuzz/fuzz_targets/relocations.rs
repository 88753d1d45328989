#![no_main]

use libfuzzer_sys::fuzz_target;
use pescope::{pe::parse_relocations, ParserConfig};

fuzz_target!(|data: &[u8]| {
    let _ = parse_relocations(data, 0, data.len(), &ParserConfig::strict());
});
