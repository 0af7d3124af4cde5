#![no_main]

use libfuzzer_sys::fuzz_target;
use stepgrid_model::fuzz_parse_state;

fuzz_target!(|data: &[u8]| {
    fuzz_parse_state(data);
});
