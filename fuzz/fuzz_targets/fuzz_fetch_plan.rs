#![no_main]

use libfuzzer_sys::fuzz_target;
use pbsnbd::application::FetchPlan;

fuzz_target!(|input: (u64, u16, u16)| {
    let (offset, len, chunk) = input;
    let offset = offset >> 8;
    let chunk = chunk.max(1) as usize;

    let total: usize = FetchPlan::new(offset, len as usize, chunk)
        .map(|fetch| fetch.range.len())
        .sum();
    assert_eq!(total, len as usize);
});
