#![no_main]

use libfuzzer_sys::fuzz_target;
use loghive_pipeline::HeaderParser;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = HeaderParser::new() else {
        return;
    };

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let line = String::from_utf8_lossy(data);
    let _ = parser.parse(&line);
});
