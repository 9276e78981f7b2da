#![no_main]

use libfuzzer_sys::fuzz_target;
use kilnc::types::KType;

fuzz_target!(|data: &[u8]| {
    // Only UTF-8 input is meaningful to the type parser
    if let Ok(source) = std::str::from_utf8(data) {
        // Errors are expected for malformed input; panics are bugs.
        if let Ok(ty) = source.parse::<KType>() {
            let printed = ty.to_string();
            let reparsed: KType = printed
                .parse()
                .unwrap_or_else(|e| panic!("`{}` printed as `{}` which fails to parse: {}", source, printed, e));
            assert_eq!(ty, reparsed);
            let _ = ty.key_strategy();
        }
    }
});
