#![no_main]

use libfuzzer_sys::fuzz_target;

use custodia_core::Dn;

// The parser must never panic, and a successful parse must be idempotent:
// re-parsing the canonical form yields the same canonical form.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(dn) = Dn::parse(input) {
        let reparsed = Dn::parse(dn.as_str()).expect("canonical form must re-parse");
        assert_eq!(dn, reparsed);
    }
});
