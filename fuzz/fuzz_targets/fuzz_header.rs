#![no_main]
use crxparse::decode_header;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = decode_header(data) {
        assert_eq!(header.public_keys().len(), header.signatures().len());
    }
});
