#![no_main]
use crxparse::{ParseOptions, ZipCheck, extract_payload, parse_container, parse_container_with};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = parse_container(data) else {
        return;
    };

    assert!(header.zip_offset() <= data.len());
    assert_eq!(header.public_keys().len(), header.signatures().len());
    let _ = header.extension_id();

    if let Ok(payload) = extract_payload(data, &header) {
        assert!(payload.looks_like_zip);
    }

    // Lenient parsing must accept everything strict parsing does
    let lax = ParseOptions::default()
        .require_crx2_proof(false)
        .zip_check(ZipCheck::Lenient);
    assert!(parse_container_with(data, &lax).is_ok());
});
