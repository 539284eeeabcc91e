#![no_main]

use libfuzzer_sys::fuzz_target;
use presto_stream::client::{ConnectionParams, HttpScheme};

fuzz_target!(|data: &[u8]| {
    let Ok(url) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(params) = ConnectionParams::parse(url) {
        assert!(!params.host.is_empty());
        assert!(!params.catalog.is_empty());
        assert!(!params.schema.is_empty());
        assert_eq!(params.http_scheme, HttpScheme::for_port(params.port));
        assert!(params.base_url().starts_with(&params.http_scheme.to_string()));
    }
});
