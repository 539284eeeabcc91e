#![no_main]

use libfuzzer_sys::fuzz_target;
use presto_stream::presto::QueryResults;

fuzz_target!(|data: &[u8]| {
    if let Ok(page) = serde_json::from_slice::<QueryResults>(data) {
        if let Some(error) = page.error {
            let err = error.into_query_error(&page.id);
            let _ = err.to_string();
        }
    }
});
