//! Fuzz target: `codec::decode_response`
//!
//! Feeds arbitrary bytes to the response decoder. It must never panic, and
//! anything it accepts must survive a re-encode with the same fields.
//!
//! cargo fuzz run fuzz_decode_response

#![no_main]

use libfuzzer_sys::fuzz_target;
use wandrpc::rpc::codec::{Response, decode_response};

fuzz_target!(|data: &[u8]| {
    let Ok(response) = decode_response(data) else {
        return;
    };

    let bytes = serde_json::to_vec(&response).expect("decoded response re-encodes");
    let again: Response = serde_json::from_slice(&bytes).expect("re-encoded response decodes");
    assert_eq!(again, response);
});
