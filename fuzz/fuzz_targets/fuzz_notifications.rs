//! Fuzz target: `PendingTable` fed with arbitrary notification payloads
//!
//! Registers a handful of calls, then splits the input into
//! newline-separated payloads and hands each decodable one to the table.
//! Resolution must never panic and must never free an id whose call is
//! still held.
//!
//! cargo fuzz run fuzz_notifications

#![no_main]

use libfuzzer_sys::fuzz_target;
use wandrpc::rpc::codec::decode_response;
use wandrpc::rpc::pending::PendingTable;

fuzz_target!(|data: &[u8]| {
    let table = PendingTable::new();
    let held: Vec<_> = (0..8).map(|_| table.register().expect("table has room")).collect();

    for payload in data.split(|&b| b == b'\n') {
        if let Ok(response) = decode_response(payload) {
            let _ = table.resolve(response);
        }
    }

    assert_eq!(table.len(), held.len());
    for call in &held {
        assert!(table.contains(call.id()));
    }
    drop(held);
    assert!(table.is_empty());
});
