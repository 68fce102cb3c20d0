//! Fuzz target for `Message::decode`.
//!
//! This fuzzer feeds arbitrary byte sequences to the wire codec's parser to
//! find:
//! - Parser crashes or panics
//! - Integer overflows in length/offset arithmetic
//! - Buffer over-reads
//! - Malformed frames that bypass the `[32,126]`/UTF-16-alignment validation
//!
//! The fuzzer should NEVER panic. Every malformed input must return
//! `Err(ProtocolError)`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use webwire_proto::Message;

fuzz_target!(|data: &[u8]| {
    let _ = Message::decode(data);
});
