//! Decode SMS-DELIVER PDUs given as hex text on stdin, one per line —
//! the same form `+CMT:` hands to [`sms_gateway_core::session`].
use std::io::{self, BufRead};

use sms_gateway_core::pdu;

fn main() {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.expect("failed to read stdin");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match pdu::parse_deliver(line) {
            Ok(deliver) => {
                println!("from: {}", deliver.originating_address);
                println!("text: {}", deliver.text);
                if let Some(concat) = deliver.concat {
                    println!("segment {}/{} (ref {})", concat.index, concat.total, concat.reference);
                }
            }
            Err(e) => eprintln!("failed to decode {line}: {e}"),
        }
    }
}
