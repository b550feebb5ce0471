//! Minimal interactive console for exercising a single modem session:
//! prints inbound messages and delivery reports as they arrive, and
//! sends whatever is typed as `<recipient>;<message>`.
use std::io::{self, BufRead};

use sms_gateway_core::session::{ModemSession, SessionEvent};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let path = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".into());
    let (session, mut events) = ModemSession::connect(path, 1)
        .await
        .expect("failed to open modem session");

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Inbound(inbound) => {
                    println!("inbound from {}: {}", inbound.originating_address, inbound.text);
                }
                SessionEvent::DeliveryReport(report) => {
                    println!("delivery report ref {}: {:?}", report.reference, report.status);
                }
            }
        }
    });

    println!("type '<recipient>;<message>' to send, or ctrl-d to quit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.expect("failed to read stdin");
        let Some((recipient, message)) = line.split_once(';') else {
            eprintln!("expected '<recipient>;<message>'");
            continue;
        };
        match session.send_sms(recipient, message).await {
            Ok(refs) => println!("sent, references: {refs:?}"),
            Err(e) => eprintln!("send failed: {e}"),
        }
    }
}
