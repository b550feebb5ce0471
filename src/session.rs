//! The modem session layer: one background task per device, owning the
//! framed serial connection and multiplexing concurrent AT requests onto
//! it one at a time, the way the teacher's single-task future did it
//! (`cur` holds the in-flight request; anything that arrives while `cur`
//! is `None`, or any `InformationResponse` the in-flight request didn't
//! ask for, is forwarded as a [`SessionEvent`] instead of being queued).
use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use crate::at::{AtCommand, AtResponse, AtResponsePacket, AtResultCode, AtValue};
use crate::errors::{GatewayError, GatewayResult};
use crate::events::{DeliveryReportEvent, InboundEvent, Reassembly};
use crate::pdu;
use crate::transport;

/// How long to wait before retrying a failed serial open or a dropped
/// connection.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Something the session observed that nobody explicitly asked for: a
/// freshly arrived SMS, or a status report for a previously sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Inbound(InboundEvent),
    DeliveryReport(DeliveryReportEvent),
}

struct ModemRequest {
    command: AtCommand,
    expected: Vec<String>,
    notif: oneshot::Sender<GatewayResult<AtResponsePacket>>,
}

struct InFlight {
    expected: Vec<String>,
    responses: Vec<AtResponse>,
    notif: oneshot::Sender<GatewayResult<AtResponsePacket>>,
}

/// A handle to a running modem session. Cheap to clone; every clone
/// shares the same background task and the same one-command-at-a-time
/// queue.
#[derive(Clone)]
pub struct ModemSession {
    tx: mpsc::UnboundedSender<ModemRequest>,
    device_id: i64,
}

impl ModemSession {
    /// Open `path`, put the modem into PDU mode, subscribe to new-message
    /// URCs, and spawn the background task that owns the connection.
    /// Returns the session handle plus the receiver for events the task
    /// observes that no caller explicitly requested.
    #[instrument(skip_all, fields(port = %path, device_id))]
    pub async fn connect(
        path: String,
        device_id: i64,
    ) -> GatewayResult<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let framed = transport::open(&path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (evtx, evrx) = mpsc::unbounded_channel();
        tokio::spawn(run(path, framed, rx, evtx, device_id));

        let session = ModemSession { tx, device_id };
        session
            .send_raw(AtCommand::Equals {
                param: "+CMGF".into(),
                value: AtValue::Integer(0),
            })
            .await?
            .assert_ok()?;
        session
            .send_raw(AtCommand::Equals {
                param: "+CNMI".into(),
                value: AtValue::Array(vec![
                    AtValue::Integer(2),
                    AtValue::Integer(2),
                    AtValue::Integer(0),
                    AtValue::Integer(0),
                    AtValue::Integer(0),
                ]),
            })
            .await?
            .assert_ok()?;
        debug!("modem session initialized");
        Ok((session, evrx))
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    /// Issue one AT command and wait for its terminating result code. A
    /// terminator that doesn't arrive within the serial read timeout
    /// (§4.2/§7) surfaces as [`GatewayError::ModemTimeout`] rather than
    /// hanging forever.
    pub async fn send_raw(&self, command: AtCommand) -> GatewayResult<AtResponsePacket> {
        let expected = command.expected();
        let (notif, rx) = oneshot::channel();
        self.tx
            .send(ModemRequest {
                command,
                expected,
                notif,
            })
            .map_err(|_| GatewayError::SessionClosed)?;
        match timeout(transport::RESPONSE_TIMEOUT, rx).await {
            Ok(result) => result.map_err(|_| GatewayError::SessionClosed)?,
            Err(_) => Err(GatewayError::ModemTimeout),
        }
    }

    /// Send one message, chunking it into concatenated segments if
    /// necessary, and return the modem-assigned reference of each
    /// segment in order (the first is what a delivery report reconciles
    /// against). A non-`OK` terminator (`ERROR`/`+CMS ERROR: n`) aborts the
    /// send with [`GatewayError::ModemRejected`], carrying the offending
    /// line verbatim per §4.3 step 4.
    pub async fn send_sms(&self, number: &str, text: &str) -> GatewayResult<Vec<u32>> {
        let segments = pdu::encode_submit(number, text);
        let mut references = Vec::with_capacity(segments.len());
        for segment in segments {
            let text = format!("AT+CMGS={}\n{}\x1A", segment.tpdu_len, segment.pdu_hex);
            let packet = self
                .send_raw(AtCommand::Text {
                    text,
                    expected: vec!["+CMGS".into()],
                })
                .await?;
            if !packet.status.is_ok() {
                return Err(GatewayError::ModemRejected {
                    line: packet.status.as_wire_line(),
                });
            }
            let reference = *packet.extract_named_response("+CMGS")?.get_integer()?;
            references.push(reference);
        }
        Ok(references)
    }
}

type Connection = tokio_util::codec::Framed<tokio_serial::SerialStream, crate::codec::AtCodec>;

async fn run(
    path: String,
    mut conn: Connection,
    mut rx: mpsc::UnboundedReceiver<ModemRequest>,
    evtx: mpsc::UnboundedSender<SessionEvent>,
    device_id: i64,
) {
    let mut queue: VecDeque<ModemRequest> = VecDeque::new();
    let mut cur: Option<InFlight> = None;
    let mut reassembly = Reassembly::default();

    'session: loop {
        tokio::select! {
            req = rx.recv() => {
                match req {
                    Some(req) => queue.push_back(req),
                    None => {
                        debug!("session handle dropped, closing device {}", device_id);
                        break 'session;
                    }
                }
            }
            frame = conn.next() => {
                match frame {
                    Some(Ok(responses)) => {
                        dispatch(responses, &mut cur, &evtx, device_id, &mut reassembly);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "serial read error, reconnecting");
                        fail_in_flight(&mut cur, e);
                        conn = reconnect(&path).await;
                    }
                    None => {
                        warn!("serial connection closed, reconnecting");
                        fail_in_flight(&mut cur, GatewayError::ModemTimeout);
                        conn = reconnect(&path).await;
                    }
                }
            }
        }

        if cur.is_none() {
            if let Some(req) = queue.pop_front() {
                match conn.send(req.command).await {
                    Ok(()) => {
                        cur = Some(InFlight {
                            expected: req.expected,
                            responses: vec![],
                            notif: req.notif,
                        });
                    }
                    Err(e) => {
                        let _ = req.notif.send(Err(e));
                    }
                }
            }
        }
    }

    for pending in queue {
        let _ = pending.notif.send(Err(GatewayError::SessionClosed));
    }
}

/// Route one frame's worth of response lines: if a request is in flight,
/// accumulate lines into it and complete it once a result code arrives
/// (information responses it didn't ask for are forwarded as URCs along
/// the way); otherwise every line is a URC.
fn dispatch(
    responses: Vec<AtResponse>,
    cur: &mut Option<InFlight>,
    evtx: &mpsc::UnboundedSender<SessionEvent>,
    device_id: i64,
    reassembly: &mut Reassembly,
) {
    let has_result = responses.iter().any(|r| matches!(r, AtResponse::ResultCode(_)));
    match cur {
        Some(state) if has_result => {
            let InFlight {
                expected,
                responses: acc,
                ..
            } = state;
            acc.extend(responses);
            let mut status = None;
            let mut kept = vec![];
            for resp in acc.drain(..) {
                match resp {
                    AtResponse::InformationResponse { param, response } => {
                        if expected.contains(&param) {
                            kept.push(AtResponse::InformationResponse { param, response });
                        } else {
                            handle_urc(
                                AtResponse::InformationResponse { param, response },
                                evtx,
                                device_id,
                                reassembly,
                            );
                        }
                    }
                    AtResponse::ResultCode(code) => status = Some(code),
                    other => kept.push(other),
                }
            }
            let state = cur.take().unwrap();
            let status = status.unwrap_or(AtResultCode::Error);
            let _ = state.notif.send(Ok(AtResponsePacket {
                responses: kept,
                status,
            }));
        }
        Some(state) => {
            state.responses.extend(responses);
        }
        None => {
            for resp in responses {
                handle_urc(resp, evtx, device_id, reassembly);
            }
        }
    }
}

/// Interpret one unsolicited line: `+CMT:`/`+CDS:` URCs carry the PDU on
/// the *next* line in text mode, but in PDU mode the modem folds the
/// whole thing (header plus hex PDU) into the single `AtResponse::Unknown`
/// line that follows the named response, so the hex is what actually
/// shows up here via `parse_response_line`'s fallback. Anything this
/// gateway doesn't recognize is dropped; it isn't a store-and-forward
/// inbox for arbitrary modem chatter.
fn handle_urc(
    resp: AtResponse,
    evtx: &mpsc::UnboundedSender<SessionEvent>,
    device_id: i64,
    reassembly: &mut Reassembly,
) {
    if let AtResponse::Unknown(line) = resp {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let mti = match pdu::inbound_mti(line) {
            Ok(mti) => mti,
            Err(_) => return,
        };
        if mti == pdu::MTI_STATUS_REPORT {
            if let Ok(report) = pdu::parse_status_report(line) {
                let _ = evtx.send(SessionEvent::DeliveryReport(DeliveryReportEvent {
                    reference: report.reference,
                    status: report.status,
                    device_id,
                }));
            }
            return;
        }
        if let Ok(deliver) = pdu::parse_deliver(line) {
            let event = match deliver.concat {
                Some(concat) => reassembly
                    .feed(concat, deliver.text)
                    .map(|joined| InboundEvent {
                        originating_address: deliver.originating_address.clone(),
                        text: joined,
                        device_id,
                    }),
                None => Some(InboundEvent {
                    originating_address: deliver.originating_address,
                    text: deliver.text,
                    device_id,
                }),
            };
            if let Some(event) = event {
                let _ = evtx.send(SessionEvent::Inbound(event));
            }
        }
    }
}

fn fail_in_flight(cur: &mut Option<InFlight>, err: GatewayError) {
    if let Some(state) = cur.take() {
        let _ = state.notif.send(Err(err));
    }
}

async fn reconnect(path: &str) -> Connection {
    loop {
        sleep(RECONNECT_BACKOFF).await;
        match transport::open(path) {
            Ok(conn) => {
                debug!(port = %path, "reconnected to serial port");
                return conn;
            }
            Err(e) => {
                warn!(port = %path, error = %e, "reconnect attempt failed");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatch_forwards_unexpected_information_response_as_urc() {
        let (evtx, mut evrx) = mpsc::unbounded_channel();
        let mut reassembly = Reassembly::default();
        let mut cur = None;
        // A +CMTI URC arriving with no request in flight is dropped (not a
        // recognized inbound/report PDU), but must not panic the dispatcher.
        dispatch(
            vec![AtResponse::InformationResponse {
                param: "+CMTI".into(),
                response: AtValue::Unknown("\"ME\",3".into()),
            }],
            &mut cur,
            &evtx,
            1,
            &mut reassembly,
        );
        assert!(evrx.try_recv().is_err());
    }

    #[test]
    fn dispatch_surfaces_error_terminator_as_wire_line() {
        let (evtx, _evrx) = mpsc::unbounded_channel();
        let mut reassembly = Reassembly::default();
        let (notif, rx) = oneshot::channel();
        let mut cur = Some(InFlight {
            expected: vec!["+CMGS".into()],
            responses: vec![],
            notif,
        });
        dispatch(
            vec![AtResponse::ResultCode(AtResultCode::Error)],
            &mut cur,
            &evtx,
            1,
            &mut reassembly,
        );
        let packet = rx.try_recv().unwrap().unwrap();
        assert!(!packet.status.is_ok());
        assert_eq!(packet.status.as_wire_line(), "ERROR");
    }

    #[tokio::test]
    async fn send_raw_fails_when_task_has_exited() {
        let (tx, rx) = mpsc::unbounded_channel::<ModemRequest>();
        drop(rx);
        let session = ModemSession { tx, device_id: 1 };
        let result = session
            .send_raw(AtCommand::Execute {
                command: "E0".into(),
            })
            .await;
        assert!(matches!(result, Err(GatewayError::SessionClosed)));
    }

    #[test]
    fn dispatch_completes_request_and_keeps_expected_response() {
        let (evtx, _evrx) = mpsc::unbounded_channel();
        let mut reassembly = Reassembly::default();
        let (notif, rx) = oneshot::channel();
        let mut cur = Some(InFlight {
            expected: vec!["+CMGS".into()],
            responses: vec![],
            notif,
        });
        dispatch(
            vec![
                AtResponse::InformationResponse {
                    param: "+CMGS".into(),
                    response: AtValue::Integer(12),
                },
                AtResponse::ResultCode(AtResultCode::Ok),
            ],
            &mut cur,
            &evtx,
            1,
            &mut reassembly,
        );
        assert!(cur.is_none());
        let packet = rx.try_recv().unwrap().unwrap();
        packet.assert_ok().unwrap();
        assert_eq!(
            *packet
                .extract_named_response("+CMGS")
                .unwrap()
                .get_integer()
                .unwrap(),
            12
        );
    }
}
