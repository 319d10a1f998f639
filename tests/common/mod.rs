//! In-process S7 PLC answering ISO-on-TCP requests from a byte memory map.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const AREA_DB: u8 = 0x84;
pub const AREA_MARKER: u8 = 0x83;
pub const AREA_TIMER: u8 = 0x1D;

/// Key of an NCK value: area/unit byte, column, line, module
pub type NckKey = (u8, u16, u16, u8);

#[derive(Debug)]
pub struct PlcState {
    /// PDU length answered to every setup request
    pub negotiated_pdu: u16,
    /// (area, db number) -> bytes
    pub memory: HashMap<(u8, u16), Vec<u8>>,
    /// (area, db number, byte offset) answered with "address out of range"
    pub failing: HashSet<(u8, u16, u32)>,
    pub nck: HashMap<NckKey, Vec<u8>>,
    /// Read and write jobs served
    pub frames: usize,
    /// Function codes of control jobs
    pub controls: Vec<u8>,
    /// Answer control jobs with an error class
    pub reject_controls: bool,
    /// Drop the last item from the next read response
    pub truncate_next_read: bool,
    /// Answer successful byte reads one byte short
    pub short_payloads: bool,
    /// Stop answering data requests
    pub silent: bool,
    pub connections: usize,
}

impl Default for PlcState {
    fn default() -> Self {
        Self {
            negotiated_pdu: 240,
            memory: HashMap::new(),
            failing: HashSet::new(),
            nck: HashMap::new(),
            frames: 0,
            controls: Vec::new(),
            reject_controls: false,
            truncate_next_read: false,
            short_payloads: false,
            silent: false,
            connections: 0,
        }
    }
}

impl PlcState {
    fn area(&mut self, area: u8, db: u16) -> &mut Vec<u8> {
        self.memory
            .entry((area, db))
            .or_insert_with(|| vec![0; 4096])
    }

    pub fn set(&mut self, area: u8, db: u16, offset: usize, data: &[u8]) {
        self.area(area, db)[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn get(&mut self, area: u8, db: u16, offset: usize, len: usize) -> Vec<u8> {
        self.area(area, db)[offset..offset + len].to_vec()
    }
}

#[derive(Debug, Clone)]
pub struct MockPlc {
    pub port: u16,
    state: Arc<Mutex<PlcState>>,
}

impl MockPlc {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(PlcState::default()));
        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                tokio::spawn(serve(stream, peer, shared.clone()));
            }
        });
        Self { port, state }
    }

    pub fn state(&self) -> MutexGuard<'_, PlcState> {
        self.state.lock().unwrap()
    }
}

async fn read_packet(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = usize::from(u16::from_be_bytes([header[2], header[3]]));
    let mut payload = vec![0u8; len - 4];
    stream.read_exact(&mut payload).await.ok()?;
    Some(payload)
}

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 4) as u16;
    let mut packet = vec![0x03, 0x00];
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

async fn serve(mut stream: TcpStream, _peer: SocketAddr, state: Arc<Mutex<PlcState>>) {
    while let Some(payload) = read_packet(&mut stream).await {
        let answer = match payload[1] {
            // connection request
            0xE0 => Some(tpkt(&[0x06, 0xD0, 0x00, 0x01, 0x44, 0x31, 0x00])),
            // disconnect request
            0x80 => return,
            0xF0 => {
                let mut state = state.lock().unwrap();
                handle_job(&payload[3..], &mut state).map(|pdu| {
                    let mut cotp = vec![0x02, 0xF0, 0x80];
                    cotp.extend(pdu);
                    tpkt(&cotp)
                })
            }
            _ => return,
        };
        if let Some(answer) = answer {
            if stream.write_all(&answer).await.is_err() {
                return;
            }
        }
    }
}

fn ack_data(pdu_reference: u16, error: (u8, u8), params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut pdu = vec![0x32, 0x03, 0x00, 0x00];
    pdu.extend_from_slice(&pdu_reference.to_be_bytes());
    pdu.extend_from_slice(&(params.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&(data.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&[error.0, error.1]);
    pdu.extend_from_slice(params);
    pdu.extend_from_slice(data);
    pdu
}

enum Item {
    Standard {
        var_type: u8,
        count: u16,
        db: u16,
        area: u8,
        address: u32,
    },
    Nck(NckKey),
}

fn parse_items(params: &[u8]) -> (Vec<Item>, usize) {
    let count = usize::from(params[1]);
    let mut pos = 2;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let item = &params[pos..];
        if item[2] == 0x82 {
            items.push(Item::Nck((
                item[3],
                u16::from_be_bytes([item[4], item[5]]),
                u16::from_be_bytes([item[6], item[7]]),
                item[8],
            )));
            pos += 10;
        } else {
            items.push(Item::Standard {
                var_type: item[3],
                count: u16::from_be_bytes([item[4], item[5]]),
                db: u16::from_be_bytes([item[6], item[7]]),
                area: item[8],
                address: u32::from_be_bytes([0, item[9], item[10], item[11]]),
            });
            pos += 12;
        }
    }
    (items, pos)
}

fn push_item(data: &mut Vec<u8>, code: u8, transport: u8, length: u16, payload: &[u8]) {
    data.extend_from_slice(&[code, transport]);
    data.extend_from_slice(&length.to_be_bytes());
    data.extend_from_slice(payload);
}

fn handle_job(pdu: &[u8], state: &mut PlcState) -> Option<Vec<u8>> {
    let pdu_reference = u16::from_be_bytes([pdu[4], pdu[5]]);
    let param_len = usize::from(u16::from_be_bytes([pdu[6], pdu[7]]));
    let params = &pdu[10..10 + param_len];
    let data = &pdu[10 + param_len..];

    match params[0] {
        // setup communication
        0xF0 => {
            let mut answer = params[..6].to_vec();
            answer.extend_from_slice(&state.negotiated_pdu.to_be_bytes());
            Some(ack_data(pdu_reference, (0, 0), &answer, &[]))
        }
        0x04 if !state.silent => {
            state.frames += 1;
            let (items, _) = parse_items(params);
            let mut answered = items.len();
            if state.truncate_next_read {
                state.truncate_next_read = false;
                answered -= 1;
            }
            let mut out = Vec::new();
            for (i, item) in items.iter().take(answered).enumerate() {
                let payload_len = match item {
                    Item::Standard {
                        var_type,
                        count,
                        db,
                        area,
                        address,
                    } => {
                        let (byte, bit) = match var_type {
                            0x1C | 0x1D => (*address as usize * 2, 0),
                            _ => ((*address >> 3) as usize, (*address & 7) as u8),
                        };
                        if state.failing.contains(&(*area, *db, byte as u32)) {
                            push_item(&mut out, 0x05, 0x00, 0, &[]);
                            0
                        } else if *var_type == 0x01 {
                            let value = state.get(*area, *db, byte, 1)[0] >> bit & 1;
                            push_item(&mut out, 0xFF, 0x03, 1, &[value]);
                            1
                        } else if matches!(var_type, 0x1C | 0x1D) {
                            let payload = state.get(*area, *db, byte, usize::from(*count) * 2);
                            push_item(&mut out, 0xFF, 0x09, payload.len() as u16, &payload);
                            payload.len()
                        } else {
                            let mut payload = state.get(*area, *db, byte, usize::from(*count));
                            if state.short_payloads {
                                payload.pop();
                            }
                            push_item(&mut out, 0xFF, 0x04, payload.len() as u16 * 8, &payload);
                            payload.len()
                        }
                    }
                    Item::Nck(key) => match state.nck.get(key) {
                        Some(payload) => {
                            let payload = payload.clone();
                            push_item(&mut out, 0xFF, 0x09, payload.len() as u16, &payload);
                            payload.len()
                        }
                        None => {
                            push_item(&mut out, 0x0A, 0x00, 0, &[]);
                            0
                        }
                    },
                };
                if payload_len % 2 == 1 && i + 1 < answered {
                    out.push(0);
                }
            }
            Some(ack_data(pdu_reference, (0, 0), &[0x04, answered as u8], &out))
        }
        0x05 if !state.silent => {
            state.frames += 1;
            let (items, _) = parse_items(params);
            let mut data = data;
            let mut codes = Vec::with_capacity(items.len());
            for item in &items {
                let transport = data[1];
                let length = usize::from(u16::from_be_bytes([data[2], data[3]]));
                let len = match transport {
                    0x03 => (length + 7) / 8,
                    0x04 | 0x05 => length / 8,
                    _ => length,
                };
                let payload = data[4..4 + len].to_vec();
                data = &data[(4 + len + len % 2).min(data.len())..];

                let Item::Standard {
                    var_type,
                    db,
                    area,
                    address,
                    ..
                } = item
                else {
                    codes.push(0x05);
                    continue;
                };
                let (byte, bit) = match var_type {
                    0x1C | 0x1D => (*address as usize * 2, 0),
                    _ => ((*address >> 3) as usize, (*address & 7) as u8),
                };
                if state.failing.contains(&(*area, *db, byte as u32)) {
                    codes.push(0x05);
                } else if *var_type == 0x01 {
                    let mut current = state.get(*area, *db, byte, 1)[0];
                    if payload[0] != 0 {
                        current |= 1 << bit;
                    } else {
                        current &= !(1 << bit);
                    }
                    state.set(*area, *db, byte, &[current]);
                    codes.push(0xFF);
                } else {
                    state.set(*area, *db, byte, &payload);
                    codes.push(0xFF);
                }
            }
            Some(ack_data(
                pdu_reference,
                (0, 0),
                &[0x05, items.len() as u8],
                &codes,
            ))
        }
        // PI service and PLC stop
        function @ (0x28 | 0x29) => {
            state.controls.push(function);
            let error = if state.reject_controls {
                (0x85, 0x00)
            } else {
                (0, 0)
            };
            Some(ack_data(pdu_reference, error, &[function], &[]))
        }
        _ => None,
    }
}
