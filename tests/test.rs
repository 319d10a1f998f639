mod common;

use std::time::Duration;

use chrono::{Duration as PlcTime, NaiveDate, NaiveTime};
use error_stack::Report;
use s7link::{
    errors::{Error, TransportError},
    BlockType, ConnectionOptions, MultiAddressRead, MultiAddressWrite, PlcFamily, ReturnCode,
    S7Client, SessionState,
};

use common::{MockPlc, AREA_DB, AREA_TIMER};

const TEST_DB: u16 = 1;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn connect(plc: &MockPlc, family: PlcFamily) -> S7Client {
    init_tracing();
    let options = ConnectionOptions::new("127.0.0.1", family).with_port(plc.port);
    S7Client::new(options)
        .await
        .expect("Could not create S7 Client")
}

#[tokio::test]
async fn negotiates_the_pdu_length() {
    let plc = MockPlc::start().await;
    let options = ConnectionOptions::new("127.0.0.1", PlcFamily::S71500)
        .with_port(plc.port)
        .with_pdu_length(960);
    let client = S7Client::new(options)
        .await
        .expect("Could not create S7 Client");

    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(client.pdu_length(), 240);
    assert_eq!(client.max_parallel_jobs(), 1);
}

#[tokio::test]
async fn test_data_exchange() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    client.write_u32("DB1.DBD40", 18942).await.unwrap();
    assert_eq!(client.read_u32("DB1.DBD40").await.unwrap(), 18942);
    assert_eq!(plc.state().get(AREA_DB, TEST_DB, 40, 4), 18942_u32.to_be_bytes());

    client.write_i16("DB1.DBW44", -12).await.unwrap();
    assert_eq!(client.read_i16("DB1.DBW44").await.unwrap(), -12);

    client.write_f64("DB1.DBB48", 3.25).await.unwrap();
    assert_eq!(client.read_f64("DB1.DBB48").await.unwrap(), 3.25);

    client.write_byte("MB10", 0xA5).await.unwrap();
    assert_eq!(client.read_byte("MB10").await.unwrap(), 0xA5);

    // second run with other data so nothing is preserved from the first one
    client.write_u32("DB1.DBD40", 32).await.unwrap();
    assert_eq!(client.read_u32("DB1.DBD40").await.unwrap(), 32);
}

#[tokio::test]
async fn test_bit_exchange() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    plc.state().set(AREA_DB, TEST_DB, 0, &[0b1000_0001]);

    client.write_bool("DB1.DBX0.1", true).await.unwrap();
    assert!(client.read_bool("DB1.DBX0.1").await.unwrap());
    assert_eq!(plc.state().get(AREA_DB, TEST_DB, 0, 1), vec![0b1000_0011]);

    client.write_bool("DB1.DBX0.1", false).await.unwrap();
    assert!(!client.read_bool("DB1.DBX0.1").await.unwrap());
    assert!(client.read_bool("DB1.DBX0.7").await.unwrap());
}

#[tokio::test]
async fn large_ranges_are_chunked() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    let data: Vec<u8> = (0..500).map(|i| (i % 251) as u8).collect();

    // 212 + 212 + 76 bytes, one item per request
    client.write_bytes("DB1.DBB100", &data).await.unwrap();
    assert_eq!(plc.state().frames, 3);
    assert_eq!(plc.state().get(AREA_DB, TEST_DB, 100, 500), data);

    // 222 + 222 + 56 bytes
    assert_eq!(client.read_bytes("DB1.DBB100", 500).await.unwrap(), data);
    assert_eq!(plc.state().frames, 6);
}

#[tokio::test]
async fn many_items_are_split_over_frames() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    for byte in (0..50).step_by(2) {
        plc.state().set(AREA_DB, TEST_DB, byte, &[1]);
    }

    let addresses: Vec<String> = (0..50).map(|i| format!("DB1.DBX{i}.0")).collect();
    let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
    let bits = client.read_bools(&addresses).await.unwrap();

    // 12 + 19 * 12 = 240 bytes per request
    assert_eq!(plc.state().frames, 3);
    assert_eq!(bits.len(), 50);
    for (i, bit) in bits.iter().enumerate() {
        assert_eq!(*bit, i % 2 == 0, "bit {i}");
    }
}

#[tokio::test]
async fn partial_failure_is_isolated() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    plc.state().set(AREA_DB, TEST_DB, 0, &[1, 0, 1, 1, 1]);
    plc.state().failing.insert((AREA_DB, TEST_DB, 3));
    let addresses = ["DB1.DBX0.0", "DB1.DBX1.0", "DB1.DBX2.0", "DB1.DBX3.0", "DB1.DBX4.0"];

    let bits = client.read_bools_unsafe(&addresses).await.unwrap();
    assert_eq!(bits, vec![Some(true), Some(false), Some(true), None, Some(true)]);

    match client.read_bools(&addresses).await {
        Err(Error::Item {
            index,
            code,
            failed,
        }) => {
            assert_eq!(index, 3);
            assert_eq!(code, ReturnCode::AddressOutOfRange);
            assert_eq!(failed, vec![3]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_multi() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    plc.state().failing.insert((AREA_DB, TEST_DB, 400));

    let mut write = MultiAddressWrite::new();
    write
        .add_u16("DB1.DBW300", 7)
        .unwrap()
        .add_bool("DB1.DBX302.1", true)
        .unwrap()
        .add_bytes("DB1.DBB400", &[1, 2, 3])
        .unwrap();
    let codes = client.write_multi_unsafe(&write).await.unwrap();
    assert_eq!(
        codes,
        vec![
            ReturnCode::Success,
            ReturnCode::Success,
            ReturnCode::AddressOutOfRange
        ]
    );
    assert!(matches!(
        client.write_multi(&write).await,
        Err(Error::Item { index: 2, .. })
    ));

    let mut read = MultiAddressRead::new();
    read.add_bytes("DB1.DBB300", 2)
        .unwrap()
        .add_bool("DB1.DBX302.1")
        .unwrap()
        .add_bytes("DB1.DBB400", 3)
        .unwrap();
    let values = client.read_multi_unsafe(&read).await.unwrap();
    assert_eq!(values, vec![Some(vec![0, 7]), Some(vec![1]), None]);

    plc.state().failing.clear();
    let items = client.read_multi(&read).await.unwrap();
    assert_eq!(items[2].data, vec![0, 0, 0]);
}

#[tokio::test]
async fn strings_use_the_family_header() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    plc.state().set(AREA_DB, TEST_DB, 100, &[20]);

    client.write_string("DB1.DBB100", "hello").await.unwrap();
    assert_eq!(
        plc.state().get(AREA_DB, TEST_DB, 100, 7),
        vec![20, 5, b'h', b'e', b'l', b'l', b'o']
    );
    assert_eq!(client.read_string("DB1.DBB100").await.unwrap(), "hello");
    assert_eq!(
        client
            .read_string_with_length("DB1.DBB100", 3)
            .await
            .unwrap(),
        "hel"
    );

    // an empty string needs only the header read
    client.write_string("DB1.DBB100", "").await.unwrap();
    let frames = plc.state().frames;
    assert_eq!(client.read_string("DB1.DBB100").await.unwrap(), "");
    assert_eq!(plc.state().frames, frames + 1);

    assert!(matches!(
        client.read_string_with_length("DB1.DBB100", 255).await,
        Err(Error::InvalidArgument(_))
    ));
    let too_long = "x".repeat(255);
    assert!(client.write_string("DB1.DBB100", &too_long).await.is_err());

    let mut smart = connect(&plc, PlcFamily::S7200Smart).await;
    smart.write_string("DB1.DBB200", "abc").await.unwrap();
    assert_eq!(
        plc.state().get(AREA_DB, TEST_DB, 200, 4),
        vec![3, b'a', b'b', b'c']
    );
    assert_eq!(smart.read_string("DB1.DBB200").await.unwrap(), "abc");
}

#[tokio::test]
async fn date_and_time_values() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    client.write_date("DB1.DBB0", date).await.unwrap();
    assert_eq!(client.read_date("DB1.DBB0").await.unwrap(), date);

    let time_of_day = NaiveTime::from_hms_milli_opt(12, 34, 56, 789).unwrap();
    client
        .write_time_of_day("DB1.DBB4", time_of_day)
        .await
        .unwrap();
    assert_eq!(
        client.read_time_of_day("DB1.DBB4").await.unwrap(),
        time_of_day
    );

    let time = PlcTime::milliseconds(-1500);
    client.write_time("DB1.DBB8", time).await.unwrap();
    assert_eq!(client.read_time("DB1.DBB8").await.unwrap(), time);

    let dtl = date.and_hms_nano_opt(13, 45, 30, 123_000_000).unwrap();
    client.write_dtl("DB1.DBB12", dtl).await.unwrap();
    assert_eq!(client.read_dtl("DB1.DBB12").await.unwrap(), dtl);
}

#[tokio::test]
async fn control_operations() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    client.hot_restart().await.unwrap();
    client.cold_restart().await.unwrap();
    client.plc_stop().await.unwrap();
    client.copy_ram_to_rom().await.unwrap();
    client.compress().await.unwrap();
    client.insert_file(BlockType::DB, 1).await.unwrap();
    assert_eq!(plc.state().controls, vec![0x28, 0x28, 0x29, 0x28, 0x28, 0x28]);

    assert!(matches!(
        client.insert_file(BlockType::FC, 100_000).await,
        Err(Error::InvalidArgument(_))
    ));

    plc.state().reject_controls = true;
    let e = client.plc_stop().await.unwrap_err();
    assert!(matches!(e, Error::Protocol(_)));
    assert!(!e.is_fatal());
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn cnc_reads() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::Sinumerik828D).await;
    {
        let mut state = plc.state();
        for line in 1..=4u16 {
            state
                .nck
                .insert((0x41, 2, line, 0x74), (f64::from(line) * 10.5).to_le_bytes().to_vec());
        }
        state
            .nck
            .insert((0x01, 18030, 1, 0x1A), b"  828D-ID \0\0".to_vec());
        state.nck.insert((0x41, 23, 1, 0x7F), 7u16.to_le_bytes().to_vec());
        state.nck.insert((0x21, 3, 1, 0x7F), 2u16.to_le_bytes().to_vec());
    }

    assert_eq!(
        client.read_machine_position().await.unwrap(),
        vec![10.5, 21.0, 31.5, 42.0]
    );
    assert_eq!(client.read_cnc_id().await.unwrap(), "828D-ID");
    assert_eq!(client.read_tool_number().await.unwrap(), 7);
    assert_eq!(client.read_work_mode().await.unwrap(), 2);

    assert!(matches!(
        client.read_alarm_info().await,
        Err(Error::Item {
            code: ReturnCode::ItemNotAvailable,
            ..
        })
    ));
}

#[tokio::test]
async fn faulted_session_fails_fast_until_reconnected() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    plc.state().truncate_next_read = true;
    let e = client.read_u16("DB1.DBW0").await.unwrap_err();
    assert!(matches!(&e, Error::Framing(msg) if msg.contains("item count mismatch")));
    assert_eq!(client.state(), SessionState::Faulted);

    let frames = plc.state().frames;
    for _ in 0..2 {
        let e = client.read_u16("DB1.DBW0").await.unwrap_err();
        assert!(matches!(&e, Error::Framing(msg) if msg.starts_with("session faulted")));
    }
    assert_eq!(plc.state().frames, frames);

    client.connect().await.unwrap();
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(client.read_u16("DB1.DBW0").await.unwrap(), 0);
    assert_eq!(plc.state().connections, 2);
}

#[tokio::test]
async fn short_payloads_are_framing_errors() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;
    plc.state().set(AREA_DB, TEST_DB, 0, &[0xAB, 0xCD, 0xEF, 0x01]);
    plc.state().short_payloads = true;

    let e = client.read_bytes("DB1.DBB0", 4).await.unwrap_err();
    assert!(matches!(&e, Error::Framing(msg) if msg.contains("requested 4 bytes, received 3")));
    assert_eq!(client.state(), SessionState::Faulted);

    // a one byte string header answered with no bytes at all
    let mut client = connect(&plc, PlcFamily::S7200Smart).await;
    let e = client.read_string("DB1.DBB0").await.unwrap_err();
    assert!(matches!(e, Error::Framing(_)));
    assert_eq!(client.state(), SessionState::Faulted);
}

#[tokio::test]
async fn timers_are_written_as_whole_elements() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S7300).await;

    client.write_bytes("T5", &[0x12, 0x34, 0x56, 0x78]).await.unwrap();
    assert_eq!(plc.state().get(AREA_TIMER, 0, 10, 4), vec![0x12, 0x34, 0x56, 0x78]);
    assert_eq!(
        client.read_bytes("T5", 4).await.unwrap(),
        vec![0x12, 0x34, 0x56, 0x78]
    );

    let e = client.write_bytes("C1", &[1, 2, 3]).await.unwrap_err();
    assert!(matches!(e, Error::InvalidArgument(_)));
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn silent_plc_times_out() {
    let plc = MockPlc::start().await;
    init_tracing();
    let options = ConnectionOptions::new("127.0.0.1", PlcFamily::S7300)
        .with_port(plc.port)
        .with_exchange_timeout(Duration::from_millis(200));
    let mut client = S7Client::new(options).await.unwrap();

    plc.state().silent = true;
    let e = client.read_byte("MB0").await.unwrap_err();
    assert!(matches!(
        e,
        Error::Transport(TransportError::DataExchangeTimedOut)
    ));
    assert_eq!(client.state(), SessionState::Faulted);
}

#[tokio::test]
async fn local_validation_never_reaches_the_wire() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    let mut read = MultiAddressRead::new();
    read.add_bytes("DB1.DBB0", 300).unwrap();
    match client.read_multi(&read).await {
        Err(Error::ItemTooLarge {
            index,
            size,
            budget,
        }) => assert_eq!((index, size, budget), (0, 318, 240)),
        other => panic!("unexpected {other:?}"),
    }

    let e = client.read_u16("X1").await.unwrap_err();
    let report = Report::new(e).attach_printable("reading the spindle override");
    assert!(matches!(
        report.current_context(),
        Error::AddressFormat { reason, .. } if *reason == "unrecognized area"
    ));
    assert!(format!("{report:?}").contains("reading the spindle override"));

    assert_eq!(plc.state().frames, 0);
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn close_is_idempotent() {
    let plc = MockPlc::start().await;
    let mut client = connect(&plc, PlcFamily::S71200).await;

    client.close().await;
    client.close().await;
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(matches!(
        client.read_byte("MB0").await,
        Err(Error::Transport(TransportError::NotConnected))
    ));
}
