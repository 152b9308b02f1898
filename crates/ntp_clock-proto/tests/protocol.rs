use ntp_clock_proto::codec::{self, HEADER_SIZE};
use ntp_clock_proto::error::ParseError;
use ntp_clock_proto::protocol::{
    ClockSource, ConstPackedSizeBytes, LeapIndicator, Mode, Packet, ReadBytes, ShortFormat,
    Stratum, TimestampFormat, Version, WriteBytes,
};
use ntp_clock_proto::unix_time;

// A stratum 1 server reply captured off the wire (reference clock "CDMA").
const CAPTURED_REPLY: [u8; 48] = [
    20, 1, 3, 240, 0, 0, 0, 0, 0, 0, 0, 24, 67, 68, 77, 65, 215, 188, 128, 105, 198, 169, 46, 99,
    215, 187, 177, 194, 159, 47, 120, 0, 215, 188, 128, 113, 45, 236, 230, 45, 215, 188, 128, 113,
    46, 35, 158, 108,
];

fn captured_packet() -> Packet {
    Packet {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::from_bits(2),
        mode: Mode::Server,
        stratum: Stratum::PRIMARY,
        poll: 3,
        precision: -16,
        root_delay: ShortFormat {
            seconds: 0,
            fraction: 0,
        },
        root_dispersion: ShortFormat {
            seconds: 0,
            fraction: 24,
        },
        clock_source: ClockSource::ReferenceClock(u32::from_be_bytes(*b"CDMA")),
        reference_timestamp: TimestampFormat {
            seconds: 3619455081,
            fraction: 3332976227,
        },
        origin_timestamp: TimestampFormat {
            seconds: 3619402178,
            fraction: 2670688256,
        },
        receive_timestamp: TimestampFormat {
            seconds: 3619455089,
            fraction: 770500141,
        },
        transmit_timestamp: TimestampFormat {
            seconds: 3619455089,
            fraction: 774086252,
        },
    }
}

#[test]
fn packet_from_bytes() {
    let packet = (&CAPTURED_REPLY[..]).read_bytes::<Packet>().unwrap();
    assert_eq!(captured_packet(), packet);
    assert_eq!(packet.clock_source.to_string(), "CDMA");
}

#[test]
fn packet_to_bytes() {
    let mut bytes = Vec::with_capacity(Packet::PACKED_SIZE_BYTES);
    bytes.write_bytes(captured_packet()).unwrap();
    assert_eq!(&bytes[..], &CAPTURED_REPLY[..]);
}

#[test]
fn decode_captured_reply() {
    let destination = unix_time::from_timestamp(TimestampFormat {
        seconds: 3619455089,
        fraction: 800_000_000,
    });
    let reply = codec::decode_reply(&CAPTURED_REPLY, destination).unwrap();
    assert_eq!(reply.packet, captured_packet());
    assert_eq!(reply.stratum, Stratum::PRIMARY);
    assert_eq!(reply.root_delay(), 0.0);
    assert_eq!(reply.root_dispersion(), 24.0 / 65536.0);
    let t3 = 3619455089.0 - 2_208_988_800.0 + 774086252.0 / 4_294_967_296.0;
    assert!((reply.transmit_time() - t3).abs() < 1e-9);
    // The echoed origin is stale in this capture, so the offset is large.
    assert!(reply.offset() > 26_000.0);
}

#[test]
fn request_is_a_v3_client_packet() {
    let bytes = codec::encode_request(Some(1_600_000_000.75));
    let packet = (&bytes[..]).read_bytes::<Packet>().unwrap();
    assert_eq!(packet.leap_indicator, LeapIndicator::NoWarning);
    assert_eq!(packet.version, Version::V3);
    assert_eq!(packet.mode, Mode::Client);
    assert_eq!(packet.stratum, Stratum::UNSPECIFIED);
    assert_eq!(packet.poll, 4);
    assert_eq!(packet.precision, -6);
    assert_eq!(packet.root_delay.to_seconds(), 1.0);
    assert_eq!(packet.root_dispersion.to_seconds(), 1.0);
    assert_eq!(packet.clock_source.id(), 0);
    assert!(packet.reference_timestamp.is_zero());
    assert!(packet.origin_timestamp.is_zero());
    assert!(packet.receive_timestamp.is_zero());
    assert_eq!(
        unix_time::from_timestamp(packet.transmit_timestamp),
        1_600_000_000.75
    );
}

#[test]
fn short_reply_reports_sizes() {
    let err = codec::decode_reply(&CAPTURED_REPLY[..HEADER_SIZE - 1], 0.0).unwrap_err();
    assert_eq!(
        err,
        ParseError::BufferTooShort {
            needed: 48,
            available: 47
        }
    );
    let io_err: std::io::Error = err.into();
    assert_eq!(io_err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn unsynchronized_server_still_decodes() {
    let mut bytes = CAPTURED_REPLY;
    bytes[0] = 0xE4;
    bytes[1] = 16;
    let reply = codec::decode_reply(&bytes, 0.0).unwrap();
    assert_eq!(reply.leap_indicator, LeapIndicator::Unknown);
    assert!(reply.stratum.is_unsynchronized());
    assert_eq!(
        reply.clock_source,
        ClockSource::ReferenceIdentifier(u32::from_be_bytes(*b"CDMA"))
    );
}
