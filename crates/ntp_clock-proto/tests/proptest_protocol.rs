use ntp_clock_proto::codec;
use ntp_clock_proto::protocol::{
    ConstPackedSizeBytes, Packet, ReadBytes, ShortFormat, TimestampFormat, WriteBytes,
};
use proptest::prelude::*;

/// Strategy that generates exactly 48 random bytes.
fn arb_48_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 48)
}

proptest! {
    #[test]
    fn short_format_bits_roundtrip(seconds in any::<u16>(), fraction in any::<u16>()) {
        let sf = ShortFormat { seconds, fraction };
        prop_assert_eq!(ShortFormat::from_bits(sf.to_bits()), sf);
    }

    #[test]
    fn timestamp_format_wire_roundtrip(seconds in any::<u32>(), fraction in any::<u32>()) {
        let ts = TimestampFormat { seconds, fraction };
        let mut buf = Vec::new();
        buf.write_bytes(ts).unwrap();
        prop_assert_eq!(buf.len(), TimestampFormat::PACKED_SIZE_BYTES);
        let parsed: TimestampFormat = (&buf[..]).read_bytes().unwrap();
        prop_assert_eq!(ts, parsed);
    }

    /// Transmit time survives encode then decode to within a microsecond.
    #[test]
    fn request_transmit_time_roundtrip(t in 0.0f64..2_000_000_000.0) {
        let bytes = codec::encode_request(Some(t));
        let reply = codec::decode_reply(&bytes, t).unwrap();
        prop_assert!((reply.transmit_time() - t).abs() < 1e-6);
    }

    /// Any 48 bytes decode, and the header re-encodes to the same bytes.
    #[test]
    fn arbitrary_header_decodes(bytes in arb_48_bytes()) {
        let reply = codec::decode_reply(&bytes, 0.0).unwrap();
        let mut buf = Vec::with_capacity(Packet::PACKED_SIZE_BYTES);
        buf.write_bytes(reply.packet).unwrap();
        prop_assert_eq!(&buf[..], &bytes[..]);
    }

    /// Buffers shorter than 48 bytes must always return Err.
    #[test]
    fn short_buffer_always_errors(len in 0usize..48) {
        let buf = vec![0u8; len];
        prop_assert!(codec::decode_reply(&buf, 0.0).is_err());
    }

    /// Trailing bytes never change the decoded header.
    #[test]
    fn trailing_bytes_ignored(
        bytes in arb_48_bytes(),
        tail in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut long = bytes.clone();
        long.extend_from_slice(&tail);
        let a = codec::decode_reply(&bytes, 1.0).unwrap();
        let b = codec::decode_reply(&long, 1.0).unwrap();
        prop_assert_eq!(a, b);
    }
}
