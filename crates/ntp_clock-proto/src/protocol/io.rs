use byteorder::{BE, ReadBytesExt, WriteBytesExt};
use std::io;

use super::{
    ClockSource, LeapIndicator, Mode, Packet, ReadBytes, ReadFromBytes, ShortFormat, Stratum,
    TimestampFormat, Version, WriteBytes, WriteToBytes,
};

// Writer implementations.

impl<W> WriteBytes for W
where
    W: WriteBytesExt,
{
    fn write_bytes<P: WriteToBytes>(&mut self, protocol: P) -> io::Result<()> {
        protocol.write_to_bytes(self)
    }
}

impl<P> WriteToBytes for &P
where
    P: WriteToBytes,
{
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()> {
        (*self).write_to_bytes(writer)
    }
}

impl WriteToBytes for ShortFormat {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<BE>(self.seconds)?;
        writer.write_u16::<BE>(self.fraction)?;
        Ok(())
    }
}

impl WriteToBytes for TimestampFormat {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BE>(self.seconds)?;
        writer.write_u32::<BE>(self.fraction)?;
        Ok(())
    }
}

impl WriteToBytes for Stratum {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.0)
    }
}

impl WriteToBytes for ClockSource {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BE>(self.id())
    }
}

impl WriteToBytes for (LeapIndicator, Version, Mode) {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        let (li, vn, mode) = *self;
        let li_vn_mode = (li as u8) << 6 | (vn.0 & 0b111) << 3 | mode as u8;
        writer.write_u8(li_vn_mode)
    }
}

impl WriteToBytes for Packet {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        let li_vn_mode = (self.leap_indicator, self.version, self.mode);
        writer.write_bytes(li_vn_mode)?;
        writer.write_bytes(self.stratum)?;
        writer.write_i8(self.poll)?;
        writer.write_i8(self.precision)?;
        writer.write_bytes(self.root_delay)?;
        writer.write_bytes(self.root_dispersion)?;
        writer.write_bytes(self.clock_source)?;
        writer.write_bytes(self.reference_timestamp)?;
        writer.write_bytes(self.origin_timestamp)?;
        writer.write_bytes(self.receive_timestamp)?;
        writer.write_bytes(self.transmit_timestamp)?;
        Ok(())
    }
}

// Reader implementations.

impl<R> ReadBytes for R
where
    R: ReadBytesExt,
{
    fn read_bytes<P: ReadFromBytes>(&mut self) -> io::Result<P> {
        P::read_from_bytes(self)
    }
}

impl ReadFromBytes for ShortFormat {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        let seconds = reader.read_u16::<BE>()?;
        let fraction = reader.read_u16::<BE>()?;
        Ok(ShortFormat { seconds, fraction })
    }
}

impl ReadFromBytes for TimestampFormat {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        let seconds = reader.read_u32::<BE>()?;
        let fraction = reader.read_u32::<BE>()?;
        Ok(TimestampFormat { seconds, fraction })
    }
}

impl ReadFromBytes for Stratum {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(Stratum(reader.read_u8()?))
    }
}

impl ReadFromBytes for (LeapIndicator, Version, Mode) {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        let li_vn_mode = reader.read_u8()?;
        let li = LeapIndicator::from_bits(li_vn_mode >> 6);
        let vn = Version::from_bits(li_vn_mode >> 3);
        let mode = Mode::from_bits(li_vn_mode);
        Ok((li, vn, mode))
    }
}

impl ReadFromBytes for Packet {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        let (leap_indicator, version, mode) = reader.read_bytes()?;
        let stratum = reader.read_bytes::<Stratum>()?;
        let poll = reader.read_i8()?;
        let precision = reader.read_i8()?;
        let root_delay = reader.read_bytes()?;
        let root_dispersion = reader.read_bytes()?;
        let clock_source = ClockSource::from_stratum(stratum, reader.read_u32::<BE>()?);
        let reference_timestamp = reader.read_bytes()?;
        let origin_timestamp = reader.read_bytes()?;
        let receive_timestamp = reader.read_bytes()?;
        let transmit_timestamp = reader.read_bytes()?;
        Ok(Packet {
            leap_indicator,
            version,
            mode,
            stratum,
            poll,
            precision,
            root_delay,
            root_dispersion,
            clock_source,
            reference_timestamp,
            origin_timestamp,
            receive_timestamp,
            transmit_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ConstPackedSizeBytes;

    #[test]
    fn first_byte_packing() {
        let mut buf = Vec::new();
        buf.write_bytes((LeapIndicator::NoWarning, Version::V3, Mode::Client))
            .unwrap();
        assert_eq!(buf, [0x1B]);

        let mut buf = Vec::new();
        buf.write_bytes((LeapIndicator::Unknown, Version::V4, Mode::Server))
            .unwrap();
        assert_eq!(buf, [0xE4]);
    }

    #[test]
    fn read_first_byte() {
        let (li, vn, mode): (LeapIndicator, Version, Mode) = (&[0x24u8][..]).read_bytes().unwrap();
        assert_eq!(li, LeapIndicator::NoWarning);
        assert_eq!(vn.value(), 4);
        assert_eq!(mode, Mode::Server);
    }

    #[test]
    fn packet_write_read() {
        let packet = Packet {
            leap_indicator: LeapIndicator::AddOne,
            version: Version::V4,
            mode: Mode::Server,
            stratum: Stratum(2),
            poll: 6,
            precision: -20,
            root_delay: ShortFormat {
                seconds: 0,
                fraction: 0x0100,
            },
            root_dispersion: ShortFormat {
                seconds: 1,
                fraction: 0x8000,
            },
            clock_source: ClockSource::ReferenceIdentifier(0xC000_0201),
            reference_timestamp: TimestampFormat {
                seconds: 1,
                fraction: 2,
            },
            origin_timestamp: TimestampFormat {
                seconds: 3,
                fraction: 4,
            },
            receive_timestamp: TimestampFormat {
                seconds: 5,
                fraction: 6,
            },
            transmit_timestamp: TimestampFormat {
                seconds: 7,
                fraction: 8,
            },
        };
        let mut buf = Vec::with_capacity(Packet::PACKED_SIZE_BYTES);
        buf.write_bytes(&packet).unwrap();
        assert_eq!(buf.len(), Packet::PACKED_SIZE_BYTES);
        let read: Packet = (&buf[..]).read_bytes().unwrap();
        assert_eq!(read, packet);
    }

    #[test]
    fn truncated_packet_is_eof() {
        let buf = [0u8; 47];
        let err = (&buf[..]).read_bytes::<Packet>().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
