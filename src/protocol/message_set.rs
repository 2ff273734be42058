//! The classic message-set format (message format versions 0 and 1).
//!
//! A message set is a size-prefixed run of `[offset, message_size, message]`
//! entries. It appears inside Produce requests and Fetch responses. Brokers cut
//! fetched sets at the requested byte limit without respect for message
//! boundaries, so a trailing partial entry is expected and silently dropped on
//! decode.
//!
//! Compression is handled one level above the individual message: a compressed
//! message carries a whole inner message set as its value. This driver does not
//! decompress; such values travel through it as opaque bytes.
//!
//! # References
//! - <https://kafka.apache.org/documentation/#messageformat>

use std::io::{Cursor, Read, Write};

use crate::protocol::{
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

/// A single message, without its offset.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Message {
    /// The attributes byte. The low bits carry the compression codec.
    pub attributes: i8,

    /// The message timestamp.
    ///
    /// Present iff the message uses format version 1; a message without a
    /// timestamp is written as format version 0.
    pub timestamp: Option<i64>,

    /// The message key.
    pub key: Option<Vec<u8>>,

    /// The message value. For a compressed message this is the compressed
    /// inner message set.
    pub value: Option<Vec<u8>>,
}

impl Message {
    fn magic(&self) -> i8 {
        match self.timestamp {
            Some(_) => 1,
            None => 0,
        }
    }
}

/// A message paired with its offset in the log.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MessageAndOffset {
    pub offset: i64,
    pub message: Message,
}

/// A size-prefixed sequence of messages.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct MessageSet(
    #[cfg_attr(
        test,
        proptest(strategy = "proptest::collection::vec(proptest::prelude::any::<MessageAndOffset>(), 0..4)")
    )]
    pub Vec<MessageAndOffset>,
);

impl MessageSet {
    /// Serialize one message, CRC included, without its offset/size envelope.
    fn write_message<W>(message: &Message, writer: &mut W) -> Result<(), WriteError>
    where
        W: Write,
    {
        let mut body = Vec::new();
        message.magic().write(&mut body)?;
        message.attributes.write(&mut body)?;
        if let Some(timestamp) = message.timestamp {
            timestamp.write(&mut body)?;
        }
        message.key.write(&mut body)?;
        message.value.write(&mut body)?;

        crc32fast::hash(&body).write(writer)?;
        writer.write_all(&body)?;
        Ok(())
    }

    /// Parse one message from its CRC-prefixed encoding.
    fn read_message(data: &[u8]) -> Result<Message, ReadError> {
        let mut reader = Cursor::new(data);
        let crc = u32::read(&mut reader)?;

        let body = &data[reader.position() as usize..];
        let actual = crc32fast::hash(body);
        if crc != actual {
            return Err(ReadError::Malformed(
                format!("Message CRC mismatch: expected {crc:#010x}, got {actual:#010x}").into(),
            ));
        }

        let magic = i8::read(&mut reader)?;
        let attributes = i8::read(&mut reader)?;
        let timestamp = match magic {
            0 => None,
            1 => Some(i64::read(&mut reader)?),
            _ => {
                return Err(ReadError::Malformed(
                    format!("Unsupported message format version: {magic}").into(),
                ))
            }
        };
        let key = Option::<Vec<u8>>::read(&mut reader)?;
        let value = Option::<Vec<u8>>::read(&mut reader)?;

        Ok(Message {
            attributes,
            timestamp,
            key,
            value,
        })
    }
}

impl<W> WriteType<W> for MessageSet
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let mut entries = Vec::new();
        for MessageAndOffset { offset, message } in &self.0 {
            offset.write(&mut entries)?;

            let mut body = Vec::new();
            Self::write_message(message, &mut body)?;
            let size = i32::try_from(body.len()).map_err(WriteError::Overflow)?;
            size.write(&mut entries)?;
            entries.write_all(&body)?;
        }

        let size = i32::try_from(entries.len()).map_err(WriteError::Overflow)?;
        size.write(writer)?;
        writer.write_all(&entries)?;
        Ok(())
    }
}

impl<R> ReadType<R> for MessageSet
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let size = i32::read(reader)?;
        let size = usize::try_from(size)
            .map_err(|_| ReadError::Malformed(format!("Invalid message set size: {size}").into()))?;
        let data: Vec<u8> = VecBuilder::new(size).read_exact(reader)?.into();

        let mut messages = Vec::new();
        let mut cursor = Cursor::new(&data);
        loop {
            // offset + message_size
            if data.len() - (cursor.position() as usize) < 12 {
                break;
            }
            let offset = i64::read(&mut cursor)?;
            let message_size = i32::read(&mut cursor)?;
            let message_size = usize::try_from(message_size).map_err(|_| {
                ReadError::Malformed(format!("Invalid message size: {message_size}").into())
            })?;

            // the broker truncates the last message at the fetch byte limit
            let start = cursor.position() as usize;
            if data.len() - start < message_size {
                break;
            }

            let message = Self::read_message(&data[start..start + message_size])?;
            messages.push(MessageAndOffset { offset, message });
            cursor.set_position((start + message_size) as u64);
        }

        Ok(Self(messages))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    // offset 42, magic 0, key "k", value "hello"
    const ENTRY_V0: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a, // offset
        0x00, 0x00, 0x00, 0x14, // message size
        0xa4, 0xcd, 0xab, 0x3a, // crc
        0x00, // magic
        0x00, // attributes
        0x00, 0x00, 0x00, 0x01, 0x6b, // key
        0x00, 0x00, 0x00, 0x05, 0x68, 0x65, 0x6c, 0x6c, 0x6f, // value
    ];

    // offset 7, magic 1, timestamp 1500000000000, null key, value "v"
    const ENTRY_V1: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, // offset
        0x00, 0x00, 0x00, 0x17, // message size
        0x33, 0x35, 0xd1, 0x15, // crc
        0x01, // magic
        0x00, // attributes
        0x00, 0x00, 0x01, 0x5d, 0x3e, 0xf7, 0x98, 0x00, // timestamp
        0xff, 0xff, 0xff, 0xff, // key
        0x00, 0x00, 0x00, 0x01, 0x76, // value
    ];

    fn size_prefixed(entries: &[&[u8]]) -> Vec<u8> {
        let len: usize = entries.iter().map(|e| e.len()).sum();
        let mut buf = Vec::new();
        i32::try_from(len).unwrap().write(&mut buf).unwrap();
        for entry in entries {
            buf.extend_from_slice(entry);
        }
        buf
    }

    #[test]
    fn decode() {
        let data = size_prefixed(&[ENTRY_V0, ENTRY_V1]);
        let mut reader = Cursor::new(&data);
        let set = MessageSet::read(&mut reader).unwrap();

        assert_eq!(
            set,
            MessageSet(vec![
                MessageAndOffset {
                    offset: 42,
                    message: Message {
                        attributes: 0,
                        timestamp: None,
                        key: Some(b"k".to_vec()),
                        value: Some(b"hello".to_vec()),
                    },
                },
                MessageAndOffset {
                    offset: 7,
                    message: Message {
                        attributes: 0,
                        timestamp: Some(1_500_000_000_000),
                        key: None,
                        value: Some(b"v".to_vec()),
                    },
                },
            ])
        );
    }

    #[test]
    fn encode() {
        let set = MessageSet(vec![MessageAndOffset {
            offset: 42,
            message: Message {
                attributes: 0,
                timestamp: None,
                key: Some(b"k".to_vec()),
                value: Some(b"hello".to_vec()),
            },
        }]);

        let mut buf = Vec::new();
        set.write(&mut buf).unwrap();
        assert_eq!(buf, size_prefixed(&[ENTRY_V0]));
    }

    #[test]
    fn truncated_tail_is_dropped() {
        // cut the second entry short, as a broker limited by fetch size would
        let mut data = size_prefixed(&[ENTRY_V0, ENTRY_V1]);
        data.truncate(data.len() - 5);
        let cut = i32::try_from(data.len() - 4).unwrap();
        data[..4].copy_from_slice(&cut.to_be_bytes());

        let mut reader = Cursor::new(&data);
        let set = MessageSet::read(&mut reader).unwrap();
        assert_eq!(set.0.len(), 1);
        assert_eq!(set.0[0].offset, 42);
    }

    #[test]
    fn corrupt_crc_is_rejected() {
        let mut data = size_prefixed(&[ENTRY_V0]);
        // flip a value byte behind the CRC
        *data.last_mut().unwrap() ^= 0xff;

        let mut reader = Cursor::new(&data);
        let err = MessageSet::read(&mut reader).unwrap_err();
        assert!(matches!(err, ReadError::Malformed(_)));
    }

    proptest! {
        #[test]
        fn roundtrip(orig: MessageSet) {
            let mut buf = Cursor::new(Vec::<u8>::new());
            orig.write(&mut buf).unwrap();

            buf.set_position(0);
            let restored = MessageSet::read(&mut buf).unwrap();
            assert_eq!(orig, restored);
        }
    }
}
