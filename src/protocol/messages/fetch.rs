use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    message_set::MessageSet,
    messages::{read_versioned_array, write_versioned_array},
    traits::{ReadType, WriteType},
};

use super::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};

#[derive(Debug)]
pub struct FetchRequest {
    /// The broker ID of the follower, or -1 if this request is from a consumer.
    pub replica_id: i32,

    /// The maximum time in milliseconds to wait for the response.
    pub max_wait_ms: i32,

    /// The minimum bytes to accumulate in the response.
    pub min_bytes: i32,

    /// The maximum bytes to fetch across the whole response.
    ///
    /// Defaults to "no limit / max". See KIP-74 for cases where this limit may
    /// not be honored.
    ///
    /// Added in version 3.
    pub max_bytes: Option<i32>,

    /// The topics to fetch.
    pub topics: Vec<FetchRequestTopic>,
}

impl RequestBody for FetchRequest {
    type ResponseBody = FetchResponse;

    const API_KEY: ApiKey = ApiKey::Fetch;

    /// Version 4 switches fetched data to the v2 record-batch format; this
    /// driver speaks the classic message-set versions only.
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 3);
}

impl<W> WriteVersionedType<W> for FetchRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 3);

        self.replica_id.write(writer)?;
        self.max_wait_ms.write(writer)?;
        self.min_bytes.write(writer)?;

        if v >= 3 {
            // defaults to "no limit / max"
            self.max_bytes.unwrap_or(i32::MAX).write(writer)?;
        }

        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct FetchRequestTopic {
    /// The name of the topic to fetch.
    pub topic: String,

    /// The partitions to fetch.
    pub partitions: Vec<FetchRequestPartition>,
}

impl<W> WriteVersionedType<W> for FetchRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.topic.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct FetchRequestPartition {
    /// The partition index.
    pub partition: i32,

    /// The message offset to start reading from.
    pub fetch_offset: i64,

    /// The maximum bytes to fetch from this partition.
    pub partition_max_bytes: i32,
}

impl<W> WriteVersionedType<W> for FetchRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.partition.write(writer)?;
        self.fetch_offset.write(writer)?;
        self.partition_max_bytes.write(writer)?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FetchResponse {
    /// The duration in milliseconds for which the request was throttled due to
    /// a quota violation, or zero if the request did not violate any quota.
    ///
    /// Added in version 1.
    pub throttle_time_ms: Option<i32>,

    /// The response topics.
    pub responses: Vec<FetchResponseTopic>,
}

impl<R> ReadVersionedType<R> for FetchResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 3);

        Ok(Self {
            throttle_time_ms: (v >= 1).then(|| i32::read(reader)).transpose()?,
            responses: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for FetchResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 3);

        if v >= 1 {
            self.throttle_time_ms.unwrap_or(0).write(writer)?;
        }
        write_versioned_array(writer, version, Some(&self.responses))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FetchResponseTopic {
    /// The topic name.
    pub topic: String,

    /// The topic partitions.
    pub partitions: Vec<FetchResponsePartition>,
}

impl<R> ReadVersionedType<R> for FetchResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for FetchResponseTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.topic.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FetchResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The error code, or 0 if there was no fetch error.
    pub error: Option<ApiError>,

    /// The current high water mark.
    pub high_watermark: i64,

    /// The fetched messages.
    pub records: MessageSet,
}

impl<R> ReadVersionedType<R> for FetchResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        Ok(Self {
            partition_index: i32::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
            high_watermark: i64::read(reader)?,
            records: MessageSet::read(reader)?,
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for FetchResponsePartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.partition_index.write(writer)?;
        self.error.map(|e| e.code()).unwrap_or(0).write(writer)?;
        self.high_watermark.write(writer)?;
        self.records.write(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::protocol::message_set::{Message, MessageAndOffset};

    use super::*;

    #[test]
    fn request() {
        for (name, version, req, want) in [
            (
                "one block",
                0,
                FetchRequest {
                    replica_id: -1,
                    max_wait_ms: 100,
                    min_bytes: 1,
                    max_bytes: None,
                    topics: vec![FetchRequestTopic {
                        topic: "topic".to_string(),
                        partitions: vec![FetchRequestPartition {
                            partition: 0x12,
                            fetch_offset: 0x34,
                            partition_max_bytes: 0x56,
                        }],
                    }],
                },
                [
                    0xff, 0xff, 0xff, 0xff, // replica id
                    0x00, 0x00, 0x00, 0x64, // max wait
                    0x00, 0x00, 0x00, 0x01, // min bytes
                    0x00, 0x00, 0x00, 0x01, // topics length
                    0x00, 0x05, b't', b'o', b'p', b'i', b'c', // topic
                    0x00, 0x00, 0x00, 0x01, // partitions length
                    0x00, 0x00, 0x00, 0x12, // partition
                    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x34, // fetch offset
                    0x00, 0x00, 0x00, 0x56, // partition max bytes
                ]
                .as_ref(),
            ),
            (
                "max bytes",
                3,
                FetchRequest {
                    replica_id: -1,
                    max_wait_ms: 0,
                    min_bytes: 0,
                    max_bytes: Some(0xff),
                    topics: vec![],
                },
                [
                    0xff, 0xff, 0xff, 0xff, // replica id
                    0x00, 0x00, 0x00, 0x00, // max wait
                    0x00, 0x00, 0x00, 0x00, // min bytes
                    0x00, 0x00, 0x00, 0xff, // max bytes
                    0x00, 0x00, 0x00, 0x00, // topics length
                ]
                .as_ref(),
            ),
        ] {
            let mut buf = Vec::new();
            req.write_versioned(&mut buf, ApiVersion(version)).unwrap();
            assert_eq!(buf, want, "{name}/{version}");
        }
    }

    #[test]
    fn response() {
        // offset 42, magic 0, key "k", value "hello"
        let want = FetchResponse {
            throttle_time_ms: Some(0),
            responses: vec![FetchResponseTopic {
                topic: "topic".to_string(),
                partitions: vec![FetchResponsePartition {
                    partition_index: 5,
                    error: None,
                    high_watermark: 0x10101010,
                    records: MessageSet(vec![MessageAndOffset {
                        offset: 42,
                        message: Message {
                            attributes: 0,
                            timestamp: None,
                            key: Some(b"k".to_vec()),
                            value: Some(b"hello".to_vec()),
                        },
                    }]),
                }],
            }],
        };
        let data = [
            0x00, 0x00, 0x00, 0x00, // throttle time
            0x00, 0x00, 0x00, 0x01, // topics length
            0x00, 0x05, b't', b'o', b'p', b'i', b'c', // topic
            0x00, 0x00, 0x00, 0x01, // partitions length
            0x00, 0x00, 0x00, 0x05, // partition index
            0x00, 0x00, // error
            0x00, 0x00, 0x00, 0x00, 0x10, 0x10, 0x10, 0x10, // high watermark
            0x00, 0x00, 0x00, 0x20, // message set size
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a, // offset
            0x00, 0x00, 0x00, 0x14, // message size
            0xa4, 0xcd, 0xab, 0x3a, // crc
            0x00, // magic
            0x00, // attributes
            0x00, 0x00, 0x00, 0x01, b'k', // key
            0x00, 0x00, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o', // value
        ];

        let mut reader = Cursor::new(data.as_ref());
        let got = FetchResponse::read_versioned(&mut reader, ApiVersion(1)).unwrap();
        assert_eq!(got, want);

        let mut buf = Vec::new();
        got.write_versioned(&mut buf, ApiVersion(1)).unwrap();
        assert_eq!(buf, data);
    }
}
