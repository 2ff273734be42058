//! `ListOffsets` request and response.
//!
//! # References
//! - [KIP-79](https://cwiki.apache.org/confluence/pages/viewpage.action?pageId=65868090)
use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    messages::{read_versioned_array, write_versioned_array},
    traits::{ReadType, WriteType},
};

use super::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};

/// Timestamp sentinel asking for the latest offset of a partition.
pub const TIMESTAMP_LATEST: i64 = -1;

/// Timestamp sentinel asking for the earliest available offset of a partition.
pub const TIMESTAMP_EARLIEST: i64 = -2;

#[derive(Debug)]
pub struct ListOffsetsRequest {
    /// The broker ID of the requestor. Always overwritten with -1 by the
    /// connection, the ID of a non-node client.
    pub replica_id: i32,

    /// Each topic in the request.
    ///
    /// Note: A topic may only appear once within the request.
    pub topics: Vec<ListOffsetsRequestTopic>,
}

impl RequestBody for ListOffsetsRequest {
    type ResponseBody = ListOffsetsResponse;

    const API_KEY: ApiKey = ApiKey::ListOffsets;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 1);
}

impl<W> WriteVersionedType<W> for ListOffsetsRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 1);

        self.replica_id.write(writer)?;
        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct ListOffsetsRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition in the request.
    ///
    /// Note: A partition may only appear once within the request.
    pub partitions: Vec<ListOffsetsRequestPartition>,
}

impl<W> WriteVersionedType<W> for ListOffsetsRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 1);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct ListOffsetsRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// The target timestamp.
    ///
    /// Depending on the version this will return:
    ///
    /// - **version 0:** up to `max_num_offsets` offsets of segments whose
    ///   timestamp is smaller/equal than this timestamp
    /// - **version 1:** timestamp and offset of the first message
    ///   greater/equal than this timestamp
    ///
    /// See [`TIMESTAMP_LATEST`] and [`TIMESTAMP_EARLIEST`] for the special values.
    pub timestamp: i64,

    /// The maximum number of offsets to report.
    ///
    /// Defaults to 1.
    ///
    /// Removed in version 1.
    pub max_num_offsets: Option<i32>,
}

impl<W> WriteVersionedType<W> for ListOffsetsRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 1);

        self.partition_index.write(writer)?;
        self.timestamp.write(writer)?;

        if v == 0 {
            // Only fetch 1 offset by default.
            self.max_num_offsets.unwrap_or(1).write(writer)?;
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ListOffsetsResponse {
    /// Each topic in the response.
    pub topics: Vec<ListOffsetsResponseTopic>,
}

impl<R> ReadVersionedType<R> for ListOffsetsResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 1);

        Ok(Self {
            topics: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ListOffsetsResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 1);

        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ListOffsetsResponseTopic {
    /// The topic name.
    pub name: String,

    /// Each partition in the response.
    pub partitions: Vec<ListOffsetsResponsePartition>,
}

impl<R> ReadVersionedType<R> for ListOffsetsResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 1);

        Ok(Self {
            name: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ListOffsetsResponseTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 1);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ListOffsetsResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The partition error code, or 0 if there was no error.
    pub error: Option<ApiError>,

    /// The result offsets.
    ///
    /// Removed in version 1.
    pub old_style_offsets: Option<Vec<i64>>,

    /// The timestamp associated with the returned offset.
    ///
    /// Added in version 1.
    pub timestamp: Option<i64>,

    /// The returned offset.
    ///
    /// Added in version 1.
    pub offset: Option<i64>,
}

impl<R> ReadVersionedType<R> for ListOffsetsResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 1);

        Ok(Self {
            partition_index: i32::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
            old_style_offsets: (v < 1).then(|| Vec::<i64>::read(reader)).transpose()?,
            timestamp: (v >= 1).then(|| i64::read(reader)).transpose()?,
            offset: (v >= 1).then(|| i64::read(reader)).transpose()?,
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ListOffsetsResponsePartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 1);

        self.partition_index.write(writer)?;
        self.error.map(|e| e.code()).unwrap_or(0).write(writer)?;
        if v < 1 {
            self.old_style_offsets.clone().unwrap_or_default().write(writer)?;
        } else {
            self.timestamp.unwrap_or(-1).write(writer)?;
            self.offset.unwrap_or(-1).write(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn request() {
        for (name, version, req, want) in [
            (
                "one block",
                0,
                ListOffsetsRequest {
                    replica_id: -1,
                    topics: vec![ListOffsetsRequestTopic {
                        name: "foo".to_string(),
                        partitions: vec![ListOffsetsRequestPartition {
                            partition_index: 4,
                            timestamp: 1,
                            max_num_offsets: Some(2),
                        }],
                    }],
                },
                [
                    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x03, b'f', b'o', b'o',
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00,
                    0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02,
                ]
                .as_ref(),
            ),
            (
                "one block",
                1,
                ListOffsetsRequest {
                    replica_id: -1,
                    topics: vec![ListOffsetsRequestTopic {
                        name: "bar".to_string(),
                        partitions: vec![ListOffsetsRequestPartition {
                            partition_index: 4,
                            timestamp: TIMESTAMP_LATEST,
                            max_num_offsets: None,
                        }],
                    }],
                },
                [
                    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x03, b'b', b'a', b'r',
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0xff, 0xff, 0xff, 0xff, 0xff,
                    0xff, 0xff, 0xff,
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
        for (name, version, want, data) in [
            (
                "old style offsets",
                0,
                ListOffsetsResponse {
                    topics: vec![ListOffsetsResponseTopic {
                        name: "z".to_string(),
                        partitions: vec![ListOffsetsResponsePartition {
                            partition_index: 2,
                            error: None,
                            old_style_offsets: Some(vec![5, 6]),
                            timestamp: None,
                            offset: None,
                        }],
                    }],
                },
                [
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x01, b'z', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
                    0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
                    0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06,
                ]
                .as_ref(),
            ),
            (
                "timestamp and offset",
                1,
                ListOffsetsResponse {
                    topics: vec![ListOffsetsResponseTopic {
                        name: "z".to_string(),
                        partitions: vec![ListOffsetsResponsePartition {
                            partition_index: 2,
                            error: None,
                            old_style_offsets: None,
                            timestamp: Some(1477920049286),
                            offset: Some(6),
                        }],
                    }],
                },
                [
                    0x00, 0x00, 0x00, 0x01, 0x00, 0x01, b'z', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
                    0x00, 0x02, 0x00, 0x00, 0x01, 0x58, 0x1a, 0xe6, 0x48, 0x86, 0x00, 0x00, 0x00,
                    0x00, 0x00, 0x00, 0x00, 0x06,
                ]
                .as_ref(),
            ),
        ] {
            let mut reader = Cursor::new(data);
            let resp =
                ListOffsetsResponse::read_versioned(&mut reader, ApiVersion(version)).unwrap();
            assert_eq!(resp, want, "{name}/{version}");

            let mut buf = Vec::new();
            resp.write_versioned(&mut buf, ApiVersion(version)).unwrap();
            assert_eq!(buf, data, "{name}/{version}");
        }
    }
}
