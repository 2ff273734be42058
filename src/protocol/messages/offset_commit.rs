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

/// Persist consumed offsets for a consumer group.
#[derive(Debug)]
pub struct OffsetCommitRequest {
    /// The unique group identifier.
    pub group_id: String,

    /// The topics to commit offsets for.
    pub topics: Vec<OffsetCommitRequestTopic>,
}

impl RequestBody for OffsetCommitRequest {
    type ResponseBody = OffsetCommitResponse;

    const API_KEY: ApiKey = ApiKey::OffsetCommit;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 0);
}

impl<W> WriteVersionedType<W> for OffsetCommitRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.group_id.write(writer)?;
        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct OffsetCommitRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition to commit offsets for.
    pub partitions: Vec<OffsetCommitRequestPartition>,
}

impl<W> WriteVersionedType<W> for OffsetCommitRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct OffsetCommitRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// The message offset to be committed.
    pub committed_offset: i64,

    /// Any associated metadata the client wants to keep.
    pub committed_metadata: Option<String>,
}

impl<W> WriteVersionedType<W> for OffsetCommitRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.partition_index.write(writer)?;
        self.committed_offset.write(writer)?;
        self.committed_metadata.write(writer)?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct OffsetCommitResponse {
    /// The responses for each topic.
    pub topics: Vec<OffsetCommitResponseTopic>,
}

impl<R> ReadVersionedType<R> for OffsetCommitResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 0);

        Ok(Self {
            topics: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for OffsetCommitResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct OffsetCommitResponseTopic {
    /// The topic name.
    pub name: String,

    /// The responses for each partition.
    pub partitions: Vec<OffsetCommitResponsePartition>,
}

impl<R> ReadVersionedType<R> for OffsetCommitResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 0);

        Ok(Self {
            name: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for OffsetCommitResponseTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct OffsetCommitResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The error code, or 0 if there was no error.
    pub error: Option<ApiError>,
}

impl<R> ReadVersionedType<R> for OffsetCommitResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 0);

        Ok(Self {
            partition_index: i32::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for OffsetCommitResponsePartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.partition_index.write(writer)?;
        self.error.map(|e| e.code()).unwrap_or(0).write(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn request() {
        let req = OffsetCommitRequest {
            group_id: "g1".to_string(),
            topics: vec![OffsetCommitRequestTopic {
                name: "t".to_string(),
                partitions: vec![OffsetCommitRequestPartition {
                    partition_index: 0,
                    committed_offset: 5,
                    committed_metadata: None,
                }],
            }],
        };

        let mut buf = Vec::new();
        req.write_versioned(&mut buf, ApiVersion(0)).unwrap();
        assert_eq!(
            buf,
            [
                0x00, 0x02, b'g', b'1', // group
                0x00, 0x00, 0x00, 0x01, // topics length
                0x00, 0x01, b't', // topic name
                0x00, 0x00, 0x00, 0x01, // partitions length
                0x00, 0x00, 0x00, 0x00, // partition index
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, // offset
                0xff, 0xff, // metadata
            ]
        );
    }

    #[test]
    fn response() {
        let data = [
            0x00, 0x00, 0x00, 0x01, // topics length
            0x00, 0x01, b't', // topic name
            0x00, 0x00, 0x00, 0x01, // partitions length
            0x00, 0x00, 0x00, 0x00, // partition index
            0x00, 0x10, // error
        ];

        let mut reader = Cursor::new(data.as_ref());
        let resp = OffsetCommitResponse::read_versioned(&mut reader, ApiVersion(0)).unwrap();
        assert_eq!(
            resp,
            OffsetCommitResponse {
                topics: vec![OffsetCommitResponseTopic {
                    name: "t".to_string(),
                    partitions: vec![OffsetCommitResponsePartition {
                        partition_index: 0,
                        error: Some(ApiError::NotCoordinator),
                    }],
                }],
            }
        );

        let mut buf = Vec::new();
        resp.write_versioned(&mut buf, ApiVersion(0)).unwrap();
        assert_eq!(buf, data);
    }
}
