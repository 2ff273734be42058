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

/// Read back offsets committed for a consumer group.
#[derive(Debug)]
pub struct OffsetFetchRequest {
    /// The group to fetch offsets for.
    pub group_id: String,

    /// Each topic we would like to fetch offsets for.
    pub topics: Vec<OffsetFetchRequestTopic>,
}

impl RequestBody for OffsetFetchRequest {
    type ResponseBody = OffsetFetchResponse;

    const API_KEY: ApiKey = ApiKey::OffsetFetch;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 0);
}

impl<W> WriteVersionedType<W> for OffsetFetchRequest
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
pub struct OffsetFetchRequestTopic {
    /// The topic name.
    pub name: String,

    /// The partition indexes we would like to fetch offsets for.
    pub partition_indexes: Vec<i32>,
}

impl<W> WriteVersionedType<W> for OffsetFetchRequestTopic
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
        self.partition_indexes.write(writer)?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct OffsetFetchResponse {
    /// The responses per topic.
    pub topics: Vec<OffsetFetchResponseTopic>,
}

impl<R> ReadVersionedType<R> for OffsetFetchResponse
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
impl<W> WriteVersionedType<W> for OffsetFetchResponse
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
pub struct OffsetFetchResponseTopic {
    /// The topic name.
    pub name: String,

    /// The responses per partition.
    pub partitions: Vec<OffsetFetchResponsePartition>,
}

impl<R> ReadVersionedType<R> for OffsetFetchResponseTopic
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
impl<W> WriteVersionedType<W> for OffsetFetchResponseTopic
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
pub struct OffsetFetchResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The committed message offset, or -1 if there is none.
    pub committed_offset: i64,

    /// The metadata stored with the committed offset.
    pub metadata: Option<String>,

    /// The error code, or 0 if there was no error.
    pub error: Option<ApiError>,
}

impl<R> ReadVersionedType<R> for OffsetFetchResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 0);

        Ok(Self {
            partition_index: i32::read(reader)?,
            committed_offset: i64::read(reader)?,
            metadata: Option::<String>::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for OffsetFetchResponsePartition
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
        self.metadata.write(writer)?;
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
        let req = OffsetFetchRequest {
            group_id: "g1".to_string(),
            topics: vec![OffsetFetchRequestTopic {
                name: "t".to_string(),
                partition_indexes: vec![0, 1],
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
                0x00, 0x00, 0x00, 0x02, // partitions length
                0x00, 0x00, 0x00, 0x00, // partition 0
                0x00, 0x00, 0x00, 0x01, // partition 1
            ]
        );
    }

    #[test]
    fn response() {
        let data = [
            0x00, 0x00, 0x00, 0x01, // topics length
            0x00, 0x01, b't', // topic name
            0x00, 0x00, 0x00, 0x01, // partitions length
            0x00, 0x00, 0x00, 0x02, // partition index
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, // offset
            0xff, 0xff, // metadata
            0x00, 0x00, // error
        ];

        let mut reader = Cursor::new(data.as_ref());
        let resp = OffsetFetchResponse::read_versioned(&mut reader, ApiVersion(0)).unwrap();
        assert_eq!(
            resp,
            OffsetFetchResponse {
                topics: vec![OffsetFetchResponseTopic {
                    name: "t".to_string(),
                    partitions: vec![OffsetFetchResponsePartition {
                        partition_index: 2,
                        committed_offset: 9,
                        metadata: None,
                        error: None,
                    }],
                }],
            }
        );

        let mut buf = Vec::new();
        resp.write_versioned(&mut buf, ApiVersion(0)).unwrap();
        assert_eq!(buf, data);
    }
}
