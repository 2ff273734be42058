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

/// How many broker acknowledgements a Produce request waits for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum RequiredAcks {
    /// Fire and forget. The broker sends no response at all; the connection
    /// returns as soon as the request is on the wire.
    None,

    /// The leader has written the data to its local log.
    #[default]
    Leader,

    /// The full in-sync replica set has acknowledged the data.
    Full,
}

impl From<RequiredAcks> for i16 {
    fn from(acks: RequiredAcks) -> Self {
        match acks {
            RequiredAcks::None => 0,
            RequiredAcks::Leader => 1,
            RequiredAcks::Full => -1,
        }
    }
}

#[derive(Debug)]
pub struct ProduceRequest {
    /// The number of acknowledgments the producer requires the leader to have
    /// received before considering a request complete.
    pub required_acks: RequiredAcks,

    /// The timeout to await a response in milliseconds.
    pub timeout_ms: i32,

    /// Each topic to produce to.
    pub topics: Vec<ProduceRequestTopic>,
}

impl RequestBody for ProduceRequest {
    type ResponseBody = ProduceResponse;

    const API_KEY: ApiKey = ApiKey::Produce;

    /// Version 3 changes the on-wire record format; this driver speaks the
    /// classic message-set versions only.
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 2);
}

impl<W> WriteVersionedType<W> for ProduceRequest
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2);

        i16::from(self.required_acks).write(writer)?;
        self.timeout_ms.write(writer)?;
        write_versioned_array(writer, version, Some(&self.topics))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct ProduceRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition to produce to.
    pub partitions: Vec<ProduceRequestPartition>,
}

impl<W> WriteVersionedType<W> for ProduceRequestTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct ProduceRequestPartition {
    /// The partition index.
    pub index: i32,

    /// The messages to append.
    pub records: MessageSet,
}

impl<W> WriteVersionedType<W> for ProduceRequestPartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2);

        self.index.write(writer)?;
        self.records.write(writer)?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProduceResponse {
    /// Each produce response.
    pub responses: Vec<ProduceResponseTopic>,

    /// The duration in milliseconds for which the request was throttled due to
    /// a quota violation, or zero if the request did not violate any quota.
    ///
    /// Added in version 1.
    pub throttle_time_ms: Option<i32>,
}

impl<R> ReadVersionedType<R> for ProduceResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 2);

        Ok(Self {
            responses: read_versioned_array(reader, version)?.unwrap_or_default(),
            throttle_time_ms: (v >= 1).then(|| i32::read(reader)).transpose()?,
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ProduceResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 2);

        write_versioned_array(writer, version, Some(&self.responses))?;
        if v >= 1 {
            self.throttle_time_ms.unwrap_or(0).write(writer)?;
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProduceResponseTopic {
    /// The topic name.
    pub name: String,

    /// Each partition that we produced to within the topic.
    pub partitions: Vec<ProduceResponsePartition>,
}

impl<R> ReadVersionedType<R> for ProduceResponseTopic
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 2);

        Ok(Self {
            name: String::read(reader)?,
            partitions: read_versioned_array(reader, version)?.unwrap_or_default(),
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ProduceResponseTopic
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 2);

        self.name.write(writer)?;
        write_versioned_array(writer, version, Some(&self.partitions))?;

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ProduceResponsePartition {
    /// The partition index.
    pub index: i32,

    /// The error code, or 0 if there was no error.
    pub error: Option<ApiError>,

    /// The offset assigned to the first message in the appended set.
    pub base_offset: i64,

    /// The log append time of the messages, or -1 if `CreateTime` is in use.
    ///
    /// Added in version 2.
    pub log_append_time_ms: Option<i64>,
}

impl<R> ReadVersionedType<R> for ProduceResponsePartition
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        let v = version.0;
        assert!(v <= 2);

        Ok(Self {
            index: i32::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
            base_offset: i64::read(reader)?,
            log_append_time_ms: (v >= 2).then(|| i64::read(reader)).transpose()?,
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for ProduceResponsePartition
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        let v = version.0;
        assert!(v <= 2);

        self.index.write(writer)?;
        self.error.map(|e| e.code()).unwrap_or(0).write(writer)?;
        self.base_offset.write(writer)?;
        if v >= 2 {
            self.log_append_time_ms.unwrap_or(-1).write(writer)?;
        }

        Ok(())
    }
}
