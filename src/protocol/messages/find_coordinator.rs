use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    traits::{ReadType, WriteType},
};

use super::{
    ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError, WriteVersionedType,
};

/// Locate the coordinator broker for a consumer group.
#[derive(Debug)]
pub struct FindCoordinatorRequest {
    /// The consumer group to find the coordinator for.
    pub group_id: String,
}

impl RequestBody for FindCoordinatorRequest {
    type ResponseBody = FindCoordinatorResponse;

    const API_KEY: ApiKey = ApiKey::FindCoordinator;

    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 0);
}

impl<W> WriteVersionedType<W> for FindCoordinatorRequest
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

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FindCoordinatorResponse {
    /// The error code, or 0 if there was no error.
    pub error: Option<ApiError>,

    /// The node ID of the coordinator.
    pub node_id: i32,

    /// The hostname of the coordinator.
    pub host: String,

    /// The port of the coordinator.
    pub port: i32,
}

impl<R> ReadVersionedType<R> for FindCoordinatorResponse
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert_eq!(version.0, 0);

        Ok(Self {
            error: ApiError::new(i16::read(reader)?),
            node_id: i32::read(reader)?,
            host: String::read(reader)?,
            port: i32::read(reader)?,
        })
    }
}

// this is not technically required for production but helpful for testing
impl<W> WriteVersionedType<W> for FindCoordinatorResponse
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError> {
        assert_eq!(version.0, 0);

        self.error.map(|e| e.code()).unwrap_or(0).write(writer)?;
        self.node_id.write(writer)?;
        self.host.write(writer)?;
        self.port.write(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn request() {
        let req = FindCoordinatorRequest {
            group_id: "group".to_string(),
        };

        let mut buf = Vec::new();
        req.write_versioned(&mut buf, ApiVersion(0)).unwrap();
        assert_eq!(buf, [0x00, 0x05, b'g', b'r', b'o', b'u', b'p']);
    }

    #[test]
    fn response() {
        for (name, want, data) in [
            (
                "no error",
                FindCoordinatorResponse {
                    error: None,
                    node_id: 7,
                    host: "host".to_string(),
                    port: 9092,
                },
                [
                    0x00, 0x00, // error
                    0x00, 0x00, 0x00, 0x07, // node ID
                    0x00, 0x04, b'h', b'o', b's', b't', // host
                    0x00, 0x00, 0x23, 0x84, // port
                ]
                .as_ref(),
            ),
            (
                "error",
                FindCoordinatorResponse {
                    error: Some(ApiError::CoordinatorNotAvailable),
                    node_id: -1,
                    host: "".to_string(),
                    port: -1,
                },
                [
                    0x00, 0x0f, // error
                    0xff, 0xff, 0xff, 0xff, // node ID
                    0x00, 0x00, // host
                    0xff, 0xff, 0xff, 0xff, // port
                ]
                .as_ref(),
            ),
        ] {
            let mut reader = Cursor::new(data);
            let resp =
                FindCoordinatorResponse::read_versioned(&mut reader, ApiVersion(0)).unwrap();
            assert_eq!(resp, want, "{name}");

            let mut buf = Vec::new();
            resp.write_versioned(&mut buf, ApiVersion(0)).unwrap();
            assert_eq!(buf, data, "{name}");
        }
    }
}
