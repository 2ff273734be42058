//! Individual message types of the Kafka protocol, one module per API.

use std::io::{Read, Write};

use thiserror::Error;

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

mod api_versions;
mod fetch;
mod find_coordinator;
mod header;
mod list_offsets;
mod metadata;
mod offset_commit;
mod offset_fetch;
mod produce;
#[cfg(test)]
mod test_utils;

pub use api_versions::*;
pub use fetch::*;
pub use find_coordinator::*;
pub use header::*;
pub use list_offsets::*;
pub use metadata::*;
pub use offset_commit::*;
pub use offset_fetch::*;
pub use produce::*;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReadVersionedError {
    #[error("Error reading data: {0}")]
    ReadError(#[from] ReadError),
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WriteVersionedError {
    #[error("Error writing data: {0}")]
    WriteError(#[from] WriteError),

    #[error("Field {field} not available in version {version}")]
    FieldNotAvailable { version: ApiVersion, field: String },
}

/// A type decodable from a byte stream, given the API version it was encoded with.
pub trait ReadVersionedType<R>: Sized
where
    R: Read,
{
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError>;
}

/// A type encodable to a byte stream at a chosen API version.
pub trait WriteVersionedType<W>: Sized
where
    W: Write,
{
    fn write_versioned(
        &self,
        writer: &mut W,
        version: ApiVersion,
    ) -> Result<(), WriteVersionedError>;
}

/// A request body, linked to its response type and the version range the
/// driver can encode.
pub trait RequestBody {
    /// The response type matching this request.
    type ResponseBody;

    /// The API of this request.
    const API_KEY: ApiKey;

    /// The versions of this request the driver can encode and whose responses
    /// it can decode.
    const API_VERSION_RANGE: ApiVersionRange;
}

/// Read an INT32-length-prefixed array of versioned elements.
///
/// A length of `-1` encodes a null array and maps to `None`.
pub fn read_versioned_array<R, T>(
    reader: &mut R,
    version: ApiVersion,
) -> Result<Option<Vec<T>>, ReadVersionedError>
where
    R: Read,
    T: ReadVersionedType<R>,
{
    let len = i32::read(reader)?;
    match len {
        -1 => Ok(None),
        l if l < -1 => Err(ReadVersionedError::ReadError(ReadError::Malformed(
            format!("Invalid negative array length: {l}").into(),
        ))),
        l => {
            let len = usize::try_from(l).map_err(ReadError::Overflow)?;
            let mut res = VecBuilder::new(len);
            for _ in 0..len {
                res.push(T::read_versioned(reader, version)?);
            }
            Ok(Some(res.into()))
        }
    }
}

/// Write an INT32-length-prefixed array of versioned elements.
///
/// `None` encodes a null array (length `-1`).
pub fn write_versioned_array<W, T>(
    writer: &mut W,
    version: ApiVersion,
    data: Option<&[T]>,
) -> Result<(), WriteVersionedError>
where
    W: Write,
    T: WriteVersionedType<W>,
{
    match data {
        None => {
            (-1i32).write(writer)?;
            Ok(())
        }
        Some(elements) => {
            let len = i32::try_from(elements.len()).map_err(WriteError::Overflow)?;
            len.write(writer)?;

            for element in elements {
                element.write_versioned(writer, version)?;
            }
            Ok(())
        }
    }
}
