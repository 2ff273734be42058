//! Primitive types.
//!
//! Only the classic fixed-width encodings are implemented here. Every API
//! version this driver speaks predates the flexible-version protocol, so
//! there are no compact or tagged-field encodings.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_types>

use std::io::{Read, Write};

use super::{
    traits::{ReadError, ReadType, WriteError, WriteType},
    vec_builder::VecBuilder,
};

impl<R: Read> ReadType<R> for bool {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        match buf[0] {
            0 => Ok(false),
            _ => Ok(true),
        }
    }
}

impl<W: Write> WriteType<W> for bool {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            true => Ok(writer.write_all(&[1])?),
            false => Ok(writer.write_all(&[0])?),
        }
    }
}

macro_rules! fixed_width_int {
    ($t:ty) => {
        impl<R: Read> ReadType<R> for $t {
            fn read(reader: &mut R) -> Result<Self, ReadError> {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                reader.read_exact(&mut buf)?;
                Ok(<$t>::from_be_bytes(buf))
            }
        }

        impl<W: Write> WriteType<W> for $t {
            fn write(&self, writer: &mut W) -> Result<(), WriteError> {
                let buf = self.to_be_bytes();
                writer.write_all(&buf)?;
                Ok(())
            }
        }
    };
}

fixed_width_int!(i8);
fixed_width_int!(i16);
fixed_width_int!(i32);
fixed_width_int!(i64);
fixed_width_int!(u32);

// STRING
impl<R: Read> ReadType<R> for String {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i16::read(reader)?;
        let len = usize::try_from(len).map_err(|e| ReadError::Malformed(Box::new(e)))?;
        let buf = VecBuilder::new(len).read_exact(reader)?;
        let s = String::from_utf8(buf.into()).map_err(|e| ReadError::Malformed(Box::new(e)))?;
        Ok(s)
    }
}

impl<W: Write> WriteType<W> for String {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = i16::try_from(self.len()).map_err(WriteError::Overflow)?;
        len.write(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

// NULLABLE_STRING
impl<R: Read> ReadType<R> for Option<String> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i16::read(reader)?;

        match len {
            l if l < -1 => Err(ReadError::Malformed(
                format!("Invalid negative length for nullable string: {l}").into(),
            )),
            -1 => Ok(None),
            l => {
                let len = usize::try_from(l)?;
                let buf = VecBuilder::new(len).read_exact(reader)?;
                let s =
                    String::from_utf8(buf.into()).map_err(|e| ReadError::Malformed(Box::new(e)))?;
                Ok(Some(s))
            }
        }
    }
}

impl<W: Write> WriteType<W> for Option<String> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match &self {
            Some(s) => {
                let l =
                    i16::try_from(s.len()).map_err(|err| WriteError::Malformed(Box::new(err)))?;
                l.write(writer)?;
                writer.write_all(s.as_bytes())?;
                Ok(())
            }
            None => (-1i16).write(writer),
        }
    }
}

// NULLABLE_BYTES
impl<R: Read> ReadType<R> for Option<Vec<u8>> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i32::read(reader)?;
        match len {
            l if l < -1 => Err(ReadError::Malformed(
                format!("Invalid negative length for nullable bytes: {l}").into(),
            )),
            -1 => Ok(None),
            l => {
                let len = usize::try_from(l)?;
                let buf = VecBuilder::new(len).read_exact(reader)?;
                Ok(Some(buf.into()))
            }
        }
    }
}

impl<W: Write> WriteType<W> for Option<Vec<u8>> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        match self {
            Some(buf) => {
                let l = i32::try_from(buf.len()).map_err(|e| WriteError::Malformed(Box::new(e)))?;
                l.write(writer)?;
                writer.write_all(buf)?;
                Ok(())
            }
            None => (-1i32).write(writer),
        }
    }
}

// BYTES
impl<R: Read> ReadType<R> for Vec<u8> {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i32::read(reader)?;
        match len {
            l if l < 0 => Err(ReadError::Malformed(
                format!("Invalid length for bytes: {l}").into(),
            )),
            0 => Ok(vec![]),
            l => {
                let len = usize::try_from(l)?;
                let buf = VecBuilder::new(len).read_exact(reader)?;
                Ok(buf.into())
            }
        }
    }
}

impl<W: Write> WriteType<W> for Vec<u8> {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let l = i32::try_from(self.len()).map_err(|err| WriteError::Malformed(Box::new(err)))?;
        l.write(writer)?;
        writer.write_all(self)?;
        Ok(())
    }
}

macro_rules! int_array {
    ($t:ty) => {
        impl<R: Read> ReadType<R> for Vec<$t> {
            fn read(reader: &mut R) -> Result<Self, ReadError> {
                let len = i32::read(reader)?;
                if len == -1 {
                    Ok(vec![])
                } else {
                    let len = usize::try_from(len)?;
                    let mut res = VecBuilder::new(len);
                    for _ in 0..len {
                        res.push(<$t>::read(reader)?);
                    }

                    Ok(res.into())
                }
            }
        }

        impl<W: Write> WriteType<W> for Vec<$t> {
            fn write(&self, writer: &mut W) -> Result<(), WriteError> {
                let len = i32::try_from(self.len()).map_err(WriteError::Overflow)?;
                len.write(writer)?;

                for elmt in self {
                    elmt.write(writer)?;
                }

                Ok(())
            }
        }
    };
}

// ARRAY<INT32> and ARRAY<INT64>
int_array!(i32);
int_array!(i64);
