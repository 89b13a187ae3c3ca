//! Descriptor stream walker
//!
//! Walks a contiguous descriptor buffer (typically a full configuration
//! descriptor as returned by GET_DESCRIPTOR) one record at a time.
//!
//! # Stream Format
//!
//! ```text
//! [bLength][bDescriptorType][bLength - 2 bytes of payload] [bLength]...
//! ```
//!
//! Each record is located from its two-byte header and decoded according to
//! its type tag. Tags the walker does not interpret are skipped. A header that
//! runs past the end of the buffer ends the walk with
//! [`DescriptorError::TruncatedStream`]; no partial record is produced.

use crate::error::{DescriptorError, Result};
use crate::types::{
    ConfigDescriptor, DescriptorHeader, DescriptorType, DeviceDescriptor, EndpointDescriptor,
    HidDescriptor, InterfaceAssociationDescriptor, InterfaceDescriptor,
};
use serde::Serialize;
use tracing::trace;

/// A decoded descriptor record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Descriptor {
    Device(DeviceDescriptor),
    Configuration(ConfigDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    Hid(HidDescriptor),
    InterfaceAssociation(InterfaceAssociationDescriptor),
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorType {
        match self {
            Descriptor::Device(_) => DescriptorType::Device,
            Descriptor::Configuration(_) => DescriptorType::Configuration,
            Descriptor::Interface(_) => DescriptorType::Interface,
            Descriptor::Endpoint(_) => DescriptorType::Endpoint,
            Descriptor::Hid(_) => DescriptorType::Hid,
            Descriptor::InterfaceAssociation(_) => DescriptorType::InterfaceAssociation,
        }
    }

    /// Decode one record window according to its header.
    ///
    /// Returns `Ok(None)` for type tags that are not interpreted here.
    pub fn decode(header: DescriptorHeader, window: &[u8]) -> Result<Option<Self>> {
        let descriptor = match header.kind() {
            DescriptorType::Device => Descriptor::Device(DeviceDescriptor::decode(window)?),
            DescriptorType::Configuration => {
                Descriptor::Configuration(ConfigDescriptor::decode(window)?)
            }
            DescriptorType::Interface => Descriptor::Interface(InterfaceDescriptor::decode(window)?),
            DescriptorType::Endpoint => Descriptor::Endpoint(EndpointDescriptor::decode(window)?),
            DescriptorType::Hid => Descriptor::Hid(HidDescriptor::decode(window)?),
            DescriptorType::InterfaceAssociation => {
                Descriptor::InterfaceAssociation(InterfaceAssociationDescriptor::decode(window)?)
            }
            _ => return Ok(None),
        };

        Ok(Some(descriptor))
    }
}

/// One record produced by the walker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalkEntry {
    /// Byte offset of the record's header within the walked buffer
    pub offset: usize,
    pub header: DescriptorHeader,
    pub descriptor: Descriptor,
}

/// Lazy iterator over the descriptors in a buffer
///
/// The cursor only moves forward. After the first error the iterator is
/// fused and yields `None`. Walk the same buffer again by creating a new
/// walker.
#[derive(Debug, Clone)]
pub struct DescriptorWalker<'a> {
    buf: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> DescriptorWalker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            cursor: 0,
            failed: false,
        }
    }

    /// Offset of the next record to be read
    pub fn offset(&self) -> usize {
        self.cursor
    }

    /// Total number of bytes this walker covers
    pub fn total_length(&self) -> usize {
        self.buf.len()
    }

    /// Bytes not yet walked
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.cursor..]
    }

    /// Locate the record at the cursor without decoding it.
    fn next_window(&self) -> Result<(DescriptorHeader, &'a [u8])> {
        let rest = self.remaining();
        let truncated = |length: usize| DescriptorError::TruncatedStream {
            offset: self.cursor,
            length,
            remaining: rest.len(),
        };

        let header = DescriptorHeader::parse(rest).ok_or_else(|| {
            truncated(rest.first().map_or(DescriptorHeader::SIZE, |&b| b as usize))
        })?;

        let length = header.length as usize;
        if length < DescriptorHeader::SIZE || length > rest.len() {
            return Err(truncated(length));
        }

        Ok((header, &rest[..length]))
    }

    fn fail(&mut self, err: DescriptorError) -> Option<Result<WalkEntry>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl Iterator for DescriptorWalker<'_> {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.cursor < self.buf.len() {
            let (header, window) = match self.next_window() {
                Ok(found) => found,
                Err(e) => return self.fail(e),
            };

            let offset = self.cursor;
            self.cursor += window.len();

            match Descriptor::decode(header, window) {
                Ok(Some(descriptor)) => {
                    return Some(Ok(WalkEntry {
                        offset,
                        header,
                        descriptor,
                    }));
                }
                Ok(None) => {
                    trace!(
                        "Skipping {} descriptor ({} bytes) at offset {}",
                        header.kind(),
                        header.length,
                        offset
                    );
                }
                Err(e) => return self.fail(e),
            }
        }

        None
    }
}

impl std::iter::FusedIterator for DescriptorWalker<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: [u8; 9] = [0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32];
    const INTERFACE: [u8; 9] = [0x09, 0x04, 0x00, 0x00, 0x01, 0x08, 0x06, 0x50, 0x00];
    const ENDPOINT: [u8; 7] = [0x07, 0x05, 0x81, 0x02, 0x40, 0x00, 0x00];

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.iter().flat_map(|p| p.iter().copied()).collect()
    }

    #[test]
    fn test_walk_in_wire_order() {
        let buf = concat(&[&CONFIG, &INTERFACE, &ENDPOINT]);
        let entries: Vec<WalkEntry> = DescriptorWalker::new(&buf)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].offset, 9);
        assert_eq!(entries[2].offset, 18);
        assert_eq!(entries[0].descriptor.kind(), DescriptorType::Configuration);
        assert_eq!(entries[1].descriptor.kind(), DescriptorType::Interface);
        assert_eq!(entries[2].descriptor.kind(), DescriptorType::Endpoint);
    }

    #[test]
    fn test_empty_buffer() {
        assert!(DescriptorWalker::new(&[]).next().is_none());
    }

    #[test]
    fn test_record_past_end() {
        let buf = concat(&[&CONFIG, &INTERFACE, &ENDPOINT[..5]]);
        let mut walker = DescriptorWalker::new(&buf);

        assert!(walker.next().unwrap().is_ok());
        assert!(walker.next().unwrap().is_ok());
        assert_eq!(
            walker.next().unwrap(),
            Err(DescriptorError::TruncatedStream {
                offset: 18,
                length: 7,
                remaining: 5,
            })
        );
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_single_trailing_byte() {
        let buf = concat(&[&CONFIG, &[0x09]]);
        let results: Vec<_> = DescriptorWalker::new(&buf).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(DescriptorError::TruncatedStream {
                offset: 9,
                remaining: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_length_header() {
        let buf = concat(&[&CONFIG, &[0x00, 0x24, 0x01]]);
        let results: Vec<_> = DescriptorWalker::new(&buf).collect();
        assert!(matches!(
            results.last(),
            Some(Err(DescriptorError::TruncatedStream { length: 0, .. }))
        ));
    }

    #[test]
    fn test_skips_class_specific() {
        // CS_INTERFACE header functional descriptor
        let cs = [0x05, 0x24, 0x00, 0x10, 0x01];
        let buf = concat(&[&INTERFACE, &cs, &ENDPOINT]);
        let mut walker = DescriptorWalker::new(&buf);

        assert_eq!(walker.next().unwrap().unwrap().offset, 0);
        let ep = walker.next().unwrap().unwrap();
        assert_eq!(ep.offset, 14);
        assert_eq!(walker.offset(), buf.len());
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_malformed_record_fuses() {
        let bad_ep = [0x05, 0x05, 0x81, 0x03, 0x08];
        let buf = concat(&[&INTERFACE, &bad_ep, &ENDPOINT]);
        let results: Vec<_> = DescriptorWalker::new(&buf).collect();

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(DescriptorError::MalformedDescriptor {
                kind: DescriptorType::Endpoint,
                ..
            })
        ));
    }
}
