// ABOUTME: Outbound message model and text segmentation with concatenation headers
// ABOUTME: Picks GSM 7-bit or UCS-2, splits to segment capacity, adds the 8-bit reference UDH

use crate::client::error::{SmppError, SmppResult};
use crate::datatypes::{Address, DataCoding};
use crate::gsm;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU8, Ordering};

/// Septets in an unsegmented GSM 7-bit message
pub const GSM7_SINGLE_CAPACITY: usize = 160;
/// Septets per segment once a concatenation header is present
pub const GSM7_SEGMENT_CAPACITY: usize = 153;
/// UCS-2 code units in an unsegmented message
pub const UCS2_SINGLE_CAPACITY: usize = 70;
/// UCS-2 code units per segment once a concatenation header is present
pub const UCS2_SEGMENT_CAPACITY: usize = 67;

/// Length of the concatenation UDH, length octet included
pub const CONCAT_HEADER_LENGTH: usize = 6;
/// Fill bits after a 6-octet UDH so the first septet starts on a septet boundary
const UDH_FILL_BITS: usize = 1;

/// 8-bit reference concatenation information element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcatHeader {
    pub reference: u8,
    pub total: u8,
    /// 1-based
    pub index: u8,
}

impl ConcatHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&[0x05, 0x00, 0x03, self.reference, self.total, self.index]);
    }

    pub fn decode(payload: &[u8]) -> Option<Self> {
        match payload {
            [0x05, 0x00, 0x03, reference, total, index, ..] => Some(Self {
                reference: *reference,
                total: *total,
                index: *index,
            }),
            _ => None,
        }
    }
}

/// One short_message payload ready for a submit_sm
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// short_message bytes, UDH included
    pub payload: Bytes,
    pub data_coding: DataCoding,
    pub header: Option<ConcatHeader>,
    /// Septets (GSM 7-bit) or UTF-16 code units (UCS-2) of user text
    pub units: usize,
    /// GSM 7-bit text is bit-packed rather than one septet per octet
    pub packed: bool,
}

impl Segment {
    /// Recover the text carried by this segment
    pub fn decode_text(&self) -> SmppResult<String> {
        let body = match self.header {
            Some(_) => self.payload.get(CONCAT_HEADER_LENGTH..).unwrap_or_default(),
            None => &self.payload[..],
        };

        if self.data_coding.is_ucs2() {
            if body.len() % 2 != 0 {
                return Err(SmppError::InvalidData("odd UCS-2 payload length".into()));
            }
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16(&units)
                .map_err(|e| SmppError::InvalidData(format!("invalid UCS-2 payload: {}", e)));
        }

        if self.packed {
            // The fill bits live in the UDH octets, so unpack from the start of the payload
            let fill = if self.header.is_some() {
                CONCAT_HEADER_LENGTH * 8 + UDH_FILL_BITS
            } else {
                0
            };
            let septets = gsm::unpack(&self.payload, self.units, fill)
                .ok_or_else(|| SmppError::InvalidData("truncated GSM 7-bit payload".into()))?;
            Ok(gsm::decode(&septets))
        } else {
            Ok(gsm::decode(body))
        }
    }

    pub fn septets(&self) -> Option<usize> {
        (!self.data_coding.is_ucs2()).then_some(self.units)
    }
}

/// A message ready for submission: addressing plus encoded segments
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub destination: Address,
    pub source: Address,
    pub segments: Vec<Segment>,
}

impl OutboundMessage {
    pub fn new(source: Address, destination: Address, segments: Vec<Segment>) -> Self {
        Self {
            destination,
            source,
            segments,
        }
    }
}

/// Splits text into protocol-compliant segments.
///
/// Reference ids come from a wrapping per-segmenter counter so consecutive
/// long messages to the same handset do not reassemble into each other.
#[derive(Debug)]
pub struct Segmenter {
    pack_gsm7: bool,
    next_reference: AtomicU8,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Segmenter {
    pub fn new(pack_gsm7: bool) -> Self {
        Self {
            pack_gsm7,
            next_reference: AtomicU8::new(1),
        }
    }

    /// Segment `text`, allocating a fresh reference id if it needs more than one part
    pub fn segment(&self, text: &str) -> SmppResult<Vec<Segment>> {
        let reference = self.next_reference.fetch_add(1, Ordering::Relaxed);
        self.segment_with_reference(text, reference)
    }

    pub fn segment_with_reference(&self, text: &str, reference: u8) -> SmppResult<Vec<Segment>> {
        if gsm::is_gsm7(text) {
            self.segment_gsm7(text, reference)
        } else {
            segment_ucs2(text, reference)
        }
    }

    fn segment_gsm7(&self, text: &str, reference: u8) -> SmppResult<Vec<Segment>> {
        let septets = gsm::encode(text).ok_or_else(|| {
            SmppError::InvalidData("text is not representable in GSM 7-bit".into())
        })?;

        if septets.len() <= GSM7_SINGLE_CAPACITY {
            return Ok(vec![self.gsm7_segment(&septets, None)]);
        }

        // Split on character boundaries so an ESC pair never straddles two segments
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut current = Vec::with_capacity(GSM7_SEGMENT_CAPACITY);
        for c in text.chars() {
            let (codes, len) = gsm::char_to_septets(c).ok_or_else(|| {
                SmppError::InvalidData(format!("character {:?} is not GSM 7-bit", c))
            })?;
            if current.len() + len > GSM7_SEGMENT_CAPACITY {
                chunks.push(std::mem::take(&mut current));
            }
            current.extend_from_slice(&codes[..len]);
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        let total = segment_count(chunks.len())?;
        Ok(chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let header = ConcatHeader {
                    reference,
                    total,
                    index: i as u8 + 1,
                };
                self.gsm7_segment(chunk, Some(header))
            })
            .collect())
    }

    fn gsm7_segment(&self, septets: &[u8], header: Option<ConcatHeader>) -> Segment {
        let mut payload = BytesMut::with_capacity(CONCAT_HEADER_LENGTH + septets.len());
        if let Some(header) = &header {
            header.encode(&mut payload);
        }

        if self.pack_gsm7 {
            let fill = if header.is_some() { UDH_FILL_BITS } else { 0 };
            payload.put_slice(&gsm::pack(septets, fill));
        } else {
            payload.put_slice(septets);
        }

        Segment {
            payload: payload.freeze(),
            data_coding: DataCoding::SmscDefault,
            header,
            units: septets.len(),
            packed: self.pack_gsm7,
        }
    }
}

fn segment_ucs2(text: &str, reference: u8) -> SmppResult<Vec<Segment>> {
    let units: Vec<u16> = text.encode_utf16().collect();

    if units.len() <= UCS2_SINGLE_CAPACITY {
        return Ok(vec![ucs2_segment(&units, None)]);
    }

    let mut chunks: Vec<&[u16]> = Vec::new();
    let mut rest = &units[..];
    while !rest.is_empty() {
        let mut end = rest.len().min(UCS2_SEGMENT_CAPACITY);
        // never end a segment on a high surrogate
        if end < rest.len() && (0xD800..=0xDBFF).contains(&rest[end - 1]) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    let total = segment_count(chunks.len())?;
    Ok(chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let header = ConcatHeader {
                reference,
                total,
                index: i as u8 + 1,
            };
            ucs2_segment(chunk, Some(header))
        })
        .collect())
}

fn ucs2_segment(units: &[u16], header: Option<ConcatHeader>) -> Segment {
    let mut payload = BytesMut::with_capacity(CONCAT_HEADER_LENGTH + units.len() * 2);
    if let Some(header) = &header {
        header.encode(&mut payload);
    }
    for unit in units {
        payload.put_u16(*unit);
    }

    Segment {
        payload: payload.freeze(),
        data_coding: DataCoding::Ucs2,
        header,
        units: units.len(),
        packed: false,
    }
}

fn segment_count(count: usize) -> SmppResult<u8> {
    u8::try_from(count).map_err(|_| {
        SmppError::InvalidData(format!("message needs {} segments, at most 255 allowed", count))
    })
}
