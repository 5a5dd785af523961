//! DNS message decoding and negative-answer construction.
//!
//! Only the parts of a message the relay needs are decoded: the fixed
//! header and the first question. Answers are never re-encoded; blocked
//! queries are answered by patching the flag word of the original bytes.

use std::fmt;

use crate::error::ProtocolError;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// Response code for "name does not exist".
pub const RCODE_NXDOMAIN: u8 = 3;

/// Cursor over a received message. Every read is bounds checked.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if len > self.remaining() {
            return Err(ProtocolError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

/// The fixed 12-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    /// Decode the header at the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        Self::read(&mut Reader::new(data))
    }

    /// Decode the header from `reader`, leaving it positioned at the
    /// question section.
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let bytes = reader.read_bytes(HEADER_LEN)?;
        let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);

        Ok(Self {
            id: word(0),
            flags: word(2),
            question_count: word(4),
            answer_count: word(6),
            authority_count: word(8),
            additional_count: word(10),
        })
    }

    pub fn flags(&self) -> Flags {
        Flags::from_word(self.flags)
    }
}

/// Named view over the header flag word.
///
/// Layout from the most significant bit:
/// `QR | OPCODE(4) | AA | TC | RD | RA | Z | AD | CD | RCODE(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: u8,
}

impl Flags {
    pub fn from_word(word: u16) -> Self {
        let bit = |n: u16| word & (1 << n) != 0;

        Self {
            qr: bit(15),
            opcode: ((word >> 11) & 0x0F) as u8,
            aa: bit(10),
            tc: bit(9),
            rd: bit(8),
            ra: bit(7),
            z: bit(6),
            ad: bit(5),
            cd: bit(4),
            rcode: (word & 0x0F) as u8,
        }
    }
}

/// A question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dot-joined labels without the trailing root dot, case preserved.
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    /// Decode one question from `reader`, which must be positioned right
    /// after the header (or after a previous question).
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let mut domain = String::new();

        loop {
            let len = reader.read_u8()? as usize;
            if len == 0 {
                break;
            }
            let label = reader.read_bytes(len)?;
            if !domain.is_empty() {
                domain.push('.');
            }
            domain.push_str(&String::from_utf8_lossy(label));
        }

        let qtype = reader.read_u16()?;
        let qclass = reader.read_u16()?;

        Ok(Self {
            domain,
            qtype,
            qclass,
        })
    }

    /// Human readable record type, e.g. `AAAA` or `TYPE65280`.
    pub fn type_name(&self) -> String {
        match qtype_name(self.qtype) {
            Some(name) => name.to_string(),
            None => format!("TYPE{}", self.qtype),
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name(), self.domain)
    }
}

/// A decoded query: header plus the first question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub header: Header,
    pub question: Question,
}

impl DnsQuery {
    /// Decode the header and the first question of `data`.
    ///
    /// Questions past the first are left undecoded even when the header
    /// announces them.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(data);
        let header = Header::read(&mut reader)?;
        let question = Question::read(&mut reader)?;

        Ok(Self { header, question })
    }
}

/// Build an NXDOMAIN reply from the original query bytes.
///
/// Sets QR and puts 3 in the RCODE nibble; every other bit of the message
/// is left as the client sent it, so the ID and echoed question match.
pub fn negative_answer(query: &[u8]) -> Vec<u8> {
    let mut response = query.to_vec();
    if let Some(flags) = response.get_mut(2..4) {
        flags[0] |= 0x80;
        flags[1] = (flags[1] & 0xF0) | RCODE_NXDOMAIN;
    }
    response
}

/// Mnemonic for well known query types.
pub fn qtype_name(code: u16) -> Option<&'static str> {
    let name = match code {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        13 => "HINFO",
        15 => "MX",
        16 => "TXT",
        17 => "RP",
        18 => "AFSDB",
        24 => "SIG",
        25 => "KEY",
        28 => "AAAA",
        29 => "LOC",
        33 => "SRV",
        35 => "NAPTR",
        36 => "KX",
        37 => "CERT",
        39 => "DNAME",
        41 => "OPT",
        43 => "DS",
        44 => "SSHFP",
        46 => "RRSIG",
        47 => "NSEC",
        48 => "DNSKEY",
        50 => "NSEC3",
        51 => "NSEC3PARAM",
        52 => "TLSA",
        59 => "CDS",
        60 => "CDNSKEY",
        64 => "SVCB",
        65 => "HTTPS",
        99 => "SPF",
        249 => "TKEY",
        250 => "TSIG",
        251 => "IXFR",
        252 => "AXFR",
        255 => "ANY",
        256 => "URI",
        257 => "CAA",
        _ => return None,
    };
    Some(name)
}
