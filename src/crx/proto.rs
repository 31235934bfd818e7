//! Decoder for the CRX3 header body.
//!
//! The header body is a protocol-buffer encoded `CrxFileHeader`:
//!
//! ```text
//! message CrxFileHeader {
//!   repeated AsymmetricKeyProof sha256_with_rsa = 2;
//!   repeated AsymmetricKeyProof sha256_with_ecdsa = 3;
//!   optional bytes verified_contents = 4;
//!   optional bytes signed_header_data = 10000;   // a serialized SignedData
//! }
//! message AsymmetricKeyProof {
//!   optional bytes public_key = 1;
//!   optional bytes signature = 2;
//! }
//! message SignedData {
//!   optional bytes crx_id = 1;
//! }
//! ```
//!
//! Each record is a varint key (`field_number << 3 | wire_type`) followed by
//! its value. Only what the container needs is decoded; unknown fields are
//! skipped. All byte fields are borrowed from the input.
//!
//! ## Length accounting
//!
//! The body must be consumed exactly. Bytes left over that cannot start a
//! record (a lone key with no room for its value included), and top-level
//! records that run past the declared length but would still fit in the
//! surrounding buffer, are reported as [`DecodeError::LengthMismatch`]. A
//! record claiming more bytes than exist is [`DecodeError::TruncatedRecord`].

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use super::error::DecodeError;
use super::structures::{CrxId, KeyAlgorithm, KeyProof, SignedHeader};

/// A 64-bit varint never needs more than 10 bytes
const MAX_VARINT_LEN: usize = 10;

/// Largest field number protobuf allows (2^29 - 1)
const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

// CrxFileHeader
const FIELD_SHA256_WITH_RSA: u32 = 2;
const FIELD_SHA256_WITH_ECDSA: u32 = 3;
const FIELD_VERIFIED_CONTENTS: u32 = 4;
const FIELD_SIGNED_HEADER_DATA: u32 = 10000;

// AsymmetricKeyProof
const FIELD_PUBLIC_KEY: u32 = 1;
const FIELD_SIGNATURE: u32 = 2;

// SignedData
const FIELD_CRX_ID: u32 = 1;

/// Skippable wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value<'a> {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(&'a [u8]),
}

impl Value<'_> {
    fn wire_type(&self) -> u8 {
        match self {
            Value::Varint(_) => 0,
            Value::Fixed64(_) => 1,
            Value::Bytes(_) => 2,
            Value::Fixed32(_) => 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Record<'a> {
    field: u32,
    value: Value<'a>,
    /// Absolute offset of the value's first byte
    value_offset: usize,
}

impl<'a> Record<'a> {
    fn bytes(&self) -> Result<&'a [u8], DecodeError> {
        match self.value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(DecodeError::UnexpectedWireType {
                field: self.field,
                wire_type: other.wire_type(),
            }),
        }
    }
}

/// Result of pulling one record from a bounded cursor.
#[derive(Debug)]
enum Next<'a> {
    Record(Record<'a>),
    /// Bytes remain at `at` but do not begin a complete, valid record prefix.
    Trailing { at: usize },
    /// The record at `at` declares `declared` value bytes but only `available`
    /// remain. `end` is where the value would stop, relative to the cursor start.
    Overrun {
        at: usize,
        declared: u64,
        available: usize,
        end: u64,
    },
}

/// Read cursor over a bounded slice.
///
/// Positions reported by the cursor are absolute within the outermost header
/// body, so errors from nested messages point at the right byte.
#[derive(Debug, Clone, Copy)]
pub struct ProtoCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ProtoCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::nested(data, 0)
    }

    fn nested(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute position of the next unread byte
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes consumed from this cursor's own slice
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a base-128 varint.
    ///
    /// Returns `Ok(None)` without advancing when the slice ends mid-varint.
    pub fn read_varint(&mut self) -> Result<Option<u64>, DecodeError> {
        let start = self.position();
        let mut value = 0u64;

        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.data.get(self.pos + i) else {
                return Ok(None);
            };

            // The tenth byte only has room for the top bit of a u64
            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                return Err(DecodeError::MalformedVarint { offset: start });
            }

            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(Some(value));
            }
        }

        Err(DecodeError::MalformedVarint { offset: start })
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn overrun(&self, at: usize, declared: u64) -> Next<'a> {
        Next::Overrun {
            at,
            declared,
            available: self.remaining(),
            end: self.pos as u64 + declared,
        }
    }

    fn next_record(&mut self) -> Result<Option<Next<'a>>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }

        let at = self.position();
        let Some(key) = self.read_varint()? else {
            return Ok(Some(Next::Trailing { at }));
        };

        let field = key >> 3;
        let wire_type = (key & 0x07) as u8;
        // Every wire type carries at least one value byte, so a key at the
        // very end of the slice cannot start a record.
        if field == 0 || field > MAX_FIELD_NUMBER || self.is_empty() {
            return Ok(Some(Next::Trailing { at }));
        }
        let field = field as u32;

        let value = match WireType::from_u8(wire_type) {
            Some(WireType::Varint) => match self.read_varint()? {
                Some(v) => Value::Varint(v),
                None => return Ok(Some(Next::Trailing { at })),
            },
            Some(WireType::Fixed64) => match self.take(8) {
                Some(bytes) => Value::Fixed64(LittleEndian::read_u64(bytes)),
                None => return Ok(Some(self.overrun(at, 8))),
            },
            Some(WireType::Fixed32) => match self.take(4) {
                Some(bytes) => Value::Fixed32(LittleEndian::read_u32(bytes)),
                None => return Ok(Some(self.overrun(at, 4))),
            },
            Some(WireType::LengthDelimited) => {
                let Some(len) = self.read_varint()? else {
                    return Ok(Some(Next::Trailing { at }));
                };
                let value_offset = self.position();
                match usize::try_from(len).ok().and_then(|len| self.take(len)) {
                    Some(bytes) => {
                        return Ok(Some(Next::Record(Record {
                            field,
                            value: Value::Bytes(bytes),
                            value_offset,
                        })));
                    }
                    None => return Ok(Some(self.overrun(at, len))),
                }
            }
            None => {
                return Err(DecodeError::UnsupportedWireType {
                    offset: at,
                    wire_type,
                });
            }
        };

        Ok(Some(Next::Record(Record {
            field,
            value,
            value_offset: self.position(),
        })))
    }

    /// Next record of a nested message, where any shortfall is an error.
    fn next_nested(&mut self) -> Result<Option<Record<'a>>, DecodeError> {
        match self.next_record()? {
            None => Ok(None),
            Some(Next::Record(record)) => Ok(Some(record)),
            Some(Next::Trailing { at }) => Err(DecodeError::MalformedRecord { offset: at }),
            Some(Next::Overrun {
                at,
                declared,
                available,
                ..
            }) => Err(DecodeError::TruncatedRecord {
                offset: at,
                declared,
                available,
            }),
        }
    }
}

/// Decode a standalone CRX3 header body.
///
/// The whole slice must be made of records; nothing may be left over.
pub fn decode(header_bytes: &[u8]) -> Result<SignedHeader<'_>, DecodeError> {
    decode_within(header_bytes, 0)
}

/// Decode a header body that is followed by `trailing` more bytes of input.
///
/// The trailing bytes are never read; they only tell a record that overshoots
/// the declared length (a length mismatch) apart from one that overshoots the
/// input itself (a truncated record).
pub(crate) fn decode_within(body: &[u8], trailing: usize) -> Result<SignedHeader<'_>, DecodeError> {
    let declared = body.len();
    let limit = declared as u64 + trailing as u64;
    let mut cursor = ProtoCursor::new(body);
    let mut header = SignedHeader::default();

    while let Some(next) = cursor.next_record()? {
        let record = match next {
            Next::Record(record) => record,
            Next::Trailing { at } => {
                return Err(DecodeError::LengthMismatch {
                    declared,
                    consumed: at as u64,
                });
            }
            Next::Overrun {
                at,
                declared: record_len,
                available,
                end,
            } => {
                if end <= limit {
                    return Err(DecodeError::LengthMismatch {
                        declared,
                        consumed: end,
                    });
                }
                return Err(DecodeError::TruncatedRecord {
                    offset: at,
                    declared: record_len,
                    available,
                });
            }
        };

        match record.field {
            FIELD_SHA256_WITH_RSA | FIELD_SHA256_WITH_ECDSA => {
                let algorithm = if record.field == FIELD_SHA256_WITH_RSA {
                    KeyAlgorithm::RsaSha256
                } else {
                    KeyAlgorithm::EcdsaSha256
                };
                let index = header.proofs.len();
                let proof = decode_proof(record.bytes()?, record.value_offset, algorithm, index)?;
                trace!(
                    index,
                    %algorithm,
                    public_key_len = proof.public_key.len(),
                    signature_len = proof.signature.len(),
                    "decoded key proof"
                );
                header.proofs.push(proof);
            }
            FIELD_VERIFIED_CONTENTS => {
                header.verified_contents = Some(record.bytes()?);
            }
            FIELD_SIGNED_HEADER_DATA => {
                let signed_data = record.bytes()?;
                // Repeated singular fields: the last one wins
                header.crx_id = decode_signed_data(signed_data, record.value_offset)?;
                header.signed_header_data = Some(signed_data);
                trace!(len = signed_data.len(), "decoded signed header data");
            }
            field => {
                debug!(field, wire_type = record.value.wire_type(), "skipping unknown header field");
            }
        }
    }

    if cursor.consumed() != declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            consumed: cursor.consumed() as u64,
        });
    }

    Ok(header)
}

fn decode_proof(
    bytes: &[u8],
    base: usize,
    algorithm: KeyAlgorithm,
    index: usize,
) -> Result<KeyProof<'_>, DecodeError> {
    let mut cursor = ProtoCursor::nested(bytes, base);
    let mut public_key = None;
    let mut signature = None;

    while let Some(record) = cursor.next_nested()? {
        match record.field {
            FIELD_PUBLIC_KEY => public_key = Some(record.bytes()?),
            FIELD_SIGNATURE => signature = Some(record.bytes()?),
            field => trace!(field, "skipping unknown key proof field"),
        }
    }

    match (public_key, signature) {
        (Some(public_key), Some(signature)) => Ok(KeyProof {
            algorithm: Some(algorithm),
            public_key,
            signature,
        }),
        _ => Err(DecodeError::IncompleteProof { index }),
    }
}

fn decode_signed_data(bytes: &[u8], base: usize) -> Result<Option<CrxId>, DecodeError> {
    let mut cursor = ProtoCursor::nested(bytes, base);
    let mut crx_id = None;

    while let Some(record) = cursor.next_nested()? {
        if record.field == FIELD_CRX_ID {
            let raw = record.bytes()?;
            let id = CrxId::from_slice(raw).ok_or(DecodeError::InvalidCrxId { len: raw.len() })?;
            crx_id = Some(id);
        }
    }

    Ok(crx_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rstest::*;

    fn varint(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
        out
    }

    fn bytes_field(field: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = varint(u64::from(field) << 3 | 2);
        out.extend(varint(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn proof(public_key: &[u8], signature: &[u8]) -> Vec<u8> {
        let mut out = bytes_field(FIELD_PUBLIC_KEY, public_key);
        out.extend(bytes_field(FIELD_SIGNATURE, signature));
        out
    }

    #[rstest]
    #[case(&[0x00], 0)]
    #[case(&[0x7F], 127)]
    #[case(&[0x80, 0x01], 128)]
    #[case(&[0x82, 0xF1, 0x04], 80002)]
    #[case(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01], u64::MAX)]
    fn varint_values(#[case] input: &[u8], #[case] expected: u64) {
        let mut cursor = ProtoCursor::new(input);
        assert_eq!(cursor.read_varint().unwrap(), Some(expected));
        assert!(cursor.is_empty());
    }

    #[test]
    fn varint_cut_short_does_not_advance() {
        let mut cursor = ProtoCursor::new(&[0x80, 0x80]);
        assert_eq!(cursor.read_varint().unwrap(), None);
        assert_eq!(cursor.position(), 0);
    }

    #[rstest]
    #[case(&[0xFF; 11])]
    #[case(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02])]
    fn varint_overlong(#[case] input: &[u8]) {
        let mut cursor = ProtoCursor::new(input);
        assert_eq!(
            cursor.read_varint(),
            Err(DecodeError::MalformedVarint { offset: 0 })
        );
    }

    #[test]
    fn empty_body_is_unsigned() {
        let header = decode(&[]).unwrap();
        assert_eq!(header, SignedHeader::default());
    }

    #[test]
    fn proofs_keep_stream_order_across_algorithms() {
        let mut body = bytes_field(FIELD_SHA256_WITH_ECDSA, &proof(b"ec-key", b"ec-sig"));
        body.extend(bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"rsa-key", b"rsa-sig")));
        body.extend(bytes_field(FIELD_SHA256_WITH_ECDSA, &proof(b"ec2-key", b"ec2-sig")));

        let header = decode(&body).unwrap();
        let algorithms: Vec<_> = header.proofs.iter().map(|p| p.algorithm).collect();
        assert_eq!(
            algorithms,
            vec![
                Some(KeyAlgorithm::EcdsaSha256),
                Some(KeyAlgorithm::RsaSha256),
                Some(KeyAlgorithm::EcdsaSha256),
            ]
        );
        assert_eq!(
            header.public_keys(),
            vec![&b"ec-key"[..], &b"rsa-key"[..], &b"ec2-key"[..]]
        );
        assert_eq!(
            header.signatures(),
            vec![&b"ec-sig"[..], &b"rsa-sig"[..], &b"ec2-sig"[..]]
        );
    }

    #[test]
    fn signed_header_data_is_kept_verbatim() {
        let signed_data = bytes_field(FIELD_CRX_ID, &[0x01; 16]);
        let mut body = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"k", b"s"));
        body.extend(bytes_field(FIELD_SIGNED_HEADER_DATA, &signed_data));

        let header = decode(&body).unwrap();
        assert_eq!(header.signed_header_data, Some(&signed_data[..]));
        assert_eq!(header.crx_id, Some(CrxId([0x01; 16])));
    }

    #[test]
    fn verified_contents_is_kept() {
        let body = bytes_field(FIELD_VERIFIED_CONTENTS, b"contents");
        let header = decode(&body).unwrap();
        assert_eq!(header.verified_contents, Some(&b"contents"[..]));
        assert!(header.proofs.is_empty());
    }

    #[test]
    fn unknown_fields_of_every_wire_type_are_skipped() {
        let mut body = Vec::new();
        body.extend(varint(7 << 3)); // varint
        body.extend(varint(300));
        body.extend(varint(8 << 3 | 1)); // fixed64
        body.extend_from_slice(&[0xAA; 8]);
        body.extend(varint(9 << 3 | 5)); // fixed32
        body.extend_from_slice(&[0xBB; 4]);
        body.extend(bytes_field(11, b"future"));
        body.extend(bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"key", b"sig")));

        let header = decode(&body).unwrap();
        assert_eq!(header.public_keys(), vec![&b"key"[..]]);
    }

    #[test]
    fn unknown_fields_inside_proof_are_skipped() {
        let mut inner = proof(b"key", b"sig");
        inner.extend(bytes_field(5, b"extra"));
        let body = bytes_field(FIELD_SHA256_WITH_RSA, &inner);

        let header = decode(&body).unwrap();
        assert_eq!(header.signatures(), vec![&b"sig"[..]]);
    }

    #[test]
    fn trailing_padding_is_a_length_mismatch() {
        // 8 bytes of records inside a 10 byte body
        let mut body = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"k", b"s"));
        assert_eq!(body.len(), 8);
        body.extend_from_slice(&[0x00, 0x00]);

        assert_eq!(
            decode(&body),
            Err(DecodeError::LengthMismatch {
                declared: 10,
                consumed: 8
            })
        );
    }

    #[test]
    fn cut_off_key_is_a_length_mismatch() {
        let mut body = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"k", b"s"));
        body.push(0x80);

        assert_eq!(
            decode(&body),
            Err(DecodeError::LengthMismatch {
                declared: 9,
                consumed: 8
            })
        );
    }

    #[rstest]
    #[case(0x0B)] // group start
    #[case(0x09)] // fixed64
    #[case(0x0D)] // fixed32
    #[case(0x08)] // varint
    #[case(0x0A)] // length delimited
    fn lone_key_at_the_bound_is_a_length_mismatch(#[case] key: u8) {
        let mut body = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"k", b"s"));
        body.push(key);

        assert_eq!(
            decode_within(&body, 2),
            Err(DecodeError::LengthMismatch {
                declared: 9,
                consumed: 8
            })
        );
    }

    #[test]
    fn lone_key_inside_a_proof_is_malformed() {
        let mut inner = proof(b"k", b"s");
        inner.push(0x0D);
        let body = bytes_field(FIELD_SHA256_WITH_RSA, &inner);

        assert_eq!(decode(&body), Err(DecodeError::MalformedRecord { offset: 8 }));
    }

    #[test]
    fn overrunning_record_is_truncated_when_standalone() {
        let full = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"key", b"sig"));
        let body = &full[..full.len() - 1];

        assert_eq!(
            decode(body),
            Err(DecodeError::TruncatedRecord {
                offset: 0,
                declared: 10,
                available: 9
            })
        );
    }

    #[test]
    fn overrun_into_following_bytes_is_a_length_mismatch() {
        let full = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"key", b"sig"));
        let body = &full[..full.len() - 1];

        assert_eq!(
            decode_within(body, 4),
            Err(DecodeError::LengthMismatch {
                declared: 11,
                consumed: 12
            })
        );
    }

    #[test]
    fn overrun_past_everything_is_truncated() {
        let mut body = varint(u64::from(FIELD_SHA256_WITH_RSA) << 3 | 2);
        body.extend(varint(1_000));
        body.extend_from_slice(b"short");

        assert_eq!(
            decode_within(&body, 16),
            Err(DecodeError::TruncatedRecord {
                offset: 0,
                declared: 1_000,
                available: 5
            })
        );
    }

    #[test]
    fn nested_overrun_reports_absolute_offset() {
        // proof claims a 9 byte public key but carries only 3
        let mut inner = varint(u64::from(FIELD_PUBLIC_KEY) << 3 | 2);
        inner.extend(varint(9));
        inner.extend_from_slice(b"key");
        let mut body = bytes_field(11, b"xx");
        body.extend(bytes_field(FIELD_SHA256_WITH_RSA, &inner));

        assert_eq!(
            decode(&body),
            Err(DecodeError::TruncatedRecord {
                offset: 6,
                declared: 9,
                available: 3
            })
        );
    }

    #[rstest]
    #[case(proof(b"key", b""), true)]
    #[case(bytes_field(FIELD_PUBLIC_KEY, b"key"), false)]
    #[case(bytes_field(FIELD_SIGNATURE, b"sig"), false)]
    #[case(Vec::new(), false)]
    fn proof_requires_both_halves(#[case] inner: Vec<u8>, #[case] ok: bool) {
        let mut body = bytes_field(FIELD_SHA256_WITH_RSA, &proof(b"a", b"b"));
        body.extend(bytes_field(FIELD_SHA256_WITH_ECDSA, &inner));

        let result = decode(&body);
        if ok {
            assert_eq!(result.unwrap().proofs.len(), 2);
        } else {
            assert_eq!(result, Err(DecodeError::IncompleteProof { index: 1 }));
        }
    }

    #[test]
    fn known_field_with_wrong_wire_type() {
        let mut body = varint(u64::from(FIELD_SHA256_WITH_RSA) << 3);
        body.extend(varint(1));

        assert_eq!(
            decode(&body),
            Err(DecodeError::UnexpectedWireType {
                field: FIELD_SHA256_WITH_RSA,
                wire_type: 0
            })
        );
    }

    #[rstest]
    #[case(3)]
    #[case(4)]
    #[case(6)]
    #[case(7)]
    fn group_and_reserved_wire_types_are_rejected(#[case] wire_type: u8) {
        let mut body = varint(12 << 3 | u64::from(wire_type));
        body.push(0x00);
        assert_eq!(
            decode(&body),
            Err(DecodeError::UnsupportedWireType {
                offset: 0,
                wire_type
            })
        );
    }

    #[test]
    fn crx_id_must_be_16_bytes() {
        let signed_data = bytes_field(FIELD_CRX_ID, &[0x01; 15]);
        let body = bytes_field(FIELD_SIGNED_HEADER_DATA, &signed_data);
        assert_eq!(decode(&body), Err(DecodeError::InvalidCrxId { len: 15 }));
    }

    #[quickcheck]
    fn decode_never_panics(data: Vec<u8>, trailing: u8) -> bool {
        let _ = decode_within(&data, usize::from(trailing));
        true
    }

    #[quickcheck]
    fn decoded_proofs_are_paired(data: Vec<u8>) -> bool {
        match decode(&data) {
            Ok(header) => header.public_keys().len() == header.signatures().len(),
            Err(_) => true,
        }
    }
}
