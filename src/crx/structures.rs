use sha2::{Digest, Sha256};

/// CRX magic number, "Cr24"
pub const CRX_MAGIC: &[u8; 4] = b"Cr24";

/// Magic + version, shared by every CRX version
pub const COMMON_PREAMBLE_SIZE: usize = 8;

/// CRX2 preamble: magic, version, key length, signature length - 16 bytes
pub const CRX2_PREAMBLE_SIZE: usize = 16;

/// CRX3 preamble: magic, version, header length - 12 bytes
pub const CRX3_PREAMBLE_SIZE: usize = 12;

/// Local File Header signature prefix expected at the start of the payload
pub const ZIP_SIGNATURE: &[u8; 2] = b"PK";

/// Container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    Crx2,
    Crx3,
}

impl FormatVersion {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            2 => Some(FormatVersion::Crx2),
            3 => Some(FormatVersion::Crx3),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            FormatVersion::Crx2 => 2,
            FormatVersion::Crx3 => 3,
        }
    }

    /// Size of the fixed preamble preceding the variable-length fields
    pub fn preamble_size(&self) -> usize {
        match self {
            FormatVersion::Crx2 => CRX2_PREAMBLE_SIZE,
            FormatVersion::Crx3 => CRX3_PREAMBLE_SIZE,
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CRX{}", self.as_u32())
    }
}

/// Signature algorithm of a CRX3 key proof.
///
/// The algorithm is implied by which `CrxFileHeader` field carried the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    RsaSha256,
    EcdsaSha256,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::RsaSha256 => f.write_str("sha256_with_rsa"),
            KeyAlgorithm::EcdsaSha256 => f.write_str("sha256_with_ecdsa"),
        }
    }
}

/// A public key and the signature made with it, borrowed from the input buffer.
///
/// CRX2 proofs carry no algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyProof<'a> {
    pub algorithm: Option<KeyAlgorithm>,
    pub public_key: &'a [u8],
    pub signature: &'a [u8],
}

/// 16-byte extension identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrxId(pub [u8; 16]);

impl CrxId {
    pub const SIZE: usize = 16;

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let id: [u8; Self::SIZE] = bytes.try_into().ok()?;
        Some(CrxId(id))
    }

    /// Derive the id from a public key: the first 16 bytes of its SHA-256.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut id = [0u8; Self::SIZE];
        id.copy_from_slice(&digest[..Self::SIZE]);
        CrxId(id)
    }

    /// Render as the 32-character `a`..`p` extension id used by Chrome.
    pub fn extension_id(&self) -> String {
        self.0
            .iter()
            .flat_map(|b| [b >> 4, b & 0x0F])
            .map(|nibble| char::from(b'a' + nibble))
            .collect()
    }
}

impl std::fmt::Display for CrxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.extension_id())
    }
}

/// Decoded CRX3 header body (`CrxFileHeader`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedHeader<'a> {
    /// Key proofs in stream order, regardless of algorithm
    pub proofs: Vec<KeyProof<'a>>,
    /// Raw `SignedData` bytes, kept verbatim for signature verification
    pub signed_header_data: Option<&'a [u8]>,
    pub verified_contents: Option<&'a [u8]>,
    /// `crx_id` decoded from the signed header data
    pub crx_id: Option<CrxId>,
}

impl<'a> SignedHeader<'a> {
    pub fn public_keys(&self) -> Vec<&'a [u8]> {
        self.proofs.iter().map(|p| p.public_key).collect()
    }

    pub fn signatures(&self) -> Vec<&'a [u8]> {
        self.proofs.iter().map(|p| p.signature).collect()
    }
}

/// Parsed container header.
///
/// Every byte field borrows from the buffer the header was parsed from. Values
/// built by hand (or received across a trust boundary) are re-checked by the
/// extractor before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerHeader<'a> {
    Crx2 {
        proof: KeyProof<'a>,
        zip_offset: usize,
    },
    Crx3 {
        /// Declared length of the header body after the 12-byte preamble
        header_length: u32,
        header: SignedHeader<'a>,
        zip_offset: usize,
    },
}

impl<'a> ContainerHeader<'a> {
    pub fn format_version(&self) -> FormatVersion {
        match self {
            ContainerHeader::Crx2 { .. } => FormatVersion::Crx2,
            ContainerHeader::Crx3 { .. } => FormatVersion::Crx3,
        }
    }

    /// Absolute offset of the ZIP payload
    pub fn zip_offset(&self) -> usize {
        match self {
            ContainerHeader::Crx2 { zip_offset, .. } | ContainerHeader::Crx3 { zip_offset, .. } => {
                *zip_offset
            }
        }
    }

    pub fn header_length(&self) -> Option<u32> {
        match self {
            ContainerHeader::Crx2 { .. } => None,
            ContainerHeader::Crx3 { header_length, .. } => Some(*header_length),
        }
    }

    pub fn proofs(&self) -> &[KeyProof<'a>] {
        match self {
            ContainerHeader::Crx2 { proof, .. } => std::slice::from_ref(proof),
            ContainerHeader::Crx3 { header, .. } => &header.proofs,
        }
    }

    pub fn public_keys(&self) -> Vec<&'a [u8]> {
        self.proofs().iter().map(|p| p.public_key).collect()
    }

    pub fn signatures(&self) -> Vec<&'a [u8]> {
        self.proofs().iter().map(|p| p.signature).collect()
    }

    pub fn signed_header_data(&self) -> Option<&'a [u8]> {
        match self {
            ContainerHeader::Crx2 { .. } => None,
            ContainerHeader::Crx3 { header, .. } => header.signed_header_data,
        }
    }

    /// Extension id: the signed `crx_id` when present, otherwise derived from
    /// the first public key.
    pub fn crx_id(&self) -> Option<CrxId> {
        if let ContainerHeader::Crx3 {
            header: SignedHeader {
                crx_id: Some(id), ..
            },
            ..
        } = self
        {
            return Some(*id);
        }

        self.proofs()
            .first()
            .map(|proof| CrxId::from_public_key(proof.public_key))
    }

    pub fn extension_id(&self) -> Option<String> {
        self.crx_id().map(|id| id.extension_id())
    }
}

/// ZIP payload view into the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipPayload<'a> {
    pub bytes: &'a [u8],
    /// First two bytes are `PK`
    pub looks_like_zip: bool,
}

impl<'a> ZipPayload<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
