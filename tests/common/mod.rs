//! Builders for synthetic CRX packages.

#![allow(dead_code)]

pub const ZIP: &[u8] = b"PK\x03\x04\x14\x00\x00\x00\x00\x00rest-of-archive";

pub fn varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
    out
}

/// Length-delimited protobuf field
pub fn field(number: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = varint(u64::from(number) << 3 | 2);
    out.extend(varint(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

pub fn crx2(key: &[u8], sig: &[u8], zip: &[u8]) -> Vec<u8> {
    let mut out = b"Cr24".to_vec();
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(&(sig.len() as u32).to_le_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(sig);
    out.extend_from_slice(zip);
    out
}

/// Wrap an encoded header body, declaring `header_length` for it
pub fn crx3_raw(header_length: u32, body: &[u8], zip: &[u8]) -> Vec<u8> {
    let mut out = b"Cr24".to_vec();
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&header_length.to_le_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(zip);
    out
}

pub fn crx3(body: &[u8], zip: &[u8]) -> Vec<u8> {
    crx3_raw(body.len() as u32, body, zip)
}

/// `CrxFileHeader` encoder
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    body: Vec<u8>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rsa(self, key: &[u8], sig: &[u8]) -> Self {
        self.proof(2, key, sig)
    }

    pub fn ecdsa(self, key: &[u8], sig: &[u8]) -> Self {
        self.proof(3, key, sig)
    }

    fn proof(mut self, number: u32, key: &[u8], sig: &[u8]) -> Self {
        let mut proof = field(1, key);
        proof.extend(field(2, sig));
        self.body.extend(field(number, &proof));
        self
    }

    pub fn signed_data(mut self, crx_id: &[u8; 16]) -> Self {
        self.body.extend(field(10000, &field(1, crx_id)));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.body
    }
}
