//! Authenticator entry decoding.
//!
//! Decrypted records are protobuf messages of a fixed four-message schema:
//!
//! ```text
//! AuthenticatorEntry { Metadata metadata = 1; Content content = 2; }
//! Metadata           { string name = 1; string note = 2; string id = 3; }
//! Content            { oneof content { Totp totp = 1; Steam steam = 2; } }
//! Totp               { string uri = 1; }
//! Steam              { string secret = 1; }
//! ```
//!
//! The wire format is walked by hand (no protobuf dependency). Unlike a
//! best-effort importer this decoder is strict: truncation, bad varints,
//! group wire types, a field number of zero, wrong wire types on known
//! fields and invalid UTF-8 are all `SchemaError`s. Unknown fields are
//! skipped. Repeated scalars are last-wins, repeated sub-messages merge, and
//! the last `content` branch on the wire wins.

use log::trace;

use crate::otp_import::error::OtpError;
use crate::otp_import::types::{DecodedEntry, EntryContent, EntryMetadata};

/// Default upper bound on a decoded entry, in bytes.
pub const DEFAULT_MAX_ENTRY_LEN: usize = 1 << 20;

const MAX_VARINT_LEN: usize = 10;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Field numbers of the authenticator entry schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySchema {
    pub entry_metadata: u32,
    pub entry_content: u32,
    pub metadata_name: u32,
    pub metadata_note: u32,
    pub metadata_id: u32,
    pub content_totp: u32,
    pub content_steam: u32,
    pub totp_uri: u32,
    pub steam_secret: u32,
}

impl Default for EntrySchema {
    fn default() -> Self {
        Self {
            entry_metadata: 1,
            entry_content: 2,
            metadata_name: 1,
            metadata_note: 2,
            metadata_id: 3,
            content_totp: 1,
            content_steam: 2,
            totp_uri: 1,
            steam_secret: 1,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Wire reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireValue<'a> {
    Varint(u64),
    Fixed64,
    Fixed32,
    Bytes(&'a [u8]),
}

impl WireValue<'_> {
    fn wire_name(&self) -> &'static str {
        match self {
            Self::Varint(_) => "varint",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bytes(_) => "length-delimited",
        }
    }
}

struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_varint(&mut self) -> Result<u64, OtpError> {
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| OtpError::schema("truncated varint"))?;
            self.pos += 1;
            result |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(OtpError::schema("varint longer than 10 bytes"))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], OtpError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                OtpError::schema(format!(
                    "field of {} bytes overruns message at offset {}",
                    len, self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Next `(field_number, value)` pair, or `None` at end of message.
    fn next_field(&mut self) -> Result<Option<(u32, WireValue<'a>)>, OtpError> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let tag = self.read_varint()?;
        let field = u32::try_from(tag >> 3)
            .map_err(|_| OtpError::schema(format!("field number {} out of range", tag >> 3)))?;
        if field == 0 {
            return Err(OtpError::schema("field number 0 is reserved"));
        }
        let value = match (tag & 0x07) as u8 {
            WIRE_VARINT => WireValue::Varint(self.read_varint()?),
            WIRE_FIXED64 => {
                self.take(8)?;
                WireValue::Fixed64
            }
            WIRE_LEN => {
                let len = self.read_varint()?;
                let len = usize::try_from(len)
                    .map_err(|_| OtpError::schema("length prefix does not fit in memory"))?;
                WireValue::Bytes(self.take(len)?)
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                WireValue::Fixed32
            }
            other => {
                return Err(OtpError::schema(format!(
                    "unsupported wire type {} on field {}",
                    other, field
                )))
            }
        };
        Ok(Some((field, value)))
    }
}

fn expect_bytes<'a>(message: &str, field: u32, value: WireValue<'a>) -> Result<&'a [u8], OtpError> {
    match value {
        WireValue::Bytes(b) => Ok(b),
        other => Err(OtpError::schema(format!(
            "{}.{}: expected length-delimited, got {}",
            message,
            field,
            other.wire_name()
        ))),
    }
}

fn expect_string(message: &str, field: u32, value: WireValue<'_>) -> Result<String, OtpError> {
    let bytes = expect_bytes(message, field, value)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| OtpError::schema(format!("{}.{}: invalid UTF-8", message, field)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decoder for authenticator entry messages. Build once and share by
/// reference; it holds no mutable state.
#[derive(Debug, Clone)]
pub struct EntryDecoder {
    schema: EntrySchema,
    max_entry_len: usize,
}

impl Default for EntryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryDecoder {
    pub fn new() -> Self {
        Self {
            schema: EntrySchema::default(),
            max_entry_len: DEFAULT_MAX_ENTRY_LEN,
        }
    }

    pub fn with_schema(mut self, schema: EntrySchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_entry_len(mut self, max: usize) -> Self {
        self.max_entry_len = max;
        self
    }

    pub fn schema(&self) -> &EntrySchema {
        &self.schema
    }

    /// Decode decrypted record bytes into a [`DecodedEntry`].
    pub fn decode(&self, plaintext: &[u8]) -> Result<DecodedEntry, OtpError> {
        if plaintext.len() > self.max_entry_len {
            return Err(OtpError::schema(format!(
                "entry is {} bytes, limit is {}",
                plaintext.len(),
                self.max_entry_len
            )));
        }

        let s = &self.schema;
        let mut entry = DecodedEntry::default();
        let mut reader = WireReader::new(plaintext);
        while let Some((field, value)) = reader.next_field()? {
            if field == s.entry_metadata {
                let bytes = expect_bytes("AuthenticatorEntry", field, value)?;
                self.merge_metadata(bytes, &mut entry.metadata)?;
            } else if field == s.entry_content {
                let bytes = expect_bytes("AuthenticatorEntry", field, value)?;
                self.merge_content(bytes, &mut entry.content)?;
            } else {
                trace!("skipping unknown AuthenticatorEntry field {}", field);
            }
        }
        Ok(entry)
    }

    fn merge_metadata(&self, data: &[u8], meta: &mut EntryMetadata) -> Result<(), OtpError> {
        let s = &self.schema;
        let mut reader = WireReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            if field == s.metadata_name {
                meta.name = expect_string("Metadata", field, value)?;
            } else if field == s.metadata_note {
                meta.note = expect_string("Metadata", field, value)?;
            } else if field == s.metadata_id {
                meta.id = expect_string("Metadata", field, value)?;
            } else {
                trace!("skipping unknown Metadata field {}", field);
            }
        }
        Ok(())
    }

    fn merge_content(&self, data: &[u8], content: &mut EntryContent) -> Result<(), OtpError> {
        let s = &self.schema;
        let mut reader = WireReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            if field == s.content_totp {
                let bytes = expect_bytes("Content", field, value)?;
                let mut uri = match content {
                    EntryContent::Totp { uri } => std::mem::take(uri),
                    _ => String::new(),
                };
                self.merge_single_string("Totp", s.totp_uri, bytes, &mut uri)?;
                *content = EntryContent::Totp { uri };
            } else if field == s.content_steam {
                let bytes = expect_bytes("Content", field, value)?;
                let mut secret = match content {
                    EntryContent::Steam { secret } => std::mem::take(secret),
                    _ => String::new(),
                };
                self.merge_single_string("Steam", s.steam_secret, bytes, &mut secret)?;
                *content = EntryContent::Steam { secret };
            } else {
                trace!("skipping unknown Content field {}", field);
            }
        }
        Ok(())
    }

    fn merge_single_string(
        &self,
        message: &str,
        wanted: u32,
        data: &[u8],
        out: &mut String,
    ) -> Result<(), OtpError> {
        let mut reader = WireReader::new(data);
        while let Some((field, value)) = reader.next_field()? {
            if field == wanted {
                *out = expect_string(message, field, value)?;
            }
        }
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Encoding
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Encode an entry with this decoder's schema. Empty strings are
    /// omitted; a set `content` branch is always written.
    pub fn encode(&self, entry: &DecodedEntry) -> Vec<u8> {
        let s = &self.schema;
        let mut out = Vec::new();

        let mut meta = Vec::new();
        put_string(&mut meta, s.metadata_name, &entry.metadata.name);
        put_string(&mut meta, s.metadata_note, &entry.metadata.note);
        put_string(&mut meta, s.metadata_id, &entry.metadata.id);
        if !meta.is_empty() {
            put_bytes(&mut out, s.entry_metadata, &meta);
        }

        let mut content = Vec::new();
        match &entry.content {
            EntryContent::None => {}
            EntryContent::Totp { uri } => {
                let mut inner = Vec::new();
                put_string(&mut inner, s.totp_uri, uri);
                put_bytes(&mut content, s.content_totp, &inner);
            }
            EntryContent::Steam { secret } => {
                let mut inner = Vec::new();
                put_string(&mut inner, s.steam_secret, secret);
                put_bytes(&mut content, s.content_steam, &inner);
            }
        }
        if entry.content != EntryContent::None {
            put_bytes(&mut out, s.entry_content, &content);
        }
        out
    }
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn put_bytes(out: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_varint(out, ((field as u64) << 3) | WIRE_LEN as u64);
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn put_string(out: &mut Vec<u8>, field: u32, value: &str) {
    if !value.is_empty() {
        put_bytes(out, field, value.as_bytes());
    }
}
