//! Extra-field records attached to local and central headers.

use super::decryption::EncryptionAlgorithm;
use super::method::CompressionMethod;
use super::zip64::{Zip64ExtendedInfo, Zip64Fields};
use crate::crypto::{AesStrength, AesVendorVersion};
use crate::io::ReadLeExt;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// Header IDs of the records this crate interprets.
pub mod header_id {
    /// ZIP64 extended information.
    pub const ZIP64: u16 = 0x0001;
    /// NTFS timestamps.
    pub const NTFS: u16 = 0x000a;
    /// Strong encryption header.
    pub const STRONG_ENCRYPTION: u16 = 0x0017;
    /// Extended timestamp.
    pub const EXTENDED_TIMESTAMP: u16 = 0x5455;
    /// Info-ZIP Unix UID/GID.
    pub const UNIX_OWNER: u16 = 0x7875;
    /// WinZip AES.
    pub const AES: u16 = 0x9901;
}

/// NTFS timestamps (0x000A, attribute tag 0x0001).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtfsTimes {
    /// Last modification.
    pub modified: Timestamp,
    /// Last access.
    pub accessed: Timestamp,
    /// Creation.
    pub created: Timestamp,
}

/// Extended timestamp (0x5455): Unix seconds.
///
/// Central headers usually carry only the modification time even when the
/// flags announce more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedTimestamp {
    /// Last modification.
    pub modified: Option<i32>,
    /// Last access.
    pub accessed: Option<i32>,
    /// Creation.
    pub created: Option<i32>,
}

/// Info-ZIP Unix owner (0x7875).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixOwner {
    /// User ID.
    pub uid: u32,
    /// Group ID.
    pub gid: u32,
}

/// WinZip AES record (0x9901).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraField {
    /// AE-1 or AE-2.
    pub vendor_version: AesVendorVersion,
    /// Key strength.
    pub strength: AesStrength,
    /// Compression method actually applied to the data.
    pub method: CompressionMethod,
}

impl AesExtraField {
    const DATA_LEN: u16 = 7;
    const VENDOR_ID: [u8; 2] = *b"AE";
}

/// Strong encryption record (0x0017).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrongEncryptionField {
    /// Record format (2).
    pub format: u16,
    /// Encryption algorithm.
    pub algorithm: EncryptionAlgorithm,
    /// Key length in bits.
    pub bit_len: u16,
    /// Processing flags.
    pub flags: u16,
    /// Certificate data; empty for password encryption.
    pub cert_data: Vec<u8>,
}

impl StrongEncryptionField {
    /// Format value written by this crate.
    pub const FORMAT: u16 = 2;
}

/// One extra-field record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// 0x0001
    Zip64(Zip64ExtendedInfo),
    /// 0x000A
    Ntfs(NtfsTimes),
    /// 0x5455
    ExtendedTimestamp(ExtendedTimestamp),
    /// 0x7875
    UnixOwner(UnixOwner),
    /// 0x9901
    Aes(AesExtraField),
    /// 0x0017
    StrongEncryption(StrongEncryptionField),
    /// Any other record, kept verbatim.
    Unknown {
        /// Header ID.
        id: u16,
        /// Record body.
        data: Vec<u8>,
    },
}

impl ExtraField {
    /// Header ID of the record.
    pub fn id(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => header_id::ZIP64,
            ExtraField::Ntfs(_) => header_id::NTFS,
            ExtraField::ExtendedTimestamp(_) => header_id::EXTENDED_TIMESTAMP,
            ExtraField::UnixOwner(_) => header_id::UNIX_OWNER,
            ExtraField::Aes(_) => header_id::AES,
            ExtraField::StrongEncryption(_) => header_id::STRONG_ENCRYPTION,
            ExtraField::Unknown { id, .. } => *id,
        }
    }

    fn parse(id: u16, data: &[u8], expect: Zip64Fields) -> Result<Self> {
        let mut r = data;
        let field = match id {
            header_id::ZIP64 => ExtraField::Zip64(Zip64ExtendedInfo::parse(data, expect)),
            header_id::NTFS => {
                r.skip(4)?;
                let mut times = None;
                while r.len() >= 4 {
                    let tag = r.read_word()?;
                    let size = r.read_word()? as usize;
                    if tag == 0x0001 && size == 24 {
                        times = Some(NtfsTimes {
                            modified: Timestamp::from_filetime(r.read_qword()?),
                            accessed: Timestamp::from_filetime(r.read_qword()?),
                            created: Timestamp::from_filetime(r.read_qword()?),
                        });
                    } else {
                        r.skip(size as u64)?;
                    }
                }
                match times {
                    Some(times) => ExtraField::Ntfs(times),
                    None => {
                        return Err(Error::InvalidFormat("NTFS extra field without times".into()));
                    }
                }
            }
            header_id::EXTENDED_TIMESTAMP => {
                let flags = r.read_byte()?;
                let mut next = |bit: u8| -> Option<i32> {
                    if flags & bit == 0 || r.len() < 4 {
                        return None;
                    }
                    r.read_dword().ok().map(|v| v as i32)
                };
                let modified = next(1);
                let accessed = next(2);
                let created = next(4);
                ExtraField::ExtendedTimestamp(ExtendedTimestamp {
                    modified,
                    accessed,
                    created,
                })
            }
            header_id::UNIX_OWNER => {
                let version = r.read_byte()?;
                if version != 1 {
                    return Err(Error::InvalidFormat(format!(
                        "Unix owner field version {}",
                        version
                    )));
                }
                let uid = read_var_uint(&mut r)?;
                let gid = read_var_uint(&mut r)?;
                ExtraField::UnixOwner(UnixOwner { uid, gid })
            }
            header_id::AES => {
                if data.len() != AesExtraField::DATA_LEN as usize {
                    return Err(Error::InvalidFormat(format!(
                        "AES extra field is {} bytes",
                        data.len()
                    )));
                }
                let version = r.read_word()?;
                let vendor = [r.read_byte()?, r.read_byte()?];
                if vendor != AesExtraField::VENDOR_ID {
                    return Err(Error::InvalidFormat("AES extra field vendor is not \"AE\"".into()));
                }
                let strength = AesStrength::from_code(r.read_byte()?)?;
                let method = CompressionMethod::from_id(r.read_word()?);
                ExtraField::Aes(AesExtraField {
                    vendor_version: AesVendorVersion::from_id(version),
                    strength,
                    method,
                })
            }
            header_id::STRONG_ENCRYPTION => {
                let format = r.read_word()?;
                let algorithm = EncryptionAlgorithm::from_id(r.read_word()?);
                let bit_len = r.read_word()?;
                let flags = r.read_word()?;
                ExtraField::StrongEncryption(StrongEncryptionField {
                    format,
                    algorithm,
                    bit_len,
                    flags,
                    cert_data: r.to_vec(),
                })
            }
            _ => ExtraField::Unknown {
                id,
                data: data.to_vec(),
            },
        };
        Ok(field)
    }

    /// Serializes the record body.
    pub fn data(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            ExtraField::Zip64(info) => out = info.to_bytes(),
            ExtraField::Ntfs(times) => {
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend_from_slice(&1u16.to_le_bytes());
                out.extend_from_slice(&24u16.to_le_bytes());
                for t in [times.modified, times.accessed, times.created] {
                    out.extend_from_slice(&t.as_filetime().to_le_bytes());
                }
            }
            ExtraField::ExtendedTimestamp(ts) => {
                let values = [ts.modified, ts.accessed, ts.created];
                let flags = values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_some())
                    .fold(0u8, |acc, (i, _)| acc | (1 << i));
                out.push(flags);
                for v in values.into_iter().flatten() {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            ExtraField::UnixOwner(owner) => {
                out.push(1);
                out.push(4);
                out.extend_from_slice(&owner.uid.to_le_bytes());
                out.push(4);
                out.extend_from_slice(&owner.gid.to_le_bytes());
            }
            ExtraField::Aes(aes) => {
                out.extend_from_slice(&aes.vendor_version.id().to_le_bytes());
                out.extend_from_slice(&AesExtraField::VENDOR_ID);
                out.push(aes.strength.code());
                out.extend_from_slice(&aes.method.id().to_le_bytes());
            }
            ExtraField::StrongEncryption(strong) => {
                out.extend_from_slice(&strong.format.to_le_bytes());
                out.extend_from_slice(&strong.algorithm.id().to_le_bytes());
                out.extend_from_slice(&strong.bit_len.to_le_bytes());
                out.extend_from_slice(&strong.flags.to_le_bytes());
                out.extend_from_slice(&strong.cert_data);
            }
            ExtraField::Unknown { data, .. } => out.extend_from_slice(data),
        }
        out
    }
}

fn read_var_uint(r: &mut &[u8]) -> Result<u32> {
    let size = r.read_byte()? as usize;
    let bytes = r.read_vec(size)?;
    if bytes[size.min(4)..].iter().any(|&b| b != 0) {
        return Err(Error::InvalidFormat("Unix owner ID wider than 32 bits".into()));
    }
    let mut buf = [0u8; 4];
    let n = size.min(4);
    buf[..n].copy_from_slice(&bytes[..n]);
    Ok(u32::from_le_bytes(buf))
}

/// The extra-field area of a header: an ordered list of records.
///
/// Records that fail to parse are kept as [`ExtraField::Unknown`] so that
/// rewriting a header never loses bytes. A tail too short to hold a record
/// header (some tools pad with zeros) is kept as well.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtraFields {
    fields: Vec<ExtraField>,
    padding: Vec<u8>,
}

impl ExtraFields {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an extra-field area.
    ///
    /// `expect` tells the ZIP64 record which sub-fields to look for.
    pub fn parse(data: &[u8], expect: Zip64Fields) -> Result<Self> {
        let mut fields = Vec::new();
        let mut rest = data;
        while rest.len() >= 4 {
            let id = u16::from_le_bytes([rest[0], rest[1]]);
            let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            if rest.len() - 4 < size {
                return Err(Error::InvalidFormat(format!(
                    "extra field {:#06x} declares {} bytes, only {} remain",
                    id,
                    size,
                    rest.len() - 4
                )));
            }
            let body = &rest[4..4 + size];
            let field = match ExtraField::parse(id, body, expect) {
                Ok(field) => field,
                Err(e) => {
                    log::warn!("keeping unparsable extra field {:#06x} opaque: {}", id, e);
                    ExtraField::Unknown {
                        id,
                        data: body.to_vec(),
                    }
                }
            };
            fields.push(field);
            rest = &rest[4 + size..];
        }
        Ok(Self {
            fields,
            padding: rest.to_vec(),
        })
    }

    /// Serializes the area.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for field in &self.fields {
            let data = field.data();
            out.extend_from_slice(&field.id().to_le_bytes());
            out.extend_from_slice(&super::field_len("extra field", data.len())?.to_le_bytes());
            out.extend_from_slice(&data);
        }
        out.extend_from_slice(&self.padding);
        super::field_len("extra field area", out.len())?;
        Ok(out)
    }

    /// Serialized length.
    pub fn len(&self) -> usize {
        self.fields.iter().map(|f| 4 + f.data().len()).sum::<usize>() + self.padding.len()
    }

    /// Returns `true` if the area is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.padding.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, ExtraField> {
        self.fields.iter()
    }

    /// Appends a record, replacing an existing one with the same ID.
    pub fn set(&mut self, field: ExtraField) {
        match self.fields.iter_mut().find(|f| f.id() == field.id()) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    /// Removes every record with the given ID.
    pub fn remove(&mut self, id: u16) {
        self.fields.retain(|f| f.id() != id);
    }

    /// The ZIP64 extended information, if present.
    pub fn zip64(&self) -> Option<&Zip64ExtendedInfo> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::Zip64(info) => Some(info),
            _ => None,
        })
    }

    /// The WinZip AES record, if present.
    pub fn aes(&self) -> Option<&AesExtraField> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::Aes(aes) => Some(aes),
            _ => None,
        })
    }

    /// The strong encryption record, if present.
    pub fn strong_encryption(&self) -> Option<&StrongEncryptionField> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::StrongEncryption(strong) => Some(strong),
            _ => None,
        })
    }

    /// NTFS times, if present.
    pub fn ntfs(&self) -> Option<&NtfsTimes> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::Ntfs(times) => Some(times),
            _ => None,
        })
    }

    /// Extended timestamp, if present.
    pub fn extended_timestamp(&self) -> Option<&ExtendedTimestamp> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::ExtendedTimestamp(ts) => Some(ts),
            _ => None,
        })
    }

    /// Unix owner, if present.
    pub fn unix_owner(&self) -> Option<&UnixOwner> {
        self.fields.iter().find_map(|f| match f {
            ExtraField::UnixOwner(owner) => Some(owner),
            _ => None,
        })
    }
}

impl FromIterator<ExtraField> for ExtraFields {
    fn from_iter<I: IntoIterator<Item = ExtraField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            padding: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(fields: ExtraFields) -> ExtraFields {
        let bytes = fields.to_bytes().unwrap();
        assert_eq!(bytes.len(), fields.len());
        let expect = Zip64Fields {
            uncompressed_size: true,
            compressed_size: true,
            ..Default::default()
        };
        ExtraFields::parse(&bytes, expect).unwrap()
    }

    #[test]
    fn test_known_records_survive() {
        let fields: ExtraFields = [
            ExtraField::Zip64(Zip64ExtendedInfo {
                uncompressed_size: Some(1 << 33),
                compressed_size: Some(1 << 32),
                ..Default::default()
            }),
            ExtraField::Ntfs(NtfsTimes {
                modified: Timestamp::from_filetime(1),
                accessed: Timestamp::from_filetime(2),
                created: Timestamp::from_filetime(3),
            }),
            ExtraField::ExtendedTimestamp(ExtendedTimestamp {
                modified: Some(1_700_000_000),
                ..Default::default()
            }),
            ExtraField::UnixOwner(UnixOwner { uid: 1000, gid: 100 }),
            ExtraField::Aes(AesExtraField {
                vendor_version: AesVendorVersion::Ae2,
                strength: AesStrength::Aes256,
                method: CompressionMethod::Deflate,
            }),
        ]
        .into_iter()
        .collect();
        assert_eq!(round_trip(fields.clone()), fields);
    }

    #[test]
    fn test_unknown_and_padding_kept_verbatim() {
        let mut bytes = vec![0x34, 0x12, 3, 0, b'a', b'b', b'c'];
        bytes.extend_from_slice(&[0, 0]);
        let fields = ExtraFields::parse(&bytes, Zip64Fields::default()).unwrap();
        assert_eq!(
            fields.iter().next(),
            Some(&ExtraField::Unknown {
                id: 0x1234,
                data: b"abc".to_vec()
            })
        );
        assert_eq!(fields.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_bad_aes_record_kept_opaque() {
        let bytes = [0x01, 0x99, 7, 0, 2, 0, b'X', b'Y', 3, 8, 0];
        let fields = ExtraFields::parse(&bytes, Zip64Fields::default()).unwrap();
        assert!(fields.aes().is_none());
        assert_eq!(fields.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_overrun_is_an_error() {
        let bytes = [0x01, 0x00, 16, 0, 1, 2, 3];
        assert!(ExtraFields::parse(&bytes, Zip64Fields::default()).is_err());
    }

    #[test]
    fn test_set_replaces_same_id() {
        let mut fields = ExtraFields::new();
        fields.set(ExtraField::UnixOwner(UnixOwner { uid: 1, gid: 1 }));
        fields.set(ExtraField::UnixOwner(UnixOwner { uid: 2, gid: 2 }));
        assert_eq!(fields.iter().count(), 1);
        assert_eq!(fields.unix_owner().unwrap().uid, 2);
        fields.remove(header_id::UNIX_OWNER);
        assert!(fields.is_empty());
    }
}
