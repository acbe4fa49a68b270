//! Active Directory `objectGUID` decoding.

use dirq_core::{DirectoryEntry, EntryParser};

/// Attribute holding the binary GUID of an Active Directory object.
pub const OBJECT_GUID_ATTRIBUTE: &str = "objectGUID";

/// Formats a binary GUID (Active Directory format) as a string.
///
/// Values that are not 16 bytes long are hex-encoded as-is.
#[must_use]
pub fn format_guid(bytes: &[u8]) -> String {
    if bytes.len() != 16 {
        return hex::encode(bytes);
    }

    // mixed endianness: the first three groups are little-endian
    format!(
        "{}-{}-{}-{}-{}",
        hex::encode([bytes[3], bytes[2], bytes[1], bytes[0]]),
        hex::encode([bytes[5], bytes[4]]),
        hex::encode([bytes[7], bytes[6]]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..]),
    )
}

/// Entry parser that replaces the binary `objectGUID` with its text form.
#[must_use]
pub fn object_guid_parser() -> EntryParser {
    EntryParser::new(decode_object_guid)
}

fn decode_object_guid(entry: &mut DirectoryEntry) {
    let Some(key) = entry
        .binary_attributes
        .keys()
        .find(|k| k.eq_ignore_ascii_case(OBJECT_GUID_ATTRIBUTE))
        .cloned()
    else {
        return;
    };
    if let Some(values) = entry.binary_attributes.remove(&key) {
        let formatted: Vec<String> = values.iter().map(|v| format_guid(v)).collect();
        entry.append_values(OBJECT_GUID_ATTRIBUTE, formatted);
    }
}
