//! Conversion of ldap3 search entries into directory records

use ldap3::SearchEntry;

use dirsync_core::ports::DirectoryRecord;

/// Renders a binary attribute value as text
///
/// 16-byte values are taken to be Active Directory GUIDs and rendered in
/// their registry form (first three groups little-endian); anything else
/// becomes lower-case hex.
#[must_use]
pub fn binary_value_to_string(value: &[u8]) -> String {
    if let Ok(b) = <[u8; 16]>::try_from(value) {
        return format!(
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        );
    }
    value.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Builds a record from a search entry, keeping binary attributes as text
#[must_use]
pub fn record_from_entry(entry: SearchEntry) -> DirectoryRecord {
    let mut record = DirectoryRecord::new(entry.dn);
    for (name, values) in entry.attrs {
        record = record.with_attribute(&name, values);
    }
    for (name, values) in entry.bin_attrs {
        let values = values.iter().map(|v| binary_value_to_string(v)).collect();
        record = record.with_attribute(&name, values);
    }
    record
}
