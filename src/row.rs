// Fixed-width row codec.
//
// A row is (id, username, email) serialized into a 293-byte slot inside a
// leaf cell. Text columns are stored as fixed-width fields holding the text
// bytes, a terminating NUL, and zero padding.

use std::fmt;

/// Maximum username length in bytes (the stored field adds a NUL).
pub const USERNAME_MAX: usize = 32;
/// Maximum email length in bytes (the stored field adds a NUL).
pub const EMAIL_MAX: usize = 255;

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = USERNAME_MAX + 1;
pub const EMAIL_SIZE: usize = EMAIL_MAX + 1;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized size of a row: 4 + 33 + 256 = 293 bytes.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table row. Field length limits are enforced during statement
/// preparation, before a `Row` is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Write the row into a `ROW_SIZE` destination slice. The id is stored
    /// little-endian, like every other on-disk integer.
    pub fn serialize(&self, dst: &mut [u8]) {
        dst[ID_OFFSET..USERNAME_OFFSET].copy_from_slice(&self.id.to_le_bytes());
        write_text_field(&mut dst[USERNAME_OFFSET..EMAIL_OFFSET], &self.username);
        write_text_field(&mut dst[EMAIL_OFFSET..ROW_SIZE], &self.email);
    }

    /// Read a row back out of a `ROW_SIZE` source slice. Text fields end at
    /// the first NUL byte.
    pub fn deserialize(src: &[u8]) -> Row {
        let id = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        Row {
            id,
            username: read_text_field(&src[USERNAME_OFFSET..EMAIL_OFFSET]),
            email: read_text_field(&src[EMAIL_OFFSET..ROW_SIZE]),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn write_text_field(field: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    field[..bytes.len()].copy_from_slice(bytes);
    for b in &mut field[bytes.len()..] {
        *b = 0;
    }
}

fn read_text_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
