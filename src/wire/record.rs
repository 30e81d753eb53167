//! The control record carried inside every frame.
//!
//! Fixed-width fields are encoded first with `byteorder::BigEndian`,
//! followed by length-prefixed UTF-8 strings for the variable fields. This
//! keeps the record a flat, order-fixed byte layout without reaching for a
//! general-purpose serialization crate for what is, at bottom, six scalars
//! and four strings.

use byteorder::{BigEndian, ByteOrder};

use crate::error::WireError;

/// Stable operation identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    View = 1,
    Read = 2,
    Create = 3,
    Write = 4,
    Delete = 5,
    Info = 6,
    Stream = 7,
    List = 8,
    AddAccess = 9,
    RemAccess = 10,
    Exec = 11,
    Undo = 12,
    LockSentence = 13,
    UnlockSentence = 14,
    RegisterSs = 20,
    RegisterClient = 21,
    SsAck = 22,
    CreateFolder = 23,
    Move = 24,
    ViewFolder = 25,
    Checkpoint = 26,
    ViewCheckpoint = 27,
    Revert = 28,
    ListCheckpoints = 29,
    ReqAccess = 30,
    ViewRequests = 31,
    Approve = 32,
    Deny = 33,
    ReplCreate = 34,
    ReplDelete = 35,
    ReplWrite = 36,
    ReplMove = 37,
    Recents = 38,
    ReplCreateFolder = 39,
}

impl OpCode {
    fn from_u16(v: u16) -> Result<Self, WireError> {
        use OpCode::*;
        Ok(match v {
            1 => View,
            2 => Read,
            3 => Create,
            4 => Write,
            5 => Delete,
            6 => Info,
            7 => Stream,
            8 => List,
            9 => AddAccess,
            10 => RemAccess,
            11 => Exec,
            12 => Undo,
            13 => LockSentence,
            14 => UnlockSentence,
            20 => RegisterSs,
            21 => RegisterClient,
            22 => SsAck,
            23 => CreateFolder,
            24 => Move,
            25 => ViewFolder,
            26 => Checkpoint,
            27 => ViewCheckpoint,
            28 => Revert,
            29 => ListCheckpoints,
            30 => ReqAccess,
            31 => ViewRequests,
            32 => Approve,
            33 => Deny,
            34 => ReplCreate,
            35 => ReplDelete,
            36 => ReplWrite,
            37 => ReplMove,
            38 => Recents,
            39 => ReplCreateFolder,
            other => return Err(WireError::Malformed(format!("unknown op_code {other}"))),
        })
    }
}

/// Result taxonomy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    Success = 0,
    FileNotFound = 1,
    FileExists = 2,
    AccessDenied = 3,
    SentenceLocked = 4,
    InvalidIndex = 5,
    ServerError = 6,
    ConnectionFailed = 7,
    InvalidCommand = 8,
    NotOwner = 9,
    UserNotFound = 10,
    SsNotFound = 11,
    NoUndo = 12,
}

impl ErrorCode {
    fn from_u8(v: u8) -> Result<Self, WireError> {
        use ErrorCode::*;
        Ok(match v {
            0 => Success,
            1 => FileNotFound,
            2 => FileExists,
            3 => AccessDenied,
            4 => SentenceLocked,
            5 => InvalidIndex,
            6 => ServerError,
            7 => ConnectionFailed,
            8 => InvalidCommand,
            9 => NotOwner,
            10 => UserNotFound,
            11 => SsNotFound,
            12 => NoUndo,
            other => return Err(WireError::Malformed(format!("unknown error_code {other}"))),
        })
    }

    pub fn is_success(self) -> bool {
        matches!(self, ErrorCode::Success)
    }
}

/// Bit flags carried in [`Record::flags`].
pub mod flags {
    /// `-a` (view all) / write-access grant, depending on op.
    pub const ALL_OR_WRITE: u16 = 1 << 0;
    /// `-l` (long listing).
    pub const LONG: u16 = 1 << 1;
    /// Set on messages already produced by replication — receivers must not
    /// fan these back out.
    pub const REPLICATION: u16 = 1 << 8;
}

/// The control record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub op_code: OpCode,
    pub username: String,
    pub filename: String,
    pub data: String,
    pub sentence_number: i32,
    pub word_index: i32,
    pub flags: u16,
    pub error_code: ErrorCode,
    pub error_msg: String,
}

impl Record {
    /// Builds a bare request record for `op`; callers fill in the rest via
    /// the builder-style `with_*` helpers.
    pub fn request(op: OpCode, username: impl Into<String>, filename: impl Into<String>) -> Self {
        Record {
            op_code: op,
            username: username.into(),
            filename: filename.into(),
            data: String::new(),
            sentence_number: 0,
            word_index: 0,
            flags: 0,
            error_code: ErrorCode::Success,
            error_msg: String::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_sentence(mut self, idx: i32) -> Self {
        self.sentence_number = idx;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_replication(&self) -> bool {
        self.flags & flags::REPLICATION != 0
    }

    /// Builds a reply record that echoes `op`/`filename` and carries a
    /// result code plus inline data.
    pub fn reply_ok(op: OpCode, filename: impl Into<String>, data: impl Into<String>) -> Self {
        Record {
            op_code: op,
            username: String::new(),
            filename: filename.into(),
            data: data.into(),
            sentence_number: 0,
            word_index: 0,
            flags: 0,
            error_code: ErrorCode::Success,
            error_msg: String::new(),
        }
    }

    pub fn reply_err(op: OpCode, code: ErrorCode, msg: impl Into<String>) -> Self {
        Record {
            op_code: op,
            username: String::new(),
            filename: String::new(),
            data: String::new(),
            sentence_number: 0,
            word_index: 0,
            flags: 0,
            error_code: code,
            error_msg: msg.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            2 + 4 + 4 + 2 + 1
                + 4 + self.username.len()
                + 4 + self.filename.len()
                + 4 + self.data.len()
                + 4 + self.error_msg.len(),
        );

        let mut scalar = [0u8; 2];
        BigEndian::write_u16(&mut scalar, self.op_code as u16);
        buf.extend_from_slice(&scalar);

        let mut i32buf = [0u8; 4];
        BigEndian::write_i32(&mut i32buf, self.sentence_number);
        buf.extend_from_slice(&i32buf);
        BigEndian::write_i32(&mut i32buf, self.word_index);
        buf.extend_from_slice(&i32buf);

        BigEndian::write_u16(&mut scalar, self.flags);
        buf.extend_from_slice(&scalar);

        buf.push(self.error_code as u8);

        write_string(&mut buf, &self.username);
        write_string(&mut buf, &self.filename);
        write_string(&mut buf, &self.data);
        write_string(&mut buf, &self.error_msg);

        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor { buf, pos: 0 };

        let op_code = OpCode::from_u16(cursor.read_u16()?)?;
        let sentence_number = cursor.read_i32()?;
        let word_index = cursor.read_i32()?;
        let flags = cursor.read_u16()?;
        let error_code = ErrorCode::from_u8(cursor.read_u8()?)?;
        let username = cursor.read_string()?;
        let filename = cursor.read_string()?;
        let data = cursor.read_string()?;
        let error_msg = cursor.read_string()?;

        Ok(Record {
            op_code,
            username,
            filename,
            data,
            sentence_number,
            word_index,
            flags,
            error_code,
            error_msg,
        })
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let mut len = [0u8; 4];
    BigEndian::write_u32(&mut len, s.len() as u32);
    buf.extend_from_slice(&len);
    buf.extend_from_slice(s.as_bytes());
}

/// Minimal read cursor over an in-memory decoded frame body.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn need(&self, n: usize) -> Result<(), WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::Malformed("record truncated".into()));
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        self.need(2)?;
        let v = BigEndian::read_u16(&self.buf[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    fn read_i32(&mut self) -> Result<i32, WireError> {
        self.need(4)?;
        let v = BigEndian::read_i32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        self.need(4)?;
        let v = BigEndian::read_u32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        self.need(len)?;
        let s = std::str::from_utf8(&self.buf[self.pos..self.pos + len])
            .map_err(|e| WireError::Malformed(e.to_string()))?
            .to_owned();
        self.pos += len;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request() {
        let rec = Record::request(OpCode::Write, "alice", "doc.txt")
            .with_data("1 Hello world.")
            .with_sentence(0)
            .with_flags(flags::REPLICATION);

        let encoded = rec.encode();
        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(rec, decoded);
        assert!(decoded.is_replication());
    }

    #[test]
    fn round_trips_a_reply() {
        let rec = Record::reply_err(OpCode::Read, ErrorCode::FileNotFound, "no such file");
        let decoded = Record::decode(&rec.encode()).unwrap();
        assert_eq!(decoded.error_code, ErrorCode::FileNotFound);
        assert_eq!(decoded.error_msg, "no such file");
    }

    #[test]
    fn rejects_unknown_opcode() {
        let mut buf = Record::request(OpCode::View, "u", "f").encode();
        // op_code occupies the first two bytes.
        buf[0] = 0xFF;
        buf[1] = 0xFF;
        assert!(Record::decode(&buf).is_err());
    }
}
