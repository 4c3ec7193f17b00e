//! NT status codes returned by protocol-level calls
//!
//! A `FileStore` reports the outcome of every primitive as an NT status.
//! The stream engine branches on exactly four classes: success, end-of-file,
//! pending (transient, retry), and everything else (fatal).

use std::fmt;

/// Raw 32-bit NT status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);

    /// Request accepted but still in progress; retry the same request.
    pub const PENDING: NtStatus = NtStatus(0x0000_0103);

    /// Read past the end of the file. Not an error at the stream layer.
    pub const END_OF_FILE: NtStatus = NtStatus(0xC000_0011);

    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000_003A);
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC000_0035);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const LOGON_FAILURE: NtStatus = NtStatus(0xC000_006D);
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008);
    pub const NOT_A_DIRECTORY: NtStatus = NtStatus(0xC000_0103);
    pub const FILE_IS_A_DIRECTORY: NtStatus = NtStatus(0xC000_00BA);
    pub const DIRECTORY_NOT_EMPTY: NtStatus = NtStatus(0xC000_0101);
    pub const NOT_SUPPORTED: NtStatus = NtStatus(0xC000_00BB);
    pub const UNSUCCESSFUL: NtStatus = NtStatus(0xC000_0001);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_pending(self) -> bool {
        self == Self::PENDING
    }

    pub fn is_eof(self) -> bool {
        self == Self::END_OF_FILE
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NtStatus(0x{:08X})", self.0)
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
