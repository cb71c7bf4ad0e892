/// Status byte returned by every master call.
pub type Status = u8;

pub const STATUS_OK: Status = 0;
pub const ERROR_EPERM: Status = 1;
pub const ERROR_ENOTDIR: Status = 2;
pub const ERROR_ENOENT: Status = 3;
pub const ERROR_EACCES: Status = 4;
pub const ERROR_EEXIST: Status = 5;
pub const ERROR_EINVAL: Status = 6;
pub const ERROR_ENOTEMPTY: Status = 7;
pub const ERROR_CHUNKLOST: Status = 8;
pub const ERROR_OUTOFMEMORY: Status = 9;
pub const ERROR_INDEXTOOBIG: Status = 10;
pub const ERROR_LOCKED: Status = 11;
pub const ERROR_NOCHUNKSERVERS: Status = 12;
pub const ERROR_NOCHUNK: Status = 13;
pub const ERROR_CHUNKBUSY: Status = 14;
pub const ERROR_REGISTER: Status = 15;
pub const ERROR_NOTDONE: Status = 16;
pub const ERROR_NOTOPENED: Status = 17;
pub const ERROR_NOTSTARTED: Status = 18;
pub const ERROR_WRONGVERSION: Status = 19;
pub const ERROR_CHUNKEXIST: Status = 20;
pub const ERROR_NOSPACE: Status = 21;
pub const ERROR_IO: Status = 22;
pub const ERROR_BNUMTOOBIG: Status = 23;
pub const ERROR_WRONGSIZE: Status = 24;
pub const ERROR_WRONGOFFSET: Status = 25;
pub const ERROR_CANTCONNECT: Status = 26;
pub const ERROR_WRONGCHUNKID: Status = 27;
pub const ERROR_DISCONNECTED: Status = 28;
pub const ERROR_CRC: Status = 29;
pub const ERROR_DELAYED: Status = 30;
pub const ERROR_CANTCREATEPATH: Status = 31;
pub const ERROR_MISMATCH: Status = 32;
pub const ERROR_EROFS: Status = 33;
pub const ERROR_QUOTA: Status = 34;
pub const ERROR_BADSESSIONID: Status = 35;
pub const ERROR_NOPASSWORD: Status = 36;
pub const ERROR_BADPASSWORD: Status = 37;
pub const ERROR_NOTLOCKED: Status = 38;

/// Human readable text for a status byte.
pub fn describe(status: Status) -> &'static str {
    match status {
        STATUS_OK => "OK",
        ERROR_EPERM => "Operation not permitted",
        ERROR_ENOTDIR => "Not a directory",
        ERROR_ENOENT => "No such file or directory",
        ERROR_EACCES => "Permission denied",
        ERROR_EEXIST => "File exists",
        ERROR_EINVAL => "Invalid argument",
        ERROR_ENOTEMPTY => "Directory not empty",
        ERROR_CHUNKLOST => "Chunk lost",
        ERROR_OUTOFMEMORY => "Out of memory",
        ERROR_INDEXTOOBIG => "Index too big",
        ERROR_LOCKED => "Chunk locked",
        ERROR_NOCHUNKSERVERS => "No chunk servers",
        ERROR_NOCHUNK => "No such chunk",
        ERROR_CHUNKBUSY => "Chunk is busy",
        ERROR_REGISTER => "Incorrect register BLOB",
        ERROR_NOTDONE => "None of chunk servers performed requested operation",
        ERROR_NOTOPENED => "File not opened",
        ERROR_NOTSTARTED => "Write not started",
        ERROR_WRONGVERSION => "Wrong chunk version",
        ERROR_CHUNKEXIST => "Chunk already exists",
        ERROR_NOSPACE => "No space left",
        ERROR_IO => "IO error",
        ERROR_BNUMTOOBIG => "Incorrect block number",
        ERROR_WRONGSIZE => "Incorrect size",
        ERROR_WRONGOFFSET => "Incorrect offset",
        ERROR_CANTCONNECT => "Can't connect",
        ERROR_WRONGCHUNKID => "Incorrect chunk id",
        ERROR_DISCONNECTED => "Disconnected",
        ERROR_CRC => "CRC error",
        ERROR_DELAYED => "Operation delayed",
        ERROR_CANTCREATEPATH => "Can't create path",
        ERROR_MISMATCH => "Data mismatch",
        ERROR_EROFS => "Read-only file system",
        ERROR_QUOTA => "Quota exceeded",
        ERROR_BADSESSIONID => "Bad session id",
        ERROR_NOPASSWORD => "Password is needed",
        ERROR_BADPASSWORD => "Incorrect password",
        ERROR_NOTLOCKED => "Chunk not locked",
        _ => "Unknown error",
    }
}
