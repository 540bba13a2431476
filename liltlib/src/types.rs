use uuid::Uuid;

pub type Program = String;
pub type Args = Vec<std::ffi::OsString>;
pub type JobId = Uuid;
pub type Pid = u32;
pub type OutputBlob = bytes::Bytes;
