pub(crate) mod bytes;
mod utf16;

pub use self::utf16::read_terminated_utf16;
