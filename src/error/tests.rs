use super::*;

#[test]
fn display_includes_kind_and_message() {
    let err = BufferError::new(ErrorKind::Io, "file not found");
    assert_eq!(err.to_string(), "IO: file not found");
    assert!(err.contains_msg("not found"));
}

#[test]
fn from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = BufferError::from(io);
    assert_eq!(err.kind, ErrorKind::Io);
    assert!(err.contains_msg("missing"));
}
