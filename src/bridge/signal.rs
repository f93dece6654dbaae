//! Signals: the atomic unit of transfer across the bridge.

use std::fmt;

/// One discrete message, delivered whole or not at all.
///
/// The bytes are carried verbatim; the bridge never adds, strips or rewrites
/// the delimiter.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Signal {
    data: Vec<u8>,
}

impl Signal {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the last byte is `delimiter`.
    pub fn is_terminated(&self, delimiter: u8) -> bool {
        self.data.last() == Some(&delimiter)
    }

    /// Lossy UTF-8 view, for logs and text front ends.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<Vec<u8>> for Signal {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Signal {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl From<&str> for Signal {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Signal {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq<[u8]> for Signal {
    fn eq(&self, other: &[u8]) -> bool {
        self.data == other
    }
}

impl PartialEq<&[u8]> for Signal {
    fn eq(&self, other: &&[u8]) -> bool {
        self.data == *other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for Signal {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.data == other[..]
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({:?})", self.to_text())
    }
}

/// Split a byte stream into signals at each `delimiter`.
///
/// Every returned slice keeps its delimiter. A trailing fragment without a
/// delimiter is returned as the last slice; an empty input yields nothing.
pub fn split_signals(bytes: &[u8], delimiter: u8) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    for end in memchr::memchr_iter(delimiter, bytes) {
        parts.push(&bytes[start..=end]);
        start = end + 1;
    }
    if start < bytes.len() {
        parts.push(&bytes[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination() {
        assert!(Signal::from("XYZ\n").is_terminated(b'\n'));
        assert!(!Signal::from("XYZ").is_terminated(b'\n'));
        assert!(!Signal::default().is_terminated(b'\n'));
    }

    #[test]
    fn test_comparisons() {
        let signal = Signal::from("ABC\n");
        assert_eq!(signal, b"ABC\n");
        assert_eq!(signal.len(), 4);
        assert_eq!(format!("{signal:?}"), "Signal(\"ABC\\n\")");
    }

    #[test]
    fn test_split_signals() {
        let parts = split_signals(b"XYZ\nABC\ntail", b'\n');
        assert_eq!(parts, vec![&b"XYZ\n"[..], &b"ABC\n"[..], &b"tail"[..]]);

        let parts = split_signals(b"\n\n", b'\n');
        assert_eq!(parts, vec![&b"\n"[..], &b"\n"[..]]);

        assert!(split_signals(b"", b'\n').is_empty());
    }
}
