//! Multipart envelopes.
//!
//! An ordered sequence of frames in wire order. Receivers only ever hand
//! out complete envelopes.

use bytes::Bytes;
use smallvec::SmallVec;

/// Most envelopes carry few frames (routing id, delimiter, body).
type FrameVec = SmallVec<[Bytes; 4]>;

/// Ordered multipart message.
///
/// # Examples
///
/// ```
/// use sluice_core::envelope::Multipart;
///
/// let msg = Multipart::new()
///     .push_str("client-123")
///     .push_empty()
///     .push_str("Hello");
///
/// assert_eq!(msg.len(), 3);
/// assert_eq!(msg.get_str(2), Some("Hello"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    frames: FrameVec,
}

impl Multipart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: SmallVec::with_capacity(capacity),
        }
    }

    /// Append a frame.
    #[must_use]
    pub fn push(mut self, frame: impl Into<Bytes>) -> Self {
        self.frames.push(frame.into());
        self
    }

    /// Append a UTF-8 frame.
    #[must_use]
    pub fn push_str(mut self, s: &str) -> Self {
        self.frames.push(Bytes::copy_from_slice(s.as_bytes()));
        self
    }

    /// Append an empty delimiter frame.
    #[must_use]
    pub fn push_empty(mut self) -> Self {
        self.frames.push(Bytes::new());
        self
    }

    /// Append a frame in place.
    pub fn push_frame(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.frames.get(index)
    }

    /// Frame at `index` as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.frames
            .get(index)
            .and_then(|frame| std::str::from_utf8(frame).ok())
    }

    #[must_use]
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.frames.iter()
    }

    /// Total payload bytes across all frames.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.frames.iter().map(Bytes::len).sum()
    }

    #[must_use]
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames.into_vec()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl From<Vec<Bytes>> for Multipart {
    fn from(frames: Vec<Bytes>) -> Self {
        Self {
            frames: SmallVec::from_vec(frames),
        }
    }
}

impl From<Multipart> for Vec<Bytes> {
    fn from(msg: Multipart) -> Self {
        msg.into_frames()
    }
}

impl FromIterator<Bytes> for Multipart {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Multipart {
    type Item = Bytes;
    type IntoIter = smallvec::IntoIter<[Bytes; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Multipart {
    type Item = &'a Bytes;
    type IntoIter = std::slice::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let msg = Multipart::new()
            .push(Bytes::from_static(b"a"))
            .push(vec![b'b'])
            .push_str("c");
        let frames: Vec<_> = msg.iter().map(|f| f[0]).collect();
        assert_eq!(frames, vec![b'a', b'b', b'c']);
        assert_eq!(msg.total_bytes(), 3);
    }

    #[test]
    fn test_get_str_rejects_invalid_utf8() {
        let msg = Multipart::new().push(vec![0xff, 0xfe]);
        assert_eq!(msg.get_str(0), None);
        assert_eq!(msg.get_str(1), None);
    }

    #[test]
    fn test_from_vec() {
        let msg = Multipart::from(vec![Bytes::from_static(b"x"), Bytes::new()]);
        assert_eq!(msg.len(), 2);
        assert!(msg.get(1).unwrap().is_empty());
        assert_eq!(msg.into_frames().len(), 2);
    }
}
