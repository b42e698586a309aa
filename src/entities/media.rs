//! Media referenced by a clip: footage, a nested sequence, or nothing.

use std::rc::Rc;
use std::sync::Arc;

use super::footage::Footage;
use super::sequence::SharedSequence;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Footage,
    Sequence,
    Null,
}

/// Tagged media reference. Sequences are shared so several clips can nest
/// the same sequence.
#[derive(Clone, Debug, Default)]
pub enum Media {
    Footage(Arc<Footage>),
    Sequence(SharedSequence),
    #[default]
    Null,
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        match self {
            Media::Footage(_) => MediaKind::Footage,
            Media::Sequence(_) => MediaKind::Sequence,
            Media::Null => MediaKind::Null,
        }
    }

    pub fn as_footage(&self) -> Option<&Arc<Footage>> {
        match self {
            Media::Footage(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SharedSequence> {
        match self {
            Media::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// True if both refer to the same shared sequence
    pub fn is_sequence(&self, sequence: &SharedSequence) -> bool {
        self.as_sequence().is_some_and(|s| Rc::ptr_eq(s, sequence))
    }
}

impl From<Footage> for Media {
    fn from(footage: Footage) -> Self {
        Media::Footage(Arc::new(footage))
    }
}

impl From<Arc<Footage>> for Media {
    fn from(footage: Arc<Footage>) -> Self {
        Media::Footage(footage)
    }
}

impl From<SharedSequence> for Media {
    fn from(sequence: SharedSequence) -> Self {
        Media::Sequence(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sequence::Sequence;

    /// Narrowing accessors only succeed for the matching tag
    #[test]
    fn test_narrowing() {
        let footage: Media = Footage::video("a.png", 10, 10, 30.0, 1).into();
        assert_eq!(footage.kind(), MediaKind::Footage);
        assert!(footage.as_footage().is_some());
        assert!(footage.as_sequence().is_none());

        let seq = Sequence::new("nested", 10, 10, 30.0).shared();
        let nested: Media = Rc::clone(&seq).into();
        assert_eq!(nested.kind(), MediaKind::Sequence);
        assert!(nested.is_sequence(&seq));
        assert!(nested.as_footage().is_none());

        assert_eq!(Media::Null.kind(), MediaKind::Null);
    }
}
