//! Optional serde support. The encoding is a convenience for tests and tooling, not a stable format.

use crate::StandardRing;
use serde::{Serialize, ser::SerializeSeq};

/// Serializes the unread bytes in order, front segment first.
impl Serialize for StandardRing {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let (front, back) = self.as_slices();
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for byte in front.iter().chain(back) {
            seq.serialize_element(byte)?;
        }
        seq.end()
    }
}

#[cfg(any(unix, windows))]
mod mirrored {
    use crate::MirroredRing;
    use serde::{
        Deserialize, Serialize,
        de::{self, SeqAccess, Visitor},
        ser,
    };
    use std::fmt;

    /// Serializes the unread bytes. A closed ring fails to serialize.
    impl Serialize for MirroredRing {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let data = self.peek().map_err(ser::Error::custom)?;
            serializer.serialize_bytes(data)
        }
    }

    struct MirroredRingVisitor;

    impl MirroredRingVisitor {
        fn build<E: de::Error>(data: &[u8]) -> Result<MirroredRing, E> {
            let mut ring = MirroredRing::new(data.len().max(1)).map_err(E::custom)?;
            ring.write(data).map_err(E::custom)?;
            Ok(ring)
        }
    }

    impl<'de> Visitor<'de> for MirroredRingVisitor {
        type Value = MirroredRing;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result { formatter.write_str("a byte sequence") }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> { Self::build(v) }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut data = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                data.push(byte);
            }
            Self::build(&data)
        }
    }

    /// Builds a ring just large enough for the bytes, rounded up to the page size, holding them unread.
    impl<'de> Deserialize<'de> for MirroredRing {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_bytes(MirroredRingVisitor)
        }
    }
}
