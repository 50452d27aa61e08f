//! Declarative macro generating the closed `EventType` enum.
//!
//! Keeping the event-kind vocabulary in one macro invocation means adding a
//! kind never means touching `Display`, `FromStr`, and serde separately —
//! they all derive from the same list.

macro_rules! define_event_types {
    ($( $variant:ident => $wire:literal ),+ $(,)?) => {
        /// The closed set of event kinds a `SessionEvent` may carry.
        ///
        /// Wire representation is the dotted string (`"session.start"`), not
        /// the Rust variant name — `Serialize`/`Deserialize` are hand-written
        /// in terms of [`std::fmt::Display`]/[`std::str::FromStr`] below.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum EventType {
            $( $variant, )+
        }

        impl std::fmt::Display for EventType {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $( EventType::$variant => $wire, )+
                };
                f.write_str(s)
            }
        }

        impl std::str::FromStr for EventType {
            type Err = crate::errors::EventStoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(EventType::$variant), )+
                    other => Err(crate::errors::EventStoreError::InvalidEventType(other.to_string())),
                }
            }
        }

        impl serde::Serialize for EventType {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for EventType {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        /// Every event kind, in declaration order. Used to build FTS type
        /// filters and for exhaustiveness tests.
        pub const ALL_EVENT_TYPES: &[EventType] = &[ $( EventType::$variant, )+ ];
    };
}

pub(crate) use define_event_types;
