use anyhow::{Context, Result};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::attributes::AttributeSet;
use crate::counter::AttributeCounter;
use crate::pool::CancelFlag;

/// Read buffer for a single JSON file
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// What one file contributed to the counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Top-level objects fully walked
    pub objects: u64,
    /// Values recorded after comma splitting
    pub occurrences: u64,
}

/// Streams one JSON document and records every tracked attribute value.
///
/// The document must be an array of objects. Inside each object:
/// - string and number members whose key is tracked are recorded,
///   split on `,` with each segment trimmed and empty segments dropped
/// - object members are walked with the same rules, whatever their key
/// - array members are flattened one level: scalars are recorded under the
///   member's key, objects are walked, nested arrays are skipped
/// - booleans and nulls are skipped
///
/// Values are recorded as they stream past, so when the document turns out
/// to be malformed partway through, everything seen before the error stays
/// counted.
pub struct Extractor<'a> {
    attributes: &'a AttributeSet,
    counter: &'a AttributeCounter,
    stats: ExtractStats,
    cancel: Option<CancelFlag>,
}

impl<'a> Extractor<'a> {
    pub fn new(attributes: &'a AttributeSet, counter: &'a AttributeCounter) -> Self {
        Self {
            attributes,
            counter,
            stats: ExtractStats::default(),
            cancel: None,
        }
    }

    /// Stop at the next object member once `cancel` is raised.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled<E: de::Error>(&self) -> Result<(), E> {
        match &self.cancel {
            Some(cancel) if cancel.is_cancelled() => Err(E::custom("extraction cancelled by phase timeout")),
            _ => Ok(()),
        }
    }

    /// Counts recorded so far, including any prefix walked before a failure.
    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    pub fn extract_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        debug!("Extracting attributes from {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        self.extract_reader(reader)
            .with_context(|| format!("Invalid JSON in {}", path.display()))
    }

    pub fn extract_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        RootSeed(self).deserialize(&mut de)?;
        de.end()?;
        Ok(())
    }

    /// Walk the members of an object whose first key has already been read.
    fn walk_members<'de, A: MapAccess<'de>>(&mut self, first: Option<String>, mut map: A) -> Result<(), A::Error> {
        let mut next = first;
        while let Some(key) = next {
            self.check_cancelled::<A::Error>()?;
            map.next_value_seed(ValueSeed {
                extractor: &mut *self,
                key: &key,
                in_array: false,
            })?;
            next = map.next_key()?;
        }
        Ok(())
    }

    fn note(&mut self, key: &str, text: &str) {
        if text.is_empty() || !self.attributes.contains(key) {
            return;
        }
        for segment in text.split(',').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            self.counter.record(key, segment);
            self.stats.occurrences += 1;
        }
    }
}

/// Map key serde_json uses to hand over a number's source text when
/// `arbitrary_precision` is enabled.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Top level: an array whose elements must all be objects
struct RootSeed<'w, 'a>(&'w mut Extractor<'a>);

impl<'de> DeserializeSeed<'de> for RootSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for RootSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of objects at the root")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element_seed(RecordSeed(&mut *self.0))?.is_some() {
            self.0.stats.objects += 1;
        }
        Ok(())
    }
}

/// One element of the root array
struct RecordSeed<'w, 'a>(&'w mut Extractor<'a>);

impl<'de> DeserializeSeed<'de> for RecordSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(ObjectVisitor(self.0))
    }
}

struct ObjectVisitor<'w, 'a>(&'w mut Extractor<'a>);

impl<'de> Visitor<'de> for ObjectVisitor<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let first = map.next_key::<String>()?;
        self.0.walk_members(first, map)
    }
}

/// A member value, or an element of a member's array; `key` is the member name.
struct ValueSeed<'w, 'a, 'k> {
    extractor: &'w mut Extractor<'a>,
    key: &'k str,
    in_array: bool,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_, '_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_, '_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.extractor.note(self.key, v);
        Ok(())
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_none<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let first = map.next_key::<String>()?;
        if first.as_deref() == Some(NUMBER_TOKEN) {
            // A number literal, delivered as a one-entry map holding its text.
            let text: String = map.next_value()?;
            self.extractor.note(self.key, &text);
            return Ok(());
        }
        self.extractor.walk_members(first, map)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        if self.in_array {
            // Arrays nested in arrays are not expanded.
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            return Ok(());
        }
        while seq
            .next_element_seed(ValueSeed {
                extractor: &mut *self.extractor,
                key: self.key,
                in_array: true,
            })?
            .is_some()
        {}
        Ok(())
    }
}
