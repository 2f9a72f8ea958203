//! Data Source Adapter – forward-only cursors over record sequences.
//!
//! A [`DataSource`] is primed on construction: `current()` is the first
//! record, or `None` for an empty sequence. Cursors never rewind.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::Record;

/// Signal returned by [`DataSource::advance`] once the sequence is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted;

/// Forward-only cursor tracking the current and previous record.
pub struct DataSource<'d> {
    items: Box<dyn Iterator<Item = Record> + 'd>,
    current: Option<Rc<Record>>,
    previous: Option<Rc<Record>>,
    consumed: usize,
}

impl<'d> DataSource<'d> {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'd,
    {
        let mut items: Box<dyn Iterator<Item = Record> + 'd> = Box::new(items.into_iter());
        let current = items.next().map(Rc::new);
        let consumed = usize::from(current.is_some());
        Self {
            items,
            current,
            previous: None,
            consumed,
        }
    }

    pub fn current(&self) -> Option<&Rc<Record>> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&Rc<Record>> {
        self.previous.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Zero-based index of the current record (the last one once exhausted).
    pub fn index(&self) -> usize {
        self.consumed.saturating_sub(1)
    }

    /// Shift `current` into `previous` and pull the next record.
    pub fn advance(&mut self) -> std::result::Result<Rc<Record>, Exhausted> {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        match self.items.next() {
            Some(next) => {
                let next = Rc::new(next);
                self.current = Some(Rc::clone(&next));
                self.consumed += 1;
                Ok(next)
            }
            None => Err(Exhausted),
        }
    }
}

impl fmt::Debug for DataSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("current", &self.current)
            .field("consumed", &self.consumed)
            .finish()
    }
}

/// Named dataset bindings supplied to one render call.
#[derive(Default, Debug)]
pub struct DataSets<'d> {
    sources: HashMap<String, DataSource<'d>>,
}

impl<'d> DataSets<'d> {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Bind `name` to a record sequence, replacing any earlier binding.
    pub fn bind<I>(&mut self, name: impl Into<String>, items: I) -> &mut Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'd,
    {
        self.sources.insert(name.into(), DataSource::new(items));
        self
    }

    pub fn with<I>(mut self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: 'd,
    {
        self.bind(name, items);
        self
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataSource<'d>> {
        self.sources.get_mut(name)
    }

    pub fn get(&self, name: &str) -> Option<&DataSource<'d>> {
        self.sources.get(name)
    }

    /// Detach a cursor while a detail run consumes it.
    pub(crate) fn take(&mut self, name: &str) -> Option<DataSource<'d>> {
        self.sources.remove(name)
    }

    /// Re-attach a cursor, keeping its position.
    pub(crate) fn restore(&mut self, name: &str, source: DataSource<'d>) {
        self.sources.insert(name.to_string(), source);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl DataSets<'static> {
    /// Parse a bindings document: a JSON object mapping dataset names to
    /// arrays of records.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(map) = value else {
            return Err(Error::config("data bindings must be a JSON object of arrays"));
        };
        let mut sets = DataSets::new();
        for (name, records) in map {
            match records {
                Value::Array(items) => {
                    sets.bind(name, items);
                }
                _ => {
                    return Err(Error::config(format!(
                        "dataset '{name}' must be an array of records"
                    )))
                }
            }
        }
        Ok(sets)
    }
}
