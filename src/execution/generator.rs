//! Lazy sequence generation for streaming steps
//!
//! Wraps a step's resolved input sequence in a pull-based iterator: items
//! are drawn one at a time, dropped when the filter rejects them, and cut
//! off when the yield cap is reached. Each `LazySequence` gets its own cap
//! budget, so one streaming step cannot starve another.

use crate::core::data::Data;
use crate::core::error::EngineError;
use crate::core::filter::Filter;

/// Single-pass iterator over a data sequence with filtering and a yield cap.
///
/// Yields `Ok(item)` for each item that passes the filter, up to the cap.
/// A filter evaluation failure yields one `Err` and exhausts the sequence;
/// after exhaustion (for any reason) `next` returns `None` forever.
pub struct LazySequence<I> {
    source: I,
    filter: Option<Filter>,
    cap: Option<u64>,
    consumed: u64,
    yielded: u64,
    exhausted: bool,
}

impl<I> LazySequence<I>
where
    I: Iterator<Item = Data>,
{
    /// Wrap a source sequence with an optional filter and yield cap
    pub fn new(source: I, filter: Option<Filter>, cap: Option<u64>) -> Self {
        Self {
            source,
            filter,
            cap,
            consumed: 0,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Items yielded so far (post-filter)
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Source items drawn so far, including ones the filter rejected.
    /// After a yield, `consumed() - 1` is the yielded item's source position.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Whether the sequence has been exhausted
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<I> Iterator for LazySequence<I>
where
    I: Iterator<Item = Data>,
{
    type Item = Result<Data, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        if let Some(cap) = self.cap {
            if self.yielded >= cap {
                self.exhausted = true;
                return None;
            }
        }

        loop {
            let item = match self.source.next() {
                Some(item) => item,
                None => {
                    self.exhausted = true;
                    return None;
                }
            };
            self.consumed += 1;

            match &self.filter {
                None => {
                    self.yielded += 1;
                    return Some(Ok(item));
                }
                Some(filter) => match filter.evaluate(&item) {
                    Ok(true) => {
                        self.yielded += 1;
                        return Some(Ok(item));
                    }
                    Ok(false) => continue,
                    Err(e) => {
                        self.exhausted = true;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}
