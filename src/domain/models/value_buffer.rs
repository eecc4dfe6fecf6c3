//! Latest-value store shared by the controllers.

use std::collections::HashMap;

use super::ids::{ExchangeId, NodeId};
use crate::domain::errors::{CouplingError, CouplingResult};

/// Maps an exchange item to the most recent vector written for it.
///
/// `put` overwrites in place; there is no history. A key that was never
/// written is a miss, which callers either handle through [`get`] or turn
/// into an error through [`require`].
///
/// [`get`]: ValueBuffer::get
/// [`require`]: ValueBuffer::require
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBuffer {
    values: HashMap<ExchangeId, Vec<f64>>,
}

impl ValueBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: ExchangeId, values: Vec<f64>) {
        self.values.insert(id, values);
    }

    pub fn get(&self, id: &ExchangeId) -> Option<&[f64]> {
        self.values.get(id).map(Vec::as_slice)
    }

    /// Like [`ValueBuffer::get`], but a miss on `owner`'s buffer is an error.
    pub fn require(&self, owner: &NodeId, id: &ExchangeId) -> CouplingResult<&[f64]> {
        self.get(id).ok_or_else(|| CouplingError::NotYetAvailable {
            node: owner.clone(),
            id: id.clone(),
        })
    }

    pub fn get_mut(&mut self, id: &ExchangeId) -> Option<&mut Vec<f64>> {
        self.values.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites_previous_vector() {
        let mut buffer = ValueBuffer::new();
        let id = ExchangeId::from("head");
        buffer.put(id.clone(), vec![1.0, 2.0]);
        buffer.put(id.clone(), vec![3.0]);
        assert_eq!(buffer.get(&id), Some(&[3.0][..]));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_miss_is_none() {
        let buffer = ValueBuffer::new();
        assert!(buffer.get(&ExchangeId::from("missing")).is_none());
        assert!(buffer.is_empty());
        let err = buffer
            .require(&NodeId::from("ctl"), &ExchangeId::from("missing"))
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
