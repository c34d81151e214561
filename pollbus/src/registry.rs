use std::collections::BTreeMap;

use crate::param::{ParamId, Parameter};

/// Ordered collection of polling parameters keyed by a stable external identifier.
///
/// Iteration order is ascending id. Ids are issued monotonically: `last_id` is a watermark
/// of the highest id ever assigned, so freed ids are never reused while the registry lives.
/// Each parameter is exclusively owned by the registry; the session derives its polling
/// index from the iteration order and rebuilds it after every mutation.
#[derive(Debug, Default)]
pub struct ParamRegistry {
    params: BTreeMap<ParamId, Parameter>,
    last_id: u32,
}

impl ParamRegistry {
    /// create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter under the given id, replacing any previous entry.
    ///
    /// Advances the id watermark when the id is higher than anything seen before.
    pub fn append(&mut self, id: ParamId, param: Parameter) {
        self.params.insert(id, param);
        if id.value > self.last_id {
            self.last_id = id.value;
        }
    }

    /// remove a parameter, returning it if present
    pub fn remove(&mut self, id: ParamId) -> Option<Parameter> {
        self.params.remove(&id)
    }

    /// borrow a parameter
    pub fn get(&self, id: ParamId) -> Option<&Parameter> {
        self.params.get(&id)
    }

    /// mutably borrow a parameter
    pub fn get_mut(&mut self, id: ParamId) -> Option<&mut Parameter> {
        self.params.get_mut(&id)
    }

    /// true if a parameter exists under the id
    pub fn contains(&self, id: ParamId) -> bool {
        self.params.contains_key(&id)
    }

    /// number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// true if the registry holds no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// highest id ever assigned, 0 if none was
    pub fn last_id(&self) -> u32 {
        self.last_id
    }

    /// the id a caller should assign next
    pub fn next_id(&self) -> ParamId {
        ParamId::new(self.last_id + 1)
    }

    /// iterate parameters in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Parameter)> {
        self.params.iter().map(|(id, param)| (*id, param))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ParamId, &mut Parameter)> {
        self.params.iter_mut().map(|(id, param)| (*id, param))
    }

    /// ids in iteration order, the source of the session's polling index
    pub(crate) fn ids(&self) -> Vec<ParamId> {
        self.params.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{FunctionCode, PollingMode};

    fn param() -> Parameter {
        Parameter::new(
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            1,
            PollingMode::AlwaysPolling,
        )
        .unwrap()
    }

    #[test]
    fn watermark_survives_removal() {
        let mut registry = ParamRegistry::new();
        registry.append(ParamId::new(1), param());
        registry.append(ParamId::new(2), param());
        registry.remove(ParamId::new(2));

        // id 2 was freed but must never be handed out again
        assert_eq!(registry.last_id(), 2);
        assert_eq!(registry.next_id(), ParamId::new(3));
    }

    #[test]
    fn iterates_in_ascending_id_order() {
        let mut registry = ParamRegistry::new();
        registry.append(ParamId::new(3), param());
        registry.append(ParamId::new(1), param());
        registry.append(ParamId::new(2), param());

        let ids: Vec<u32> = registry.iter().map(|(id, _)| id.value).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
