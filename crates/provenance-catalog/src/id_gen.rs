//! Coordination-free 64-bit id allocation.
//!
//! An id is laid out as `[machine bits][2 namespace bits][counter]`:
//!
//! - `machine_bits = max(1, ceil(log2(num_machines)))`, so every machine id
//!   below `num_machines` fits without overlap
//! - the namespace separates item, version and successor ids, so ids drawn
//!   from different namespaces never compare equal
//! - the counter starts at 1 and grows by one per call
//!
//! Uniqueness across processes relies on every process being configured
//! with a distinct machine id. Counters live in memory only; a catalog that
//! reopens persisted state advances them past the ids it finds with
//! [`IdGenerator::observe`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::model::Id;

const NAMESPACE_BITS: u32 = 2;

/// The id spaces the generator allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdNamespace {
    Item = 0,
    Version = 1,
    Successor = 2,
}

impl IdNamespace {
    pub fn from_u8(v: u8) -> Option<IdNamespace> {
        match v {
            0 => Some(IdNamespace::Item),
            1 => Some(IdNamespace::Version),
            2 => Some(IdNamespace::Successor),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IdNamespace::Item => "item",
            IdNamespace::Version => "version",
            IdNamespace::Successor => "successor",
        }
    }
}

/// The fields of an id, as laid out by a particular generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    pub machine_id: u64,
    /// `None` when the namespace bits hold the unused value 3.
    pub namespace: Option<IdNamespace>,
    pub counter: u64,
}

/// Allocates unique ids for one machine.
#[derive(Debug)]
pub struct IdGenerator {
    machine_id: u64,
    /// Bit offset of the machine id (`k`).
    machine_shift: u32,
    counter_mask: u64,
    shared_counter: bool,
    counters: [AtomicU64; 3],
}

impl IdGenerator {
    /// Creates a generator for `machine_id` out of `num_machines`.
    ///
    /// With `shared_counter` every namespace draws from one counter; ids then
    /// differ in their counter bits as well as their namespace bits.
    pub fn new(machine_id: u32, num_machines: u32, shared_counter: bool) -> Result<Self, CatalogError> {
        if num_machines == 0 {
            return Err(CatalogError::Config("num_machines must be at least 1".into()));
        }
        if machine_id >= num_machines {
            return Err(CatalogError::Config(format!(
                "machine_id {} is out of range for {} machines",
                machine_id, num_machines
            )));
        }
        let machine_bits = machine_bits(num_machines);
        let machine_shift = 64 - machine_bits;
        let counter_mask = (1u64 << (machine_shift - NAMESPACE_BITS)) - 1;
        Ok(Self {
            machine_id: u64::from(machine_id),
            machine_shift,
            counter_mask,
            shared_counter,
            counters: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        })
    }

    /// Creates a generator from the machine settings of `config`.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::new(config.machine_id, config.num_machines, config.shared_counter)
    }

    pub fn machine_id(&self) -> u64 {
        self.machine_id
    }

    /// Returns the machine id offset `k`.
    pub fn machine_shift(&self) -> u32 {
        self.machine_shift
    }

    /// Largest counter value an id can carry.
    pub fn max_counter(&self) -> u64 {
        self.counter_mask
    }

    pub fn generate_item_id(&self) -> Result<Id, CatalogError> {
        self.generate(IdNamespace::Item)
    }

    pub fn generate_version_id(&self) -> Result<Id, CatalogError> {
        self.generate(IdNamespace::Version)
    }

    pub fn generate_successor_id(&self) -> Result<Id, CatalogError> {
        self.generate(IdNamespace::Successor)
    }

    /// Allocates the next id in `namespace`.
    ///
    /// Fails once the counter bits are used up rather than wrapping into the
    /// namespace bits.
    pub fn generate(&self, namespace: IdNamespace) -> Result<Id, CatalogError> {
        let mask = self.counter_mask;
        let previous = self
            .counter(namespace)
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < mask).then_some(c + 1)
            })
            .map_err(|_| CatalogError::IdSpaceExhausted {
                namespace: namespace.name(),
            })?;
        Ok(self.compose(namespace, previous + 1))
    }

    /// Splits an id into machine, namespace and counter fields.
    pub fn decompose(&self, id: Id) -> IdParts {
        let namespace_shift = self.machine_shift - NAMESPACE_BITS;
        IdParts {
            machine_id: id >> self.machine_shift,
            namespace: IdNamespace::from_u8(((id >> namespace_shift) & 0b11) as u8),
            counter: id & self.counter_mask,
        }
    }

    /// Advances counters so that ids allocated later sort after `id`.
    ///
    /// Ids minted by other machines, or outside the known namespaces, are
    /// ignored.
    pub fn observe(&self, id: Id) {
        let parts = self.decompose(id);
        if parts.machine_id != self.machine_id {
            return;
        }
        if let Some(namespace) = parts.namespace {
            self.counter(namespace)
                .fetch_max(parts.counter, Ordering::Relaxed);
        }
    }

    fn compose(&self, namespace: IdNamespace, counter: u64) -> Id {
        let namespace_shift = self.machine_shift - NAMESPACE_BITS;
        (self.machine_id << self.machine_shift) | ((namespace as u64) << namespace_shift) | counter
    }

    fn counter(&self, namespace: IdNamespace) -> &AtomicU64 {
        if self.shared_counter {
            &self.counters[0]
        } else {
            &self.counters[namespace as usize]
        }
    }
}

fn machine_bits(num_machines: u32) -> u32 {
    if num_machines <= 2 {
        1
    } else {
        32 - (num_machines - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rustc_hash::FxHashSet;

    use super::*;

    #[test]
    fn test_first_item_id_oracle() {
        let generator = IdGenerator::new(3, 4, false).unwrap();
        assert_eq!(generator.generate_item_id().unwrap(), (3u64 << 62) | 1);
        assert_eq!(generator.generate_item_id().unwrap(), (3u64 << 62) | 2);
    }

    #[test]
    fn test_machine_bits() {
        assert_eq!(machine_bits(1), 1);
        assert_eq!(machine_bits(2), 1);
        assert_eq!(machine_bits(3), 2);
        assert_eq!(machine_bits(4), 2);
        assert_eq!(machine_bits(5), 3);
        assert_eq!(machine_bits(1024), 10);
        assert_eq!(machine_bits(1025), 11);
    }

    #[test]
    fn test_nth_call_formula() {
        for (machine_id, num_machines) in [(0u32, 1u32), (1, 2), (5, 8), (9, 10)] {
            let generator = IdGenerator::new(machine_id, num_machines, false).unwrap();
            let k = generator.machine_shift();
            for n in 1..=5u64 {
                assert_eq!(
                    generator.generate_item_id().unwrap(),
                    (u64::from(machine_id) << k) | n
                );
            }
        }
    }

    #[test]
    fn test_namespaces_never_collide() {
        let generator = IdGenerator::new(1, 4, false).unwrap();
        let item = generator.generate_item_id().unwrap();
        let version = generator.generate_version_id().unwrap();
        let successor = generator.generate_successor_id().unwrap();
        assert_ne!(item, version);
        assert_ne!(version, successor);
        assert_eq!(generator.decompose(item).counter, 1);
        assert_eq!(generator.decompose(version).counter, 1);
        assert_eq!(generator.decompose(version).namespace, Some(IdNamespace::Version));
        assert_eq!(generator.decompose(successor).machine_id, 1);
    }

    #[test]
    fn test_generated_ids_round_trip_as_text() {
        use crate::model::{format_id, parse_id};

        let generator = IdGenerator::new(0, 1024, false).unwrap();
        let version = generator.generate_version_id().unwrap();
        assert_eq!(version, 4503599627370497);
        assert_eq!(parse_id(&version.to_string()), Some(version));
        assert_eq!(parse_id(&format_id(version)), Some(version));
    }

    #[test]
    fn test_shared_counter() {
        let generator = IdGenerator::new(0, 1, true).unwrap();
        let a = generator.generate_item_id().unwrap();
        let b = generator.generate_version_id().unwrap();
        assert_eq!(generator.decompose(a).counter, 1);
        assert_eq!(generator.decompose(b).counter, 2);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(IdGenerator::new(0, 0, false), Err(CatalogError::Config(_))));
        assert!(matches!(IdGenerator::new(4, 4, false), Err(CatalogError::Config(_))));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let generator = IdGenerator::new(0, 1, false).unwrap();
        let last = generator.compose(IdNamespace::Version, generator.max_counter());
        generator.observe(last);
        assert!(matches!(
            generator.generate_version_id(),
            Err(CatalogError::IdSpaceExhausted { namespace: "version" })
        ));
        assert!(generator.generate_item_id().is_ok());
    }

    #[test]
    fn test_observe_ignores_other_machines() {
        let generator = IdGenerator::new(0, 2, false).unwrap();
        let other = IdGenerator::new(1, 2, false).unwrap();
        for _ in 0..10 {
            generator.observe(other.generate_item_id().unwrap());
        }
        let own = generator.generate_item_id().unwrap();
        assert_eq!(generator.decompose(own).counter, 1);

        generator.observe(generator.compose(IdNamespace::Item, 40));
        assert_eq!(generator.decompose(generator.generate_item_id().unwrap()).counter, 41);
    }

    #[test]
    fn test_concurrent_generation_is_unique() {
        let generator = Arc::new(IdGenerator::new(2, 3, false).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| generator.generate_version_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = FxHashSet::default();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}
