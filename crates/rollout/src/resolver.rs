//! Pool membership resolution.

use crate::backend::PoolControl;
use crate::error::Result;
use crate::types::PoolMembership;

/// Works out every pool an instance must be drained from and rejoined to.
pub struct MembershipResolver<'a> {
    pools: &'a dyn PoolControl,
}

impl<'a> MembershipResolver<'a> {
    /// Create a resolver over a pool API.
    pub fn new(pools: &'a dyn PoolControl) -> Self {
        Self { pools }
    }

    /// Union of the pools that list `instance_id` now and the pools in
    /// `persisted`, the record left by an interrupted run.
    ///
    /// A crash after deregistration leaves no live trace of those pools, so
    /// the persisted record is the only evidence they must be rejoined.
    pub fn resolve(
        &self,
        instance_id: &str,
        persisted: Option<&PoolMembership>,
    ) -> Result<PoolMembership> {
        log::info!("Finding pools containing instance [{instance_id}]...");
        let live: PoolMembership = self
            .pools
            .describe_pools_containing(instance_id)?
            .into_iter()
            .collect();
        for pool in live.iter() {
            log::info!("Found pool [{pool}]");
        }

        match persisted {
            Some(stale) if !stale.is_empty() => {
                log::info!("Pools containing [{instance_id}] from prior failed run(s) = {stale}");
                Ok(live.union(stale))
            }
            _ => Ok(live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPools;

    fn membership(pools: &[&str]) -> PoolMembership {
        pools.iter().copied().collect()
    }

    #[test]
    fn test_union_of_live_and_persisted() {
        let pools = MockPools::new().with_member("A", "i-1");
        let resolver = MembershipResolver::new(&pools);

        let resolved = resolver.resolve("i-1", Some(&membership(&["B"]))).unwrap();
        assert_eq!(resolved, membership(&["A", "B"]));
    }

    #[test]
    fn test_overlap_collapses() {
        let pools = MockPools::new()
            .with_member("A", "i-1")
            .with_member("B", "i-1");
        let resolver = MembershipResolver::new(&pools);

        let resolved = resolver
            .resolve("i-1", Some(&membership(&["B", "C"])))
            .unwrap();
        assert_eq!(resolved, membership(&["A", "B", "C"]));
    }

    #[test]
    fn test_live_only() {
        let pools = MockPools::new()
            .with_member("A", "i-1")
            .with_member("Z", "i-2");
        let resolver = MembershipResolver::new(&pools);

        assert_eq!(resolver.resolve("i-1", None).unwrap(), membership(&["A"]));
    }

    #[test]
    fn test_persisted_only() {
        let pools = MockPools::new();
        let resolver = MembershipResolver::new(&pools);

        let resolved = resolver.resolve("i-1", Some(&membership(&["B"]))).unwrap();
        assert_eq!(resolved, membership(&["B"]));
    }

    #[test]
    fn test_neither_source_is_empty() {
        let pools = MockPools::new().with_member("A", "i-2");
        let resolver = MembershipResolver::new(&pools);

        let resolved = resolver.resolve("i-1", None).unwrap();
        assert!(resolved.is_empty());
    }
}
