//! Integration cache with single-flight computation.
//!
//! The cache maps canonical fingerprints of `(polytope, integrand)` pairs
//! to results. Concurrent requesters of the same uncached key block on a
//! per-key `OnceLock`: the first worker owns the computation, the others
//! await its value. The map itself is only locked for the brief
//! get-or-insert of the cell, never across an integration.
//!
//! The cache can be persisted as a flat JSON file keyed by fingerprint;
//! fingerprints are stable across runs of the same solver version.

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use num_bigint::BigInt;
use num_rational::BigRational;
use rustc_hash::FxHashMap;
use tracing::debug;
use wmirs_math::{Polynomial, Polytope};

use crate::error::{Result, WmiError};
use crate::integration::{fingerprint, Integrator};

type Cell = Arc<OnceLock<Result<BigRational>>>;

/// Shared concurrent memo of integration results.
#[derive(Default)]
pub struct IntegrationCache {
    cells: Mutex<FxHashMap<String, Cell>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl IntegrationCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache hits so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses so far.
    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single-flight lookup: the first caller computes, others wait.
    fn get_or_compute(
        &self,
        key: String,
        compute: impl FnOnce() -> Result<BigRational>,
    ) -> Result<BigRational> {
        let cell = {
            let mut map = self
                .cells
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            map.entry(key).or_default().clone()
        };
        if let Some(done) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return done.clone();
        }
        let mut computed = false;
        let result = cell.get_or_init(|| {
            computed = true;
            compute()
        });
        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        result.clone()
    }

    /// Persist successful entries as a flat JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut flat: FxHashMap<String, String> = FxHashMap::default();
        {
            let map = self
                .cells
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for (key, cell) in map.iter() {
                if let Some(Ok(value)) = cell.get() {
                    flat.insert(key.clone(), value.to_string());
                }
            }
        }
        let json = serde_json::to_string(&flat)?;
        std::fs::write(path, json)
    }

    /// Load entries persisted by [`Self::save`]; unparsable entries are
    /// skipped.
    pub fn load(&self, path: &Path) -> std::io::Result<usize> {
        let json = std::fs::read_to_string(path)?;
        let flat: FxHashMap<String, String> = serde_json::from_str(&json)?;
        let mut loaded = 0;
        let mut map = self
            .cells
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (key, text) in flat {
            if let Some(value) = parse_rational(&text) {
                let cell: Cell = Arc::default();
                let _ = cell.set(Ok(value));
                map.insert(key, cell);
                loaded += 1;
            }
        }
        debug!(loaded, "loaded persisted integration cache");
        Ok(loaded)
    }
}

fn parse_rational(text: &str) -> Option<BigRational> {
    match text.split_once('/') {
        Some((numer, denom)) => {
            let numer = BigInt::from_str(numer.trim()).ok()?;
            let denom = BigInt::from_str(denom.trim()).ok()?;
            if denom == BigInt::from(0) {
                return None;
            }
            Some(BigRational::new(numer, denom))
        }
        None => Some(BigRational::from_integer(BigInt::from_str(text.trim()).ok()?)),
    }
}

/// Caching wrapper around a base integrator.
pub struct CacheWrapper<I> {
    inner: I,
    cache: Arc<IntegrationCache>,
}

impl<I: Integrator> CacheWrapper<I> {
    /// Wrap with a fresh cache.
    #[must_use]
    pub fn new(inner: I) -> Self {
        Self::with_cache(inner, Arc::new(IntegrationCache::new()))
    }

    /// Wrap sharing an existing cache (e.g. across queries).
    #[must_use]
    pub fn with_cache(inner: I, cache: Arc<IntegrationCache>) -> Self {
        Self { inner, cache }
    }

    /// Handle to the shared cache.
    #[must_use]
    pub fn cache(&self) -> Arc<IntegrationCache> {
        Arc::clone(&self.cache)
    }
}

impl<I: Integrator> Integrator for CacheWrapper<I> {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational> {
        let key = fingerprint(polytope, integrand);
        self.cache
            .get_or_compute(key, || self.inner.integrate(polytope, integrand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;
    use wmirs_math::LinearConstraint;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn interval(lo: i64, hi: i64) -> Polytope {
        Polytope::new(
            1,
            vec![
                LinearConstraint::new(vec![rat(1)], rat(hi), false),
                LinearConstraint::new(vec![rat(-1)], rat(-lo), false),
            ],
        )
    }

    struct Counting {
        calls: AtomicUsize,
    }

    impl Integrator for &Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn integrate(&self, _: &Polytope, _: &Polynomial) -> Result<BigRational> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(rat(7))
        }
    }

    #[test]
    fn test_second_lookup_hits() {
        let base = Counting { calls: AtomicUsize::new(0) };
        let wrapper = CacheWrapper::new(&base);
        let p = interval(0, 1);
        let f = Polynomial::constant(1, rat(1));

        assert_eq!(wrapper.integrate(&p, &f).unwrap(), rat(7));
        assert_eq!(wrapper.integrate(&p, &f).unwrap(), rat(7));
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);
        assert_eq!(wrapper.cache().hits(), 1);
        assert_eq!(wrapper.cache().misses(), 1);
    }

    #[test]
    fn test_different_problems_do_not_collide() {
        let base = Counting { calls: AtomicUsize::new(0) };
        let wrapper = CacheWrapper::new(&base);
        let f = Polynomial::constant(1, rat(1));

        wrapper.integrate(&interval(0, 1), &f).unwrap();
        wrapper.integrate(&interval(0, 2), &f).unwrap();
        assert_eq!(base.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("wmirs-cache-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");

        let base = Counting { calls: AtomicUsize::new(0) };
        let wrapper = CacheWrapper::new(&base);
        let p = interval(0, 3);
        let f = Polynomial::variable(1, 0);
        wrapper.integrate(&p, &f).unwrap();
        wrapper.cache().save(&path).unwrap();

        let fresh_base = Counting { calls: AtomicUsize::new(0) };
        let fresh = CacheWrapper::new(&fresh_base);
        assert_eq!(fresh.cache().load(&path).unwrap(), 1);
        assert_eq!(fresh.integrate(&p, &f).unwrap(), rat(7));
        assert_eq!(fresh_base.calls.load(Ordering::SeqCst), 0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_parse_rational_forms() {
        assert_eq!(parse_rational("3"), Some(rat(3)));
        assert_eq!(
            parse_rational("1/2"),
            Some(BigRational::new(BigInt::from(1), BigInt::from(2)))
        );
        assert_eq!(parse_rational("0/1"), Some(BigRational::zero()));
        assert_eq!(parse_rational("x"), None);
        assert_eq!(parse_rational("1/0"), None);
    }
}
