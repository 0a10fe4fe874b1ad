//! The WMI solver facade and integration dispatcher.
//!
//! A single-threaded driver enumerates assignment cells and converts them
//! into integration jobs; the enumerator is stateful and never shared.
//! With `workers > 1` the driver pushes jobs onto a bounded queue drained
//! by scoped worker threads, overlapping enumeration with integration.
//! Workers poll the cancellation token between jobs and never abort an
//! in-flight integration; their failures come back over the result channel
//! instead of crossing the thread boundary as panics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use tracing::{debug, info, warn};
use wmirs_core::{TermId, TermManager};
use wmirs_math::{Polynomial, Polytope};

use crate::convert::AssignmentConverter;
use crate::domain::Domain;
use crate::enumeration::{AssignmentStream, Enumerator};
use crate::error::{Result, WmiError};
use crate::integration::{
    AxisAlignedWrapper, CacheWrapper, IntegrationCache, Integrator,
};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct WmiOptions {
    /// Wall-clock deadline for a whole query; expiry returns
    /// [`WmiError::Timeout`].
    pub timeout: Option<Duration>,
    /// Per-integration-job budget; only meaningful with `best_effort`.
    pub job_timeout: Option<Duration>,
    /// In best-effort mode, failed or over-budget jobs contribute 0 and
    /// flag the result as partial instead of aborting the query.
    pub best_effort: bool,
    /// Worker threads for integration; 0 or 1 runs the deterministic
    /// sequential path.
    pub workers: usize,
    /// Capacity of the bounded job queue between driver and workers.
    pub queue_capacity: usize,
    /// Memoize integrals by canonical fingerprint.
    pub cache: bool,
}

impl Default for WmiOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            job_timeout: None,
            best_effort: false,
            workers: 1,
            queue_capacity: 64,
            cache: true,
        }
    }
}

/// Result of one WMI query.
#[derive(Debug, Clone)]
pub struct WmiResult {
    /// The weighted model integral, accumulated exactly.
    pub value: BigRational,
    /// Number of enumerated assignment cells.
    pub n_cells: usize,
    /// Number of integrals actually computed by a backend.
    pub n_integrations: usize,
    /// Number of integrals answered from the cache.
    pub n_cached: usize,
    /// True when best-effort mode replaced failed jobs with 0; the value
    /// is then a lower bound.
    pub partial: bool,
}

impl WmiResult {
    /// The integral as a double.
    #[must_use]
    pub fn value_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }
}

struct Job {
    polytope: Polytope,
    integrand: Polynomial,
    factor: BigInt,
}

/// Running tally of a query.
struct Tally {
    value: BigRational,
    n_cells: usize,
    n_jobs: usize,
    partial: bool,
}

impl Tally {
    fn new() -> Self {
        Self {
            value: BigRational::zero(),
            n_cells: 0,
            n_jobs: 0,
            partial: false,
        }
    }
}

/// Weighted Model Integration solver.
///
/// Composes an enumerator with an integration stack (axis-aligned fast
/// path over an optional cache over the base backend) and accumulates
/// `sum 2^k * integral` per query.
pub struct WmiSolver {
    enumerator: Box<dyn Enumerator>,
    integrator: Arc<dyn Integrator>,
    cache: Option<Arc<IntegrationCache>>,
    options: WmiOptions,
    cancel: Arc<AtomicBool>,
}

impl fmt::Debug for WmiSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WmiSolver")
            .field("cache", &self.cache.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WmiSolver {
    /// Build a solver from backends.
    ///
    /// Missing backends are construction-time errors
    /// ([`WmiError::NoEnumerator`], [`WmiError::NoIntegrator`]).
    pub fn new(
        enumerator: Option<Box<dyn Enumerator>>,
        integrator: Option<Box<dyn Integrator>>,
        options: WmiOptions,
    ) -> Result<Self> {
        let enumerator = enumerator.ok_or(WmiError::NoEnumerator)?;
        let base = integrator.ok_or(WmiError::NoIntegrator)?;

        let (integrator, cache): (Arc<dyn Integrator>, _) = if options.cache {
            let cache = Arc::new(IntegrationCache::new());
            let stack =
                AxisAlignedWrapper::new(CacheWrapper::with_cache(base, Arc::clone(&cache)));
            (Arc::new(stack), Some(cache))
        } else {
            (Arc::new(AxisAlignedWrapper::new(base)), None)
        };

        Ok(Self {
            enumerator,
            integrator,
            cache,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Token that cancels in-flight queries when set; polled by the driver
    /// between enumeration steps and by workers between jobs.
    ///
    /// The token stays set until the caller clears it, so a cancelled
    /// solver keeps refusing queries until then.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Handle to the shared integration cache, when enabled.
    #[must_use]
    pub fn cache(&self) -> Option<Arc<IntegrationCache>> {
        self.cache.as_ref().map(Arc::clone)
    }

    /// Compute the weighted model integral of one query.
    pub fn compute(
        &self,
        tm: &mut TermManager,
        query: TermId,
        domain: &Domain,
    ) -> Result<WmiResult> {
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let hits_before = self.cache.as_ref().map_or(0, |c| c.hits());

        debug!(dim = domain.dim(), "starting WMI query");
        let mut stream = self.enumerator.enumerate(tm, query)?;
        stream.set_deadline(deadline);
        stream.set_cancel_token(Arc::clone(&self.cancel));

        // Boolean atoms declared in the domain but absent from the formula
        // are free in every cell.
        let extra_bools = domain
            .bools()
            .iter()
            .filter(|b| !stream.bool_universe().contains(b))
            .count() as u32;

        let converter = AssignmentConverter::new(self.enumerator.weights(), domain);

        let tally = if self.options.workers > 1 {
            self.run_parallel(tm, &mut stream, &converter, extra_bools, deadline)?
        } else {
            self.run_sequential(tm, &mut stream, &converter, extra_bools, deadline)?
        };

        let hits_after = self.cache.as_ref().map_or(0, |c| c.hits());
        let n_cached = hits_after - hits_before;
        let result = WmiResult {
            value: tally.value,
            n_cells: tally.n_cells,
            n_integrations: tally.n_jobs.saturating_sub(n_cached),
            n_cached,
            partial: tally.partial,
        };
        info!(
            volume = result.value_f64(),
            cells = result.n_cells,
            integrations = result.n_integrations,
            cached = result.n_cached,
            "WMI query done"
        );
        Ok(result)
    }

    /// Compute several queries against the shared support, weight and
    /// cache.
    pub fn compute_many(
        &self,
        tm: &mut TermManager,
        queries: &[TermId],
        domain: &Domain,
    ) -> Result<Vec<WmiResult>> {
        queries
            .iter()
            .map(|&q| self.compute(tm, q, domain))
            .collect()
    }

    /// Pull the next integration job off the stream, applying the
    /// empty-polytope and zero-integrand short circuits.
    fn next_job(
        &self,
        tm: &mut TermManager,
        stream: &mut AssignmentStream,
        converter: &AssignmentConverter<'_>,
        extra_bools: u32,
        tally: &mut Tally,
    ) -> Result<Option<Job>> {
        while let Some(item) = stream.next(tm) {
            let (assignment, k) = item.map_err(|e| match e {
                WmiError::EnumerationTimeout => WmiError::Timeout,
                other => other,
            })?;
            tally.n_cells += 1;
            let (polytope, integrand) = converter.convert(tm, &assignment)?;
            if integrand.is_zero() || polytope.is_empty()? {
                continue;
            }
            tally.n_jobs += 1;
            let factor = BigInt::one() << (k + extra_bools);
            return Ok(Some(Job { polytope, integrand, factor }));
        }
        Ok(None)
    }

    fn run_sequential(
        &self,
        tm: &mut TermManager,
        stream: &mut AssignmentStream,
        converter: &AssignmentConverter<'_>,
        extra_bools: u32,
        deadline: Option<Instant>,
    ) -> Result<Tally> {
        let mut tally = Tally::new();
        while let Some(job) = self.next_job(tm, stream, converter, extra_bools, &mut tally)? {
            self.check_interrupted(deadline)?;
            let outcome = self.run_job(&job);
            let contribution = self.settle(&job, outcome, &mut tally.partial)?;
            tally.value += contribution;
        }
        Ok(tally)
    }

    /// Fan jobs out to scoped workers over a bounded queue while the
    /// driver keeps enumerating.
    fn run_parallel(
        &self,
        tm: &mut TermManager,
        stream: &mut AssignmentStream,
        converter: &AssignmentConverter<'_>,
        extra_bools: u32,
        deadline: Option<Instant>,
    ) -> Result<Tally> {
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(self.options.queue_capacity.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<(Job, Result<BigRational>)>();

        let mut tally = Tally::new();
        let mut driver_error: Option<WmiError> = None;
        // per-query shutdown flag: a failed job drains the pool without
        // poisoning the solver-wide cancellation token
        let abort = Arc::new(AtomicBool::new(false));

        std::thread::scope(|scope| {
            for _ in 0..self.options.workers {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                let integrator = Arc::clone(&self.integrator);
                let cancel = Arc::clone(&self.cancel);
                let abort = Arc::clone(&abort);
                let job_timeout = self.options.job_timeout;
                scope.spawn(move || loop {
                    if cancel.load(Ordering::Relaxed) || abort.load(Ordering::Relaxed) {
                        break;
                    }
                    let job = {
                        let Ok(guard) = job_rx.lock() else { break };
                        guard.recv()
                    };
                    let Ok(job) = job else { break };
                    let started = Instant::now();
                    let mut outcome = integrator.integrate(&job.polytope, &job.integrand);
                    if let Some(budget) = job_timeout {
                        if outcome.is_ok() && started.elapsed() > budget {
                            outcome = Err(WmiError::Timeout);
                        }
                    }
                    if result_tx.send((job, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            // Driver: enumerate, convert, feed the bounded queue. The
            // backpressure wait keeps polling interruption so a full queue
            // can never wedge a cancelled query.
            'drive: loop {
                if let Err(e) = self.check_interrupted(deadline) {
                    driver_error = Some(e);
                    break;
                }
                let mut job = match self.next_job(tm, stream, converter, extra_bools, &mut tally)
                {
                    Ok(Some(job)) => job,
                    Ok(None) => break,
                    Err(e) => {
                        driver_error = Some(e);
                        break;
                    }
                };
                loop {
                    match job_tx.try_send(job) {
                        Ok(()) => break,
                        Err(mpsc::TrySendError::Full(back)) => {
                            job = back;
                            if abort.load(Ordering::Relaxed) {
                                break 'drive;
                            }
                            if let Err(e) = self.check_interrupted(deadline) {
                                driver_error = Some(e);
                                break 'drive;
                            }
                            std::thread::sleep(Duration::from_millis(1));
                        }
                        Err(mpsc::TrySendError::Disconnected(_)) => break 'drive,
                    }
                }
            }
            if driver_error.is_some() {
                abort.store(true, Ordering::Relaxed);
            }
            drop(job_tx);

            // Drain worker results; errors cancel the remaining workers.
            while let Ok((job, outcome)) = result_rx.recv() {
                match self.settle(&job, outcome, &mut tally.partial) {
                    Ok(contribution) => tally.value += contribution,
                    Err(e) => {
                        if driver_error.is_none() {
                            driver_error = Some(e);
                        }
                        abort.store(true, Ordering::Relaxed);
                    }
                }
            }
        });

        match driver_error {
            Some(e) => Err(e),
            None => Ok(tally),
        }
    }

    fn run_job(&self, job: &Job) -> Result<BigRational> {
        let started = Instant::now();
        let outcome = self.integrator.integrate(&job.polytope, &job.integrand);
        if let Some(budget) = self.options.job_timeout {
            if outcome.is_ok() && started.elapsed() > budget {
                return Err(WmiError::Timeout);
            }
        }
        outcome
    }

    /// Fold one job outcome into the accumulator, applying best-effort
    /// downgrade of failures.
    fn settle(
        &self,
        job: &Job,
        outcome: Result<BigRational>,
        partial: &mut bool,
    ) -> Result<BigRational> {
        match outcome {
            Ok(value) => Ok(value * BigRational::from_integer(job.factor.clone())),
            Err(err) if self.options.best_effort && !err.is_fatal() => {
                warn!(%err, "best-effort: job contributes 0, result is a lower bound");
                *partial = true;
                Ok(BigRational::zero())
            }
            Err(err) => Err(err),
        }
    }

    fn check_interrupted(&self, deadline: Option<Instant>) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(WmiError::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() > deadline {
                return Err(WmiError::Timeout);
            }
        }
        Ok(())
    }
}
