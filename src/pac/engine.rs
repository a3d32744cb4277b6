// src/pac/engine.rs
use super::functions;
use super::network::HostNetwork;
use crate::error::{PacError, Result};
use boa_engine::{
    error::JsNativeErrorKind, js_string, object::builtins::JsArray, vm::RuntimeLimits, Context,
    JsError, JsResult, JsString, JsValue, NativeFunction, Script, Source,
};
use boa_gc::{empty_trace, Finalize, Trace};
use chrono::{Datelike, Local, Timelike, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// The inputs `FindProxyForURL` is called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingQuery {
    pub url: String,
    pub target_host: String,
}

impl RoutingQuery {
    pub fn new(url: impl Into<String>, target_host: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            target_host: target_host.into(),
        }
    }
}

/// Limits applied to a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalBudget {
    /// Wall-clock time the caller waits for a result.
    pub timeout: Duration,
    /// Engine-side cap so an abandoned evaluation still terminates.
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

impl Default for EvalBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            loop_iteration_limit: 1_000_000,
            recursion_limit: 256,
        }
    }
}

/// A syntax-checked PAC script together with the host functions it is
/// evaluated against.
///
/// JS contexts cannot cross threads, so every evaluation instantiates the
/// script in a fresh context on its own thread. Nothing survives between
/// two queries.
pub struct PolicyScript {
    source: Arc<str>,
    generation: u64,
    network: Arc<dyn HostNetwork>,
    budget: EvalBudget,
}

impl std::fmt::Debug for PolicyScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyScript")
            .field("generation", &self.generation)
            .field("len", &self.source.len())
            .field("budget", &self.budget)
            .finish()
    }
}

impl PolicyScript {
    /// Parses `body`. Fails with [`PacError::ScriptCompile`] on a syntax
    /// error and [`PacError::EmptyScript`] on a blank body.
    pub fn compile(
        body: &str,
        network: Arc<dyn HostNetwork>,
        budget: EvalBudget,
    ) -> Result<Self> {
        let body = body.trim();
        if body.is_empty() {
            return Err(PacError::EmptyScript);
        }

        let mut context = Context::default();
        Script::parse(Source::from_bytes(body.as_bytes()), None, &mut context)
            .map_err(|e| PacError::ScriptCompile(e.to_string()))?;

        Ok(Self {
            source: Arc::from(body),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            network,
            budget,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn budget(&self) -> EvalBudget {
        self.budget
    }

    /// Runs `FindProxyForURL(url, host)`. Faults come back as `""`.
    pub fn evaluate(&self, query: &RoutingQuery) -> String {
        match self.try_evaluate(query) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    generation = self.generation,
                    url = %query.url,
                    "PAC evaluation failed: {}",
                    e
                );
                String::new()
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate) but reports why evaluation failed.
    ///
    /// A non-string return value is not an error; it yields `""`.
    pub fn try_evaluate(&self, query: &RoutingQuery) -> Result<String> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let network = Arc::clone(&self.network);
        let budget = self.budget;
        let job = query.clone();
        let started = Instant::now();

        thread::Builder::new()
            .name("pac-eval".into())
            .spawn(move || {
                let result = execute_pac_script(&source, network, &job, &budget);
                let _ = tx.send(result);
            })
            .map_err(|e| PacError::Evaluation(format!("cannot start evaluation thread: {e}")))?;

        let result = match rx.recv_timeout(self.budget.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(PacError::ScriptTimeout(self.budget.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(PacError::Evaluation(
                "evaluation thread exited without a result".into(),
            )),
        };
        debug!(
            generation = self.generation,
            host = %query.target_host,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "FindProxyForURL -> {:?}",
            result
        );
        result
    }
}

fn execute_pac_script(
    script: &str,
    network: Arc<dyn HostNetwork>,
    query: &RoutingQuery,
    budget: &EvalBudget,
) -> Result<String> {
    let mut context = Context::default();
    let mut limits = RuntimeLimits::default();
    limits.set_loop_iteration_limit(budget.loop_iteration_limit);
    limits.set_recursion_limit(budget.recursion_limit);
    context.set_runtime_limits(limits);

    let fail = |e: JsError| classify(e, budget);

    register_pac_functions(&mut context, network).map_err(fail)?;

    context
        .eval(Source::from_bytes(script.as_bytes()))
        .map_err(fail)?;

    let global = context.global_object();
    let func_val = global
        .get(js_string!("FindProxyForURL"), &mut context)
        .map_err(fail)?;

    let func = func_val
        .as_callable()
        .ok_or_else(|| PacError::Evaluation("FindProxyForURL is not a function".into()))?;

    let args = [
        JsValue::from(JsString::from(query.url.as_str())),
        JsValue::from(JsString::from(query.target_host.as_str())),
    ];

    let result = func
        .call(&JsValue::undefined(), &args, &mut context)
        .map_err(fail)?;

    Ok(result
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default())
}

fn classify(err: JsError, budget: &EvalBudget) -> PacError {
    let limit_hit = err
        .as_native()
        .is_some_and(|native| matches!(native.kind, JsNativeErrorKind::RuntimeLimit));
    if limit_hit {
        PacError::ScriptTimeout(budget.timeout)
    } else {
        PacError::Evaluation(err.to_string())
    }
}

#[derive(Clone, Finalize)]
struct NetworkCapture {
    network: Arc<dyn HostNetwork>,
}

// Holds no GC pointers.
unsafe impl Trace for NetworkCapture {
    empty_trace!();
}

type NetworkFn = fn(&[JsValue], &dyn HostNetwork, &mut Context) -> JsResult<JsValue>;

fn register_network_fn(
    context: &mut Context,
    name: &str,
    length: usize,
    capture: &NetworkCapture,
    body: NetworkFn,
) -> JsResult<()> {
    let function = NativeFunction::from_copy_closure_with_captures(
        move |_this, args, captures: &NetworkCapture, ctx| {
            body(args, captures.network.as_ref(), ctx)
        },
        capture.clone(),
    );
    context.register_global_callable(JsString::from(name), length, function)
}

fn register_pac_functions(context: &mut Context, network: Arc<dyn HostNetwork>) -> JsResult<()> {
    let capture = NetworkCapture { network };

    // isPlainHostName(host)
    context.register_global_callable(
        js_string!("isPlainHostName"),
        1,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            Ok(functions::is_plain_host_name(&string_arg(args, 0)).into())
        }),
    )?;

    // dnsDomainIs(host, domain)
    context.register_global_callable(
        js_string!("dnsDomainIs"),
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            Ok(functions::dns_domain_is(&string_arg(args, 0), &string_arg(args, 1)).into())
        }),
    )?;

    // localHostOrDomainIs(host, hostdom)
    context.register_global_callable(
        js_string!("localHostOrDomainIs"),
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            Ok(
                functions::local_host_or_domain_is(&string_arg(args, 0), &string_arg(args, 1))
                    .into(),
            )
        }),
    )?;

    // shExpMatch(str, shexp)
    context.register_global_callable(
        js_string!("shExpMatch"),
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            Ok(functions::sh_exp_match(&string_arg(args, 0), &string_arg(args, 1)).into())
        }),
    )?;

    // dnsDomainLevels(host)
    context.register_global_callable(
        js_string!("dnsDomainLevels"),
        1,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let levels = functions::dns_domain_levels(&string_arg(args, 0));
            Ok(JsValue::from(levels as u32))
        }),
    )?;

    register_network_fn(context, "dnsResolve", 1, &capture, |args, network, _ctx| {
        Ok(match functions::dns_resolve(network, &string_arg(args, 0)) {
            Some(ip) => JsValue::from(JsString::from(ip.as_str())),
            None => JsValue::null(),
        })
    })?;

    register_network_fn(context, "isResolvable", 1, &capture, |args, network, _ctx| {
        Ok(functions::is_resolvable(network, &string_arg(args, 0)).into())
    })?;

    register_network_fn(context, "myIpAddress", 0, &capture, |_args, network, _ctx| {
        let ip = functions::my_ip_address(network).unwrap_or_default();
        Ok(JsValue::from(JsString::from(ip.as_str())))
    })?;

    // isInNet(host, pattern, mask) or isInNet([host, pattern, mask])
    register_network_fn(context, "isInNet", 3, &capture, |args, network, ctx| {
        let parts = in_net_args(args, ctx);
        Ok(functions::is_in_net(network, &parts[0], &parts[1], &parts[2]).into())
    })?;

    // weekdayRange(wd1, [wd2], [gmt])
    context.register_global_callable(
        js_string!("weekdayRange"),
        3,
        NativeFunction::from_fn_ptr(|_this, args, ctx| {
            let args = coerced_args(args, ctx);
            let in_range =
                functions::weekday_range(&args, Local::now().weekday(), Utc::now().weekday());
            Ok(in_range.into())
        }),
    )?;

    // timeRange(hour1, [hour2], [gmt])
    context.register_global_callable(
        js_string!("timeRange"),
        7,
        NativeFunction::from_fn_ptr(|_this, args, ctx| {
            let args = coerced_args(args, ctx);
            let in_range = functions::time_range(&args, Local::now().hour(), Utc::now().hour());
            Ok(in_range.into())
        }),
    )?;

    Ok(())
}

/// String argument at `index`; anything that is not a JS string reads as `""`.
fn string_arg(args: &[JsValue], index: usize) -> String {
    args.get(index)
        .and_then(|v| v.as_string())
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default()
}

/// Every argument converted with JS `String(...)` semantics.
fn coerced_args(args: &[JsValue], ctx: &mut Context) -> Vec<String> {
    args.iter()
        .map(|v| {
            v.to_string(ctx)
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default()
        })
        .collect()
}

fn in_net_args(args: &[JsValue], ctx: &mut Context) -> [String; 3] {
    if let [single] = args {
        if let Some(array) = single
            .as_object()
            .filter(|obj| obj.is_array())
            .and_then(|obj| JsArray::from_object(obj.clone()).ok())
        {
            return [0u32, 1, 2].map(|i| {
                array
                    .get(i, ctx)
                    .ok()
                    .and_then(|v| v.as_string().map(|s| s.to_std_string_escaped()))
                    .unwrap_or_default()
            });
        }
    }
    [0, 1, 2].map(|i| string_arg(args, i))
}
