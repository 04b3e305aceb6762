//! Runs one build: parallel scan and forward, barrier, registry patch.

use crate::context::BuildContext;
use crate::error::{PipelineError, PipelineErrorExt};
use crate::output::{OutputLayout, OutputResolver};
use crate::report::{BuildReport, RegistryReport};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn};
use weave_container::{Container, purge_stale_temps};
use weave_discovery::{DiscoverySnapshot, RegistryLocation, ScanStats};
use weave_domain::config::WeaveConfig;
use weave_domain::invocation::{BuildInvocation, BuildTarget, ContainerInput, ContainerKind};
use weave_domain::names::QualifiedName;
use weave_patcher::{PatchPlan, patch_registry};

/// Entry point for build hosts.
///
/// # Example
///
/// ```rust,no_run
/// use weave::Pipeline;
/// use weave::domain::config::WeaveConfig;
/// use weave::domain::invocation::BuildInvocation;
///
/// # async fn run(invocation: BuildInvocation) -> Result<(), weave::PipelineError> {
/// let report = Pipeline::new(WeaveConfig::default()).run(&invocation).await?;
/// println!("registered {} units", report.discovered.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: WeaveConfig,
    outputs: Option<Arc<dyn OutputResolver>>,
}

/// Result of one container task.
#[derive(Debug)]
struct Processed {
    index: usize,
    kind: ContainerKind,
    destination: PathBuf,
    stats: Option<ScanStats>,
}

impl Pipeline {
    #[must_use]
    pub const fn new(config: WeaveConfig) -> Self {
        Self { config, outputs: None }
    }

    /// Replaces the default [`OutputLayout`] below the invocation's output root.
    #[must_use]
    pub fn with_outputs(mut self, outputs: Arc<dyn OutputResolver>) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Runs the build described by `invocation`.
    ///
    /// Every input is forwarded to its output location. For application targets the
    /// selected inputs are scanned as well, and once all of them are done the registry
    /// class in the forwarded output is patched in place.
    ///
    /// # Errors
    /// The first container, discovery or patch failure aborts the build. A missing
    /// registry is an error only when the configuration requires one.
    pub async fn run(&self, invocation: &BuildInvocation) -> Result<BuildReport, PipelineError> {
        let outputs = self
            .outputs
            .clone()
            .unwrap_or_else(|| Arc::new(OutputLayout::new(&invocation.output_root)));
        let ctx = Arc::new(BuildContext::new(self.config.clone(), outputs)?);

        if invocation.output_root.is_dir() {
            purge_stale_temps(&invocation.output_root).await;
        }

        let scan = invocation.target == BuildTarget::Application;
        info!(
            build_target = ?invocation.target,
            inputs = invocation.inputs.len(),
            workers = ctx.config.workers,
            "Build started"
        );
        if !scan {
            info!("Library target: forwarding without scanning");
        }

        let destinations = resolve_destinations(&ctx, &invocation.inputs)?;
        let processed = process_all(&ctx, &invocation.inputs, &destinations, scan).await?;

        let mut report = BuildReport {
            target: invocation.target,
            containers: processed.len(),
            outputs: destinations,
            ..BuildReport::default()
        };
        for stats in processed.iter().filter_map(|p| p.stats) {
            report.scanned += 1;
            report.entries += stats.entries;
            report.decoded += stats.decoded;
        }

        if !scan {
            info!(containers = report.containers, "Build finished");
            return Ok(report);
        }

        let DiscoverySnapshot { names, registry } = ctx.aggregator.finalize(ctx.config.scan.order);
        report.discovered = names;

        match registry {
            Some(location) => {
                let output = &processed[location.container];
                report.registry = Some(patch(&ctx, location, output, report.discovered.clone()).await?);
            },
            None if ctx.config.require_registry => {
                return Err(PipelineError::RegistryNotFound {
                    message: ctx.config.registry.class_name.clone().into(),
                    context: None,
                });
            },
            None => warn!(
                registry = %ctx.config.registry.class_name,
                discovered = report.discovered.len(),
                "Registry class not found, nothing patched"
            ),
        }

        info!(
            containers = report.containers,
            scanned = report.scanned,
            decoded = report.decoded,
            discovered = report.discovered.len(),
            patched = report.patched(),
            "Build finished"
        );
        Ok(report)
    }
}

fn resolve_destinations(
    ctx: &BuildContext,
    inputs: &[ContainerInput],
) -> Result<Vec<PathBuf>, PipelineError> {
    let destinations: Vec<PathBuf> =
        inputs.iter().enumerate().map(|(index, input)| ctx.outputs.resolve(index, input)).collect();

    let mut seen = HashSet::with_capacity(destinations.len());
    for (input, destination) in inputs.iter().zip(&destinations) {
        if !seen.insert(destination) {
            return Err(PipelineError::Internal {
                message: format!("{} resolves to an output already in use", input.name).into(),
                context: Some(destination.display().to_string().into()),
            });
        }
    }
    Ok(destinations)
}

/// Scans and forwards every input on the blocking pool, at most `workers` at once.
/// Results come back in input order.
async fn process_all(
    ctx: &Arc<BuildContext>,
    inputs: &[ContainerInput],
    destinations: &[PathBuf],
    scan: bool,
) -> Result<Vec<Processed>, PipelineError> {
    let permits = Arc::new(Semaphore::new(ctx.config.workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut processed = Vec::with_capacity(inputs.len());
    let mut failure = None;

    for (index, (input, destination)) in inputs.iter().zip(destinations).enumerate() {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|err| PipelineError::Internal { message: err.to_string().into(), context: None })?;

        // stop handing out work once something has failed
        while let Some(joined) = tasks.try_join_next() {
            collect(joined, &mut processed, &mut failure);
        }
        if failure.is_some() {
            break;
        }

        let ctx = Arc::clone(ctx);
        let input = input.clone();
        let destination = destination.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            process_one(&ctx, index, &input, destination, scan)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        collect(joined, &mut processed, &mut failure);
    }
    if let Some(err) = failure {
        return Err(err);
    }

    processed.sort_by_key(|p| p.index);
    Ok(processed)
}

fn collect(
    joined: Result<Result<Processed, PipelineError>, tokio::task::JoinError>,
    processed: &mut Vec<Processed>,
    failure: &mut Option<PipelineError>,
) {
    let result = joined.map_err(PipelineError::from).and_then(|result| result);
    match result {
        Ok(done) => processed.push(done),
        Err(err) if failure.is_none() => *failure = Some(err),
        Err(err) => debug!(error = %err, "Further failure after the build was aborted"),
    }
}

fn process_one(
    ctx: &BuildContext,
    index: usize,
    input: &ContainerInput,
    destination: PathBuf,
    scan: bool,
) -> Result<Processed, PipelineError> {
    let span = info_span!("container", index, name = %input.name);
    let _entered = span.enter();

    let container = Container::open(input.kind, &input.path).context(input.name.clone())?;

    let selected = scan && input.scopes.intersects(ctx.config.scan.scopes);
    let stats = if selected {
        let stats = ctx.scanner.scan(index, &container, &ctx.aggregator)?;
        debug!(entries = stats.entries, decoded = stats.decoded, matches = stats.matches, "Container scanned");
        Some(stats)
    } else {
        debug!(scopes = ?input.scopes, "Container not scanned");
        None
    };

    container.forward(&destination).context(input.name.clone())?;
    debug!(to = %destination.display(), "Container forwarded");

    Ok(Processed { index, kind: input.kind, destination, stats })
}

/// Patches the registry inside its forwarded container.
async fn patch(
    ctx: &Arc<BuildContext>,
    location: RegistryLocation,
    output: &Processed,
    units: Vec<QualifiedName>,
) -> Result<RegistryReport, PipelineError> {
    let plan = PatchPlan::from_config(&ctx.config.registry, units)?;
    let kind = output.kind;
    let destination = output.destination.clone();

    tokio::task::spawn_blocking(move || -> Result<RegistryReport, PipelineError> {
        let span = info_span!("registry", container = location.container, entry = %location.entry);
        let _entered = span.enter();

        let container = Container::open(kind, &destination)?;
        let payload = container.read(&location.entry)?;
        let patched = patch_registry(&payload, &plan).context(location.entry.to_string())?;

        let changed = patched.payload != payload;
        if changed {
            container.replace(&location.entry, &patched.payload)?;
        }
        info!(patched = changed, registrations = plan.len(), sites = patched.sites, "Registry processed");

        Ok(RegistryReport {
            container: location.container,
            entry: location.entry.to_string(),
            output: destination,
            patched: changed,
            routines: patched.routines,
            sites: patched.sites,
        })
    })
    .await?
}

/// Runs `invocation` with `config` using the default output layout.
///
/// # Errors
/// See [`Pipeline::run`].
pub async fn run(config: WeaveConfig, invocation: &BuildInvocation) -> Result<BuildReport, PipelineError> {
    Pipeline::new(config).run(invocation).await
}
