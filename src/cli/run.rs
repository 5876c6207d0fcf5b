//! `reloadr run`: load a script, start reload triggers, call its entry.

use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use reloadr::config::ReloadrConfig;
use reloadr::reload::Proxy;
use reloadr::script::{Module, RuntimeError, ScriptError};
use reloadr::utils::path::display_relative;
use reloadr::{debug, debug_do, log, logger};

use super::RunArgs;

/// Effective run settings: config file values with CLI overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub entry: String,
    pub watch: bool,
    pub timer: Option<Duration>,
    pub verbose: bool,
}

impl RunSettings {
    pub fn resolve(config: &ReloadrConfig, args: &RunArgs) -> Self {
        let timer = match args.timer {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => config.timer_interval(),
        };
        Self {
            entry: args.entry.clone().unwrap_or_else(|| config.run.entry.clone()),
            watch: args.watch.unwrap_or(config.watch.enabled),
            timer,
            verbose: args.verbose || config.log.verbose,
        }
    }

    fn has_triggers(&self) -> bool {
        self.watch || self.timer.is_some()
    }
}

pub fn run_script(args: &RunArgs, config: &ReloadrConfig, shutdown: &Receiver<()>) -> Result<()> {
    let settings = RunSettings::resolve(config, args);
    logger::set_verbose(settings.verbose);
    debug!("run"; "{:?}", settings);

    let module = match Module::load(&args.script) {
        Ok(module) => module,
        Err(ScriptError::Runtime(RuntimeError::Interrupted)) => {
            interrupted();
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to load `{}`", args.script.display()));
        }
    };
    let proxies = module.proxies();
    debug_do! {
        let names: Vec<_> = proxies.iter().map(|p| p.target().to_string()).collect();
        debug!("run"; "reloadable: {}", names.join(", "));
    }

    start_triggers(&proxies, &settings)?;

    let result = call_entry(&module, &settings.entry);
    let keep_running = settings.has_triggers() || proxies.iter().any(|p| p.trigger_count() > 0);
    let outcome = match result {
        Ok(()) if keep_running && !proxies.is_empty() => {
            log!("run"; "reloading {}, press Ctrl+C to stop", display_relative(module.path()));
            // Either a send or a disconnect means stop
            let _ = shutdown.recv();
            Ok(())
        }
        Ok(()) => Ok(()),
        Err(RuntimeError::Interrupted) => {
            interrupted();
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("`{}` failed", settings.entry)),
    };

    let stopped: usize = proxies.iter().map(Proxy::stop_triggers).sum();
    debug!("run"; "stopped {} trigger(s)", stopped);
    outcome
}

/// Start the configured triggers on every proxy in the module.
fn start_triggers(proxies: &[Proxy], settings: &RunSettings) -> Result<()> {
    for proxy in proxies {
        // `@autoreload` proxies already watch their file
        if settings.watch && proxy.trigger_count() == 0 {
            let handle = proxy
                .start_watch_reload()
                .with_context(|| format!("cannot watch {}", proxy.target()))?;
            proxy.keep_trigger(handle);
        }
        if let Some(interval) = settings.timer {
            let handle = proxy
                .start_timer_reload(interval)
                .with_context(|| format!("cannot start timer for {}", proxy.target()))?;
            proxy.keep_trigger(handle);
        }
    }
    if settings.has_triggers() && !proxies.is_empty() {
        log!(
            "reload";
            "{} proxies, watch: {}, timer: {}",
            proxies.len(),
            settings.watch,
            settings
                .timer
                .map_or_else(|| "off".to_string(), |t| format!("{t:?}"))
        );
    }
    Ok(())
}

/// Call the entry function if the script defines one.
fn call_entry(module: &Module, entry: &str) -> Result<(), RuntimeError> {
    if module.get(entry).is_none() {
        debug!("run"; "no `{}` defined, nothing to call", entry);
        return Ok(());
    }
    module.call(entry, &[]).map(|_| ())
}

fn interrupted() {
    log!("run"; "interrupted");
}
