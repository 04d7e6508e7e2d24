use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use gpio_pin::config::{Config, DriverKind};
use gpio_pin::io::dummy::DummyIO;
use gpio_pin::io::gpio::driver::dummy::Dummy;
use gpio_pin::logging;
use gpio_pin::{Direction, ExitRegistry, Gpio, GpioDriver, PinHandle};
use log::{debug, error, info, warn};
use tokio::runtime::{Builder, Runtime};
use tracing_subscriber::{reload::Handle, EnvFilter};

const CONFIG_FILE: &str = "gpio_pin.toml";

fn main() {
    let logging_handle = match logging::init_logging() {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("Failed to set up logging: {}", err);
            None
        }
    };

    info!("Preparing...");

    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .enable_io()
        .build()
        .expect("Expected to be able to make runtime");

    if let Some(logging_handle) = &logging_handle {
        reload_log_level_on_hangup(&rt, logging_handle.reload_handle());
    }

    if let Err(err) = run(&rt) {
        error!("{}", err);
        drop(logging_handle);
        std::process::exit(1);
    }
}

#[cfg(target_family = "unix")]
fn reload_log_level_on_hangup<S: 'static>(rt: &Runtime, reload_handle: Handle<EnvFilter, S>) {
    use tokio::signal::unix::{signal, SignalKind};

    rt.spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(hangups) => hangups,
            Err(err) => {
                warn!("Cannot listen for SIGHUP, log level will not reload: {}", err);
                return;
            }
        };
        while hangups.recv().await.is_some() {
            match logging::reload_log_level(&reload_handle) {
                Ok(filter) => info!("Reloaded log level: {}", filter),
                Err(err) => error!("Failed to reload log level: {:?}", err),
            }
        }
    });
}

#[cfg(not(target_family = "unix"))]
fn reload_log_level_on_hangup<S: 'static>(_rt: &Runtime, _reload_handle: Handle<EnvFilter, S>) {}

fn run(rt: &Runtime) -> Result<(), String> {
    let config = fs::read_to_string(CONFIG_FILE)
        .map_err(|err| format!("Unable to read config file {}: {}", CONFIG_FILE, err))?;
    let config: Config = toml::from_str(&config)
        .map_err(|err| format!("Error reading config file {}: {}", CONFIG_FILE, err))?;

    let registry = ExitRegistry::new();
    let platform = config.get_platform();
    info!("Using {:?} driver on {}", config.get_driver(), platform);

    match config.get_driver() {
        #[cfg(target_family = "unix")]
        DriverKind::SysFs => {
            let driver = gpio_pin::io::gpio::driver::sysfs_gpio::SysFsDriver;
            main_loop(Gpio::new(driver, platform, rt.handle().clone(), registry), &config, rt)
        }
        #[cfg(not(target_family = "unix"))]
        DriverKind::SysFs => Err("The sysfs driver is only available on unix".to_owned()),
        DriverKind::Dummy => {
            let (dummy, _dummy_handle) = Dummy::create(&());
            main_loop(Gpio::new(dummy, platform, rt.handle().clone(), registry), &config, rt)
        }
    }
}

fn main_loop<D: GpioDriver>(gpio: Gpio<D>, config: &Config, rt: &Runtime) -> Result<(), String> {
    let should_exit = Arc::new(AtomicBool::new(false));

    {
        let should_exit = should_exit.clone();
        ctrlc::set_handler(move || {
            info!("Received termination signal.");
            should_exit.store(true, Ordering::Relaxed);
        })
        .map_err(|err| format!("Failed to attach kill handler: {}", err))?;
    }

    let handles = open_pins(&gpio, config, rt);
    info!("{} of {} pin(s) open", handles.len(), config.get_pins().len());

    info!("Beginning main loop.");
    while !should_exit.load(Ordering::Relaxed) {
        for handle in handles.iter().filter(|h| h.configuration().direction() == Direction::In) {
            let read = match handle.read() {
                Ok(read) => read,
                Err(err) => {
                    warn!("Cannot read pin {}: {}", handle.configuration().pin(), err);
                    continue;
                }
            };
            match rt.block_on(read) {
                Ok(level) => info!("Pin {} is {}", handle.configuration().pin(), if level { "high" } else { "low" }),
                Err(err) => error!("Failed to read pin {}: {}", handle.configuration().pin(), err),
            }
        }
        sleep_unless_exiting(*config.get_poll_interval(), &should_exit);
    }

    info!("Stopping safely...");
    let report = gpio.registry().shutdown();
    for (pin, err) in report.failed() {
        error!("FAILED TO CLOSE PIN {}: {}", pin, err);
    }
    if !report.is_clean() {
        return Err(format!("{} pin(s) could not be closed", report.failed().len()));
    }
    info!("Stopped safely.");
    Ok(())
}

fn open_pins<D: GpioDriver>(gpio: &Gpio<D>, config: &Config, rt: &Runtime) -> Vec<PinHandle<D>> {
    let mut handles = Vec::new();
    let mut completions = Vec::new();
    for raw in config.get_pins() {
        match gpio.open(raw.clone()) {
            Ok((handle, completion)) => {
                handles.push(handle);
                completions.push(completion);
            }
            Err(err) => error!("Skipping pin {}: {}", raw, err),
        }
    }

    let results = rt.block_on(futures::future::join_all(completions));
    handles
        .into_iter()
        .zip(results)
        .filter_map(|(handle, result)| match result {
            Ok(()) => Some(handle),
            Err(err) => {
                error!("Failed to open {}: {}", handle.configuration(), err);
                None
            }
        })
        .collect()
}

fn sleep_unless_exiting(duration: Duration, should_exit: &AtomicBool) {
    let until = Instant::now() + duration;
    while Instant::now() < until {
        if should_exit.load(Ordering::Relaxed) {
            debug!("Cutting sleep short to exit.");
            return;
        }
        sleep(Duration::from_millis(100).min(until.saturating_duration_since(Instant::now())));
    }
}
