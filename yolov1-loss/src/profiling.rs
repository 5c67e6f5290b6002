//! Stage timing of the loss computation that can be disabled in compile-time.

use crate::common::*;

#[cfg(feature = "profiling")]
mod config {
    use super::*;
    use dashmap::DashSet;
    use lazy_static::lazy_static;

    lazy_static! {
        pub(super) static ref PROFILING_CONFIG: ProfilingConfig = {
            match envy::prefixed("YOLOV1_").from_env::<ProfilingConfig>() {
                Ok(config) => config,
                Err(err) => {
                    warn!(
                        "failed to load profiling environment variables, fallback to default values: {:?}",
                        err
                    );
                    ProfilingConfig::default()
                }
            }
        };
        pub(super) static ref REGISTERED_TIMINGS: DashSet<&'static str> = DashSet::new();
    }

    /// Reads `YOLOV1_PROFILING_WHITELIST` as a comma separated list.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
    pub(super) struct ProfilingConfig {
        pub profiling_whitelist: Option<HashSet<String>>,
    }
}

#[cfg(feature = "profiling")]
#[derive(Debug)]
pub struct Timing {
    name: &'static str,
    instant: Instant,
    elapsed: Vec<(&'static str, Duration)>,
}

#[cfg(not(feature = "profiling"))]
#[derive(Debug)]
pub struct Timing;

impl Timing {
    pub fn new(name: &'static str) -> Self {
        #[cfg(feature = "profiling")]
        {
            if config::REGISTERED_TIMINGS.insert(name) {
                info!("registered timing profile '{}'", name);
            }

            Self {
                name,
                instant: Instant::now(),
                elapsed: vec![],
            }
        }

        #[cfg(not(feature = "profiling"))]
        {
            let _ = name;
            Self
        }
    }

    /// Record the time elapsed since the previous event.
    pub fn add_event(&mut self, name: &'static str) {
        #[cfg(feature = "profiling")]
        {
            self.elapsed.push((name, self.instant.elapsed()));
            self.instant = Instant::now();
        }

        #[cfg(not(feature = "profiling"))]
        let _ = name;
    }

    pub fn report(&self) {
        #[cfg(feature = "profiling")]
        {
            let can_report = config::PROFILING_CONFIG
                .profiling_whitelist
                .as_ref()
                .map(|whitelist| whitelist.contains(self.name))
                .unwrap_or(true);

            if can_report {
                info!("profiling report for '{}'", self.name);
                self.elapsed.iter().for_each(|(name, elapsed)| {
                    info!("- {}\t{:?}", name, elapsed);
                });
            }
        }
    }
}
