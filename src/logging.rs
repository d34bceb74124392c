/// Tracing setup.
///
/// The subscriber is installed before the config is read so that config
/// diagnostics are logged; the configured `log_level` is applied afterwards
/// through a reloadable filter.
use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Level used until the config has been loaded.
pub const STARTUP_LEVEL: &str = "info";

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// `RUST_LOG` if set and valid, otherwise [`STARTUP_LEVEL`].
pub fn startup_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(STARTUP_LEVEL))
}

/// Builds a fmt subscriber whose filter can be swapped later.
pub fn subscriber<W>(
    filter: EnvFilter,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, FilterHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));
    (subscriber, handle)
}

/// Replaces the active filter with `level` (any `EnvFilter` directive).
pub fn set_level(handle: &FilterHandle, level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log_level '{level}'"))?;
    handle
        .reload(filter)
        .context("failed to apply log_level")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_config_warnings_are_logged() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let (subscriber, handle) = subscriber(EnvFilter::new(STARTUP_LEVEL), move || writer.clone());

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let mut config = Config::load(path.to_str().unwrap()).unwrap();
            config.apply_overrides([("LINGORAG_TOP_K", "abc")]);
            assert_eq!(config.top_k, 4);

            set_level(&handle, "error").unwrap();
            tracing::warn!("suppressed after level change");
        });

        let out = buf.contents();
        assert!(out.contains("Invalid JSON"), "missing JSON warning: {out}");
        assert!(out.contains("LINGORAG_TOP_K"), "missing override warning: {out}");
        assert!(!out.contains("suppressed after level change"));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let (_subscriber, handle) = subscriber(EnvFilter::new(STARTUP_LEVEL), io::sink);
        assert!(set_level(&handle, "lingorag=loud").is_err());
    }
}
