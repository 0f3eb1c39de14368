use std::fmt;

use log::{Level, Log, Metadata, Record};

/// The logging sink handed to providers.
///
/// A thin, copyable handle over any [`log::Log`] implementation so callers can
/// route discovery logs somewhere other than the global logger, or nowhere.
#[derive(Clone, Copy)]
pub struct Logger<'a> {
    sink: &'a dyn Log,
}

struct Discard;

impl Log for Discard {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        false
    }

    fn log(&self, _: &Record<'_>) {}

    fn flush(&self) {}
}

static DISCARD: Discard = Discard;

impl<'a> Logger<'a> {
    pub fn new(sink: &'a dyn Log) -> Self {
        Self { sink }
    }

    /// A logger that drops every record.
    pub fn discard() -> Logger<'static> {
        Logger { sink: &DISCARD }
    }

    /// The logger installed through the `log` facade.
    pub fn global() -> Logger<'static> {
        Logger {
            sink: log::logger(),
        }
    }

    pub fn debug(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, target, args)
    }

    pub fn info(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Info, target, args)
    }

    pub fn warn(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, target, args)
    }

    fn log(&self, level: Level, target: &str, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(target).build();
        if !self.sink.enabled(&metadata) {
            return;
        }

        self.sink
            .log(&Record::builder().metadata(metadata).args(args).build());
    }
}

impl Default for Logger<'static> {
    fn default() -> Self {
        Logger::discard()
    }
}

impl fmt::Debug for Logger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    /// Collects every record it receives, for assertions in tests.
    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(Level, String, String)>>,
        module_paths: Mutex<Vec<Option<String>>>,
    }

    impl Log for Capture {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            self.lines.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
            self.module_paths
                .lock()
                .unwrap()
                .push(record.module_path().map(String::from));
        }

        fn flush(&self) {}
    }

    #[test]
    fn forwards_records_to_sink() {
        let capture = Capture::default();
        let l = Logger::new(&capture);
        l.info("discover-test", format_args!("found {}", "10.0.0.1"));
        l.debug("discover-test", format_args!("checking"));

        let lines = capture.lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                (
                    Level::Info,
                    "discover-test".to_string(),
                    "found 10.0.0.1".to_string()
                ),
                (
                    Level::Debug,
                    "discover-test".to_string(),
                    "checking".to_string()
                ),
            ]
        );
    }

    #[test]
    fn records_are_not_attributed_to_the_logger_module() {
        let capture = Capture::default();
        Logger::new(&capture).info("discover-hcloud", format_args!("found"));
        assert_eq!(*capture.module_paths.lock().unwrap(), vec![None]);
    }

    #[test]
    fn discard_drops_everything() {
        let l = Logger::discard();
        l.warn("discover-test", format_args!("nobody hears this"));
    }

    #[test]
    fn global_without_installed_logger_is_silent() {
        let l = Logger::global();
        l.info("discover-test", format_args!("no logger installed"));
        assert_eq!(format!("{:?}", l), "Logger");
    }
}
